// Copyright 2019-present, the HuggingFace Inc. team, The Google AI Language Team and Facebook, Inc.
// Copyright 2026 The sentence-vectors Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::bert::embeddings::BertEmbeddings;
use crate::bert::encoder::BertEncoder;
use crate::common::activations::Activation;
use crate::{Config, SentenceVectorsError};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tch::{nn, Kind, Tensor};

#[derive(Debug, Serialize, Deserialize, Clone)]
/// # BERT model configuration
/// Defines the BERT encoder architecture, read from the `config.json` shipped with the model.
pub struct BertConfig {
    pub hidden_act: Activation,
    pub hidden_size: i64,
    pub intermediate_size: i64,
    pub max_position_embeddings: i64,
    pub num_attention_heads: i64,
    pub num_hidden_layers: i64,
    pub type_vocab_size: i64,
    pub vocab_size: i64,
    pub layer_norm_eps: Option<f64>,
}

impl Config for BertConfig {}

impl Default for BertConfig {
    fn default() -> Self {
        BertConfig {
            hidden_act: Activation::gelu,
            hidden_size: 768,
            intermediate_size: 3072,
            max_position_embeddings: 512,
            num_attention_heads: 12,
            num_hidden_layers: 12,
            type_vocab_size: 2,
            vocab_size: 30522,
            layer_norm_eps: None,
        }
    }
}

impl BertConfig {
    /// Checks the architecture values that would otherwise fail deep inside a forward pass.
    pub fn validate(&self) -> Result<(), SentenceVectorsError> {
        if self.num_attention_heads <= 0 || self.hidden_size % self.num_attention_heads != 0 {
            return Err(SentenceVectorsError::InvalidConfigurationError(format!(
                "hidden size {} is not a multiple of the number of attention heads {}",
                self.hidden_size, self.num_attention_heads
            )));
        }
        if self.num_hidden_layers <= 0 {
            return Err(SentenceVectorsError::InvalidConfigurationError(
                "BERT model must have at least one hidden layer".to_string(),
            ));
        }
        Ok(())
    }
}

/// # BERT encoder used to produce token-level representations
/// It is made of the following blocks:
/// - `embeddings`: `token`, `position` and `segment_id` embeddings
/// - `encoder`: stack of transformer layers, each made of a self-attention block and a
///   feed-forward block
///
/// Variables are expected at the root of the variable store path given to `new`, following the
/// Transformers parameter names (`embeddings.word_embeddings.weight`, `encoder.layer.0...`).
pub struct BertModel {
    embeddings: BertEmbeddings,
    encoder: BertEncoder,
}

/// Container for the BERT encoder output.
pub struct BertModelOutput {
    /// Last hidden state of shape (*batch size*, *sequence_length*, *hidden_size*)
    pub hidden_state: Tensor,
    /// Hidden states of every encoder layer, first layer first
    pub all_hidden_states: Vec<Tensor>,
}

impl BertModel {
    /// Build a new `BertModel`
    ///
    /// # Arguments
    ///
    /// * `p` - Variable store path for the root of the BERT model
    /// * `config` - `BertConfig` object defining the model architecture
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sentence_vectors::bert::{BertConfig, BertModel};
    /// use sentence_vectors::Config;
    /// use tch::{nn, Device};
    ///
    /// let config = BertConfig::from_file("path/to/config.json")?;
    /// let vs = nn::VarStore::new(Device::Cpu);
    /// let bert = BertModel::new(vs.root(), &config);
    /// # Ok::<(), sentence_vectors::SentenceVectorsError>(())
    /// ```
    pub fn new<'p, P>(p: P, config: &BertConfig) -> BertModel
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let embeddings = BertEmbeddings::new(p / "embeddings", config);
        let encoder = BertEncoder::new(p / "encoder", config);

        BertModel {
            embeddings,
            encoder,
        }
    }

    /// Forward pass through the model
    ///
    /// # Arguments
    ///
    /// * `input_ids` - Input tensor of shape (*batch size*, *sequence_length*)
    /// * `attention_mask` - Mask of shape (*batch size*, *sequence_length*). Masked positions
    ///   have value 0, non-masked value 1.
    pub fn forward(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<BertModelOutput, SentenceVectorsError> {
        let input_shape = input_ids.size();
        if input_shape.len() != 2 || input_shape != attention_mask.size() {
            return Err(SentenceVectorsError::ValueError(format!(
                "input ids {:?} and attention mask {:?} must share a (batch, sequence) shape",
                input_shape,
                attention_mask.size()
            )));
        }

        let mask = attention_mask.unsqueeze(1).unsqueeze(2).to_kind(Kind::Float);
        let extended_attention_mask = (mask.ones_like() - &mask) * -10000.0;

        let embeddings = self.embeddings.forward(input_ids);
        let all_hidden_states = self.encoder.forward(embeddings, &extended_attention_mask);
        let hidden_state = all_hidden_states
            .last()
            .map(Tensor::shallow_clone)
            .ok_or_else(|| {
                SentenceVectorsError::InvalidConfigurationError(
                    "BERT model has no encoder layers".to_string(),
                )
            })?;

        Ok(BertModelOutput {
            hidden_state,
            all_hidden_states,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn tiny_config() -> BertConfig {
        BertConfig {
            hidden_size: 8,
            intermediate_size: 16,
            max_position_embeddings: 16,
            num_attention_heads: 2,
            num_hidden_layers: 3,
            vocab_size: 20,
            ..Default::default()
        }
    }

    #[test]
    fn forward_returns_every_layer_output() {
        let config = tiny_config();
        let vs = nn::VarStore::new(Device::Cpu);
        let model = BertModel::new(vs.root(), &config);

        let input_ids = Tensor::from_slice(&[1i64, 5, 7, 2, 1, 6, 2, 0]).view((2, 4));
        let mask = Tensor::from_slice(&[1i64, 1, 1, 1, 1, 1, 1, 0]).view((2, 4));
        let output = tch::no_grad(|| model.forward(&input_ids, &mask)).unwrap();

        assert_eq!(output.all_hidden_states.len(), 3);
        assert_eq!(output.hidden_state.size(), vec![2, 4, 8]);
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let config = tiny_config();
        let vs = nn::VarStore::new(Device::Cpu);
        let model = BertModel::new(vs.root(), &config);

        let input_ids = Tensor::from_slice(&[1i64, 5, 7, 2]).view((1, 4));
        let mask = Tensor::from_slice(&[1i64, 1, 1]).view((1, 3));
        assert!(model.forward(&input_ids, &mask).is_err());
    }

    #[test]
    fn config_validation_checks_head_split() {
        let config = BertConfig {
            hidden_size: 10,
            num_attention_heads: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(BertConfig::default().validate().is_ok());
    }
}
