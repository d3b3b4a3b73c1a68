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

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tch::nn::{self, RNN};
use tch::{Device, Tensor};
use tracing::info;

use crate::resources::{LocalResource, ResourceProvider};
use crate::{Config, SentenceVectorsError};

/// Dictionary entry for characters missing from the dictionary
pub const UNKNOWN_CHARACTER: &str = "<unk>";

/// # Flair character language model configuration (`config.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharLanguageModelConfig {
    /// Direction the model reads the text in
    pub is_forward_lm: bool,
    /// Size of the character embeddings
    pub embedding_size: i64,
    /// Size of the LSTM hidden state
    pub hidden_size: i64,
    /// Number of LSTM layers
    pub nlayers: i64,
    /// Size of the optional projection applied to the LSTM output
    #[serde(default)]
    pub nout: Option<i64>,
    /// Character dictionary, position = character index
    pub dictionary: Vec<String>,
}

impl Config for CharLanguageModelConfig {}

impl CharLanguageModelConfig {
    pub fn validate(&self) -> Result<(), SentenceVectorsError> {
        if self.embedding_size <= 0 || self.hidden_size <= 0 || self.nlayers <= 0 {
            return Err(SentenceVectorsError::InvalidConfigurationError(format!(
                "invalid language model dimensions: embedding_size {}, hidden_size {}, nlayers {}",
                self.embedding_size, self.hidden_size, self.nlayers
            )));
        }
        if matches!(self.nout, Some(nout) if nout <= 0) {
            return Err(SentenceVectorsError::InvalidConfigurationError(
                "nout must be positive".to_string(),
            ));
        }
        if !self.dictionary.iter().any(|item| item == UNKNOWN_CHARACTER) {
            return Err(SentenceVectorsError::InvalidConfigurationError(format!(
                "character dictionary must contain {UNKNOWN_CHARACTER}"
            )));
        }
        Ok(())
    }

    /// Size of the hidden states produced for each character
    pub fn output_dim(&self) -> i64 {
        self.nout.unwrap_or(self.hidden_size)
    }
}

/// # Character-level LSTM language model
///
/// Character embedding, LSTM and optional projection. Weights are read from a `.ot` file using
/// the PyTorch parameter names (`encoder.weight`, `rnn.weight_ih_l0`, ..., `proj.weight`); the
/// decoder of the language model is not needed to compute representations and is not loaded.
pub struct CharLanguageModel {
    is_forward: bool,
    char_indices: HashMap<char, i64>,
    unknown_index: i64,
    encoder: nn::Embedding,
    rnn: nn::LSTM,
    proj: Option<nn::Linear>,
    output_dim: i64,
    var_store: nn::VarStore,
}

impl CharLanguageModel {
    /// Loads `config.json` and `rust_model.ot` from `model_dir`.
    pub fn from_dir<P: AsRef<Path>>(
        model_dir: P,
        device: Device,
    ) -> Result<Self, SentenceVectorsError> {
        let model_dir = model_dir.as_ref();
        let config_path = LocalResource::from(model_dir.join("config.json")).get_local_path()?;
        let weights_path = LocalResource::from(model_dir.join("rust_model.ot")).get_local_path()?;
        let config = CharLanguageModelConfig::from_file(config_path)?;
        let model = CharLanguageModel::new(&config, weights_path, device)?;
        info!(
            model = %model_dir.display(),
            forward = config.is_forward_lm,
            output_dim = config.output_dim(),
            "flair language model loaded"
        );
        Ok(model)
    }

    pub fn new<P: AsRef<Path>>(
        config: &CharLanguageModelConfig,
        weights: P,
        device: Device,
    ) -> Result<Self, SentenceVectorsError> {
        config.validate()?;

        let mut char_indices = HashMap::with_capacity(config.dictionary.len());
        let mut unknown_index = 0;
        for (index, item) in config.dictionary.iter().enumerate() {
            if item == UNKNOWN_CHARACTER {
                unknown_index = index as i64;
                continue;
            }
            let mut chars = item.chars();
            if let (Some(character), None) = (chars.next(), chars.next()) {
                char_indices.entry(character).or_insert(index as i64);
            }
        }

        let mut var_store = nn::VarStore::new(device);
        let (encoder, rnn, proj) = {
            let p = var_store.root();
            let encoder = nn::embedding(
                &p / "encoder",
                config.dictionary.len() as i64,
                config.embedding_size,
                Default::default(),
            );
            let rnn = nn::lstm(
                &p / "rnn",
                config.embedding_size,
                config.hidden_size,
                nn::RNNConfig {
                    num_layers: config.nlayers,
                    train: false,
                    batch_first: true,
                    ..Default::default()
                },
            );
            let proj = config
                .nout
                .map(|nout| nn::linear(&p / "proj", config.hidden_size, nout, Default::default()));
            (encoder, rnn, proj)
        };
        var_store.load(weights)?;

        Ok(CharLanguageModel {
            is_forward: config.is_forward_lm,
            char_indices,
            unknown_index,
            encoder,
            rnn,
            proj,
            output_dim: config.output_dim(),
            var_store,
        })
    }

    pub fn is_forward(&self) -> bool {
        self.is_forward
    }

    pub fn output_dim(&self) -> i64 {
        self.output_dim
    }

    pub fn device(&self) -> Device {
        self.var_store.device()
    }

    fn char_index(&self, character: char) -> i64 {
        self.char_indices
            .get(&character)
            .copied()
            .unwrap_or(self.unknown_index)
    }

    /// Hidden states for every character of `"\n" + text + " "`, shape
    /// (*number of characters*, *output_dim*).
    pub fn representation(&self, text: &str) -> Tensor {
        let indices = std::iter::once('\n')
            .chain(text.chars())
            .chain(std::iter::once(' '))
            .map(|character| self.char_index(character))
            .collect::<Vec<_>>();

        tch::no_grad(|| {
            let input = Tensor::from_slice(&indices)
                .to(self.device())
                .unsqueeze(0);
            let embedded = input.apply(&self.encoder);
            let (output, _) = self.rnn.seq(&embedded);
            let output = match &self.proj {
                Some(proj) => output.apply(proj),
                None => output,
            };
            output.squeeze_dim(0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CharLanguageModelConfig {
        serde_json::from_str(
            r#"{"is_forward_lm": true, "embedding_size": 4, "hidden_size": 6, "nlayers": 1,
                "dictionary": ["<unk>", "\n", " ", "a", "b"]}"#,
        )
        .unwrap()
    }

    #[test]
    fn projection_sets_the_output_size() {
        let mut config = config();
        assert_eq!(config.output_dim(), 6);
        config.nout = Some(3);
        assert_eq!(config.output_dim(), 3);
    }

    #[test]
    fn dictionary_requires_unknown_entry() {
        let mut config = config();
        assert!(config.validate().is_ok());
        config.dictionary.retain(|item| item != UNKNOWN_CHARACTER);
        assert!(config.validate().is_err());
    }
}
