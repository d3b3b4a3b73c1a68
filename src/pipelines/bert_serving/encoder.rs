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

use std::convert::TryFrom;
use std::path::PathBuf;

use rust_tokenizers::tokenizer::{BertTokenizer, Tokenizer, TruncationStrategy};
use rust_tokenizers::vocab::{BertVocab, Vocab};
use tch::{nn, Device, Tensor};
use tracing::info;

use crate::bert::{pad_with_mask, BertConfig, BertModel, PaddedBatch};
use crate::pipelines::bert_serving::{PoolingLayers, PoolingStrategy};
use crate::pipelines::vectorization::{Embedding, EmbeddingModel};
use crate::resources::{LocalResource, ResourceProvider};
use crate::{Config, SentenceVectorsError};

/// Maximum sequence length (special tokens included) used when none is given
pub const DEFAULT_MAX_SEQ_LEN: usize = 25;

/// # Configuration of a BERT checkpoint served for sentence embeddings
///
/// `model_dir` holds the pretrained model (`config.json`, `vocab.txt`, `rust_model.ot`). A
/// fine-tuned checkpoint replaces the pretrained weights: it is read from
/// `fine_tuned_model_dir/checkpoint_name` (`checkpoint_name` defaulting to `rust_model.ot`), or
/// from `model_dir/checkpoint_name` when only a checkpoint name is given.
#[derive(Debug, Clone)]
pub struct BertServingConfig {
    /// Directory of the pretrained model
    pub model_dir: PathBuf,
    /// Optional directory of a fine-tuned checkpoint
    pub fine_tuned_model_dir: Option<PathBuf>,
    /// Optional weights file name
    pub checkpoint_name: Option<String>,
    /// Reduction from token vectors to sentence vector
    pub pooling_strategy: PoolingStrategy,
    /// Encoder layers the token vectors are taken from
    pub pooling_layers: PoolingLayers,
    /// Maximum sequence length, `[CLS]` and `[SEP]` included
    pub max_seq_len: usize,
    /// Lower-case (and strip accents from) the input, for uncased models
    pub lower_case: bool,
    /// Device to place the model on
    pub device: Device,
}

impl BertServingConfig {
    /// Configuration with `REDUCE_MEAN` pooling over the second-to-last layer, uncased input and
    /// a maximum sequence length of 25.
    pub fn new<P: Into<PathBuf>>(model_dir: P) -> Self {
        BertServingConfig {
            model_dir: model_dir.into(),
            fine_tuned_model_dir: None,
            checkpoint_name: None,
            pooling_strategy: PoolingStrategy::ReduceMean,
            pooling_layers: PoolingLayers::default(),
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
            lower_case: true,
            device: Device::cuda_if_available(),
        }
    }

    /// Location of the weights to load
    pub fn weights_path(&self) -> PathBuf {
        let checkpoint = self.checkpoint_name.as_deref().unwrap_or("rust_model.ot");
        match &self.fine_tuned_model_dir {
            Some(fine_tuned_model_dir) => fine_tuned_model_dir.join(checkpoint),
            None => self.model_dir.join(checkpoint),
        }
    }
}

/// # BERT encoder producing pooled sentence vectors
///
/// Runs the BERT encoder, takes the outputs of the configured layers (concatenated on the
/// hidden axis) and reduces them with the configured pooling strategy.
pub struct BertServingEncoder {
    tokenizer: BertTokenizer,
    model: BertModel,
    var_store: nn::VarStore,
    layers: Vec<usize>,
    pooling_strategy: PoolingStrategy,
    max_seq_len: usize,
    pad_id: i64,
    cls_id: i64,
    sep_id: i64,
}

impl BertServingEncoder {
    pub fn new(config: BertServingConfig) -> Result<Self, SentenceVectorsError> {
        if config.max_seq_len < 3 {
            return Err(SentenceVectorsError::InvalidConfigurationError(format!(
                "max_seq_len must leave room for [CLS], [SEP] and one token, got {}",
                config.max_seq_len
            )));
        }

        let config_path = LocalResource::from(config.model_dir.join("config.json")).get_local_path()?;
        let vocab_path = LocalResource::from(config.model_dir.join("vocab.txt")).get_local_path()?;
        let weights_path = LocalResource::from(config.weights_path()).get_local_path()?;

        let bert_config = BertConfig::from_file(&config_path)?;
        bert_config.validate()?;
        if config.max_seq_len as i64 > bert_config.max_position_embeddings {
            return Err(SentenceVectorsError::InvalidConfigurationError(format!(
                "max_seq_len {} exceeds the model's {} positions",
                config.max_seq_len, bert_config.max_position_embeddings
            )));
        }
        let layers = config
            .pooling_layers
            .resolve(bert_config.num_hidden_layers as usize)?;

        let tokenizer = BertTokenizer::from_file(
            vocab_path.to_string_lossy().as_ref(),
            config.lower_case,
            config.lower_case,
        )?;
        let vocab = tokenizer.vocab();
        let pad_id = vocab.token_to_id(BertVocab::pad_value());
        let cls_id = vocab.token_to_id(BertVocab::cls_value());
        let sep_id = vocab.token_to_id(BertVocab::sep_value());

        let mut var_store = nn::VarStore::new(config.device);
        let model = BertModel::new(var_store.root(), &bert_config);
        var_store.load(&weights_path)?;

        info!(
            weights = %weights_path.display(),
            pooling_strategy = %config.pooling_strategy,
            pooling_layers = %config.pooling_layers,
            max_seq_len = config.max_seq_len,
            "BERT serving encoder loaded"
        );

        Ok(BertServingEncoder {
            tokenizer,
            model,
            var_store,
            layers,
            pooling_strategy: config.pooling_strategy,
            max_seq_len: config.max_seq_len,
            pad_id,
            cls_id,
            sep_id,
        })
    }

    /// Encodes raw sentences: WordPiece tokenization, truncation to `max_seq_len`.
    pub fn encode<S: AsRef<str>>(
        &self,
        sentences: &[S],
    ) -> Result<Vec<Embedding>, SentenceVectorsError> {
        let token_ids = self
            .tokenizer
            .encode_list(
                sentences,
                self.max_seq_len,
                &TruncationStrategy::LongestFirst,
                0,
            )
            .into_iter()
            .map(|input| input.token_ids)
            .collect();
        self.encode_ids(token_ids)
    }

    /// Encodes pre-tokenized sentences. Tokens are looked up in the vocabulary as they are
    /// (unknown tokens map to `[UNK]`), truncated to `max_seq_len - 2` and wrapped in
    /// `[CLS]`/`[SEP]`.
    pub fn encode_tokenized<S: AsRef<str>>(
        &self,
        sentences: &[Vec<S>],
    ) -> Result<Vec<Embedding>, SentenceVectorsError> {
        let token_ids = sentences
            .iter()
            .map(|tokens| {
                let kept = tokens.len().min(self.max_seq_len - 2);
                let mut ids = Vec::with_capacity(kept + 2);
                ids.push(self.cls_id);
                ids.extend(self.tokenizer.convert_tokens_to_ids(&tokens[..kept]));
                ids.push(self.sep_id);
                ids
            })
            .collect();
        self.encode_ids(token_ids)
    }

    fn encode_ids(&self, token_ids: Vec<Vec<i64>>) -> Result<Vec<Embedding>, SentenceVectorsError> {
        if token_ids.is_empty() {
            return Ok(Vec::new());
        }
        let PaddedBatch { token_ids, masks } = pad_with_mask(token_ids, self.pad_id);
        let device = self.var_store.device();
        let input_ids = Tensor::stack(&token_ids, 0).to(device);
        let attention_mask = Tensor::stack(&masks, 0).to(device);

        let pooled = tch::no_grad(|| -> Result<Tensor, SentenceVectorsError> {
            let output = self.model.forward(&input_ids, &attention_mask)?;
            let selected = self
                .layers
                .iter()
                .map(|&layer| output.all_hidden_states[layer].shallow_clone())
                .collect::<Vec<_>>();
            let hidden_states = Tensor::cat(&selected, -1);
            Ok(self.pooling_strategy.pool(&hidden_states, &attention_mask))
        })?;

        Ok(Vec::<Vec<f32>>::try_from(pooled)?)
    }
}

impl EmbeddingModel for BertServingEncoder {
    fn embed(&self, text: &str) -> Result<Embedding, SentenceVectorsError> {
        self.encode(&[text])?.pop().ok_or_else(|| {
            SentenceVectorsError::ValueError("no embedding returned for the input".to_string())
        })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, SentenceVectorsError> {
        self.encode(texts)
    }

    fn embed_tokens(&self, tokens: &[String]) -> Result<Embedding, SentenceVectorsError> {
        self.encode_tokenized(&[tokens.to_vec()])?
            .pop()
            .ok_or_else(|| {
                SentenceVectorsError::ValueError("no embedding returned for the input".to_string())
            })
    }

    fn embed_tokens_batch(
        &self,
        sentences: &[Vec<String>],
    ) -> Result<Vec<Embedding>, SentenceVectorsError> {
        self.encode_tokenized(sentences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fine_tuned_checkpoint_replaces_pretrained_weights() {
        let mut config = BertServingConfig::new("models/uncased_L-12_H-768_A-12");
        assert_eq!(
            config.weights_path(),
            PathBuf::from("models/uncased_L-12_H-768_A-12/rust_model.ot")
        );

        config.checkpoint_name = Some("model.ckpt-1000.ot".to_string());
        assert_eq!(
            config.weights_path(),
            PathBuf::from("models/uncased_L-12_H-768_A-12/model.ckpt-1000.ot")
        );

        config.fine_tuned_model_dir = Some(PathBuf::from("fine_tuned"));
        assert_eq!(
            config.weights_path(),
            PathBuf::from("fine_tuned/model.ckpt-1000.ot")
        );
    }

    #[test]
    fn defaults_follow_the_serving_library() {
        let config = BertServingConfig::new("model");
        assert_eq!(config.max_seq_len, 25);
        assert_eq!(config.pooling_strategy, PoolingStrategy::ReduceMean);
        assert_eq!(config.pooling_layers.indices(), &[-2]);
        assert!(config.lower_case);
    }
}
