use std::convert::TryFrom;

use rust_tokenizers::tokenizer::{BertTokenizer, Tokenizer, TruncationStrategy};
use rust_tokenizers::vocab::{BertVocab, Vocab};
use tch::{nn, Tensor};
use tracing::info;

use crate::bert::{pad_with_mask, BertConfig, BertModel, PaddedBatch};
use crate::pipelines::sentence_embeddings::layers::{Dense, DenseConfig, Pooling, PoolingConfig};
use crate::pipelines::sentence_embeddings::{
    SentenceEmbeddingsConfig, SentenceEmbeddingsModulesConfig, SentenceEmbeddingsSentenceBertConfig,
    SentenceEmbeddingsTokenizerConfig,
};
use crate::pipelines::vectorization::{Embedding, EmbeddingModel};
use crate::{Config, SentenceVectorsError};

/// # SentenceEmbeddingsModel to perform sentence embeddings
///
/// It is made of the following blocks:
/// - `transformer`: BERT encoder
/// - `pooling`: Pooling layer
/// - `dense` _(optional)_: Linear (feed forward) layer
/// - `normalization` _(optional)_: Embeddings normalization
pub struct SentenceEmbeddingsModel {
    sentence_bert_config: SentenceEmbeddingsSentenceBertConfig,
    tokenizer: BertTokenizer,
    tokenizer_truncation_strategy: TruncationStrategy,
    pad_token_id: i64,
    var_store: nn::VarStore,
    transformer: BertModel,
    pooling_layer: Pooling,
    dense_layer: Option<Dense>,
    normalize_embeddings: bool,
    embeddings_dim: i64,
}

impl SentenceEmbeddingsModel {
    /// Build a new `SentenceEmbeddingsModel`
    ///
    /// # Arguments
    ///
    /// * `config` - `SentenceEmbeddingsConfig` object containing the resource references (model, vocabulary, configuration) and device placement (CPU/GPU)
    pub fn new(config: SentenceEmbeddingsConfig) -> Result<Self, SentenceVectorsError> {
        let SentenceEmbeddingsConfig {
            modules_config_resource,
            sentence_bert_config_resource,
            tokenizer_config_resource,
            tokenizer_vocab_resource,
            transformer_config_resource,
            transformer_weights_resource,
            pooling_config_resource,
            dense_config_resource,
            dense_weights_resource,
            device,
        } = config;

        let modules =
            SentenceEmbeddingsModulesConfig::from_file(modules_config_resource.get_local_path()?)?
                .validate()?;

        // Setup tokenizer
        let tokenizer_config = SentenceEmbeddingsTokenizerConfig::from_file(
            tokenizer_config_resource.get_local_path()?,
        )?;
        let sentence_bert_config = SentenceEmbeddingsSentenceBertConfig::from_file(
            sentence_bert_config_resource.get_local_path()?,
        )?;
        let lower_case = tokenizer_config
            .do_lower_case
            .unwrap_or(sentence_bert_config.do_lower_case);
        let tokenizer = BertTokenizer::from_file(
            tokenizer_vocab_resource
                .get_local_path()?
                .to_string_lossy()
                .as_ref(),
            lower_case,
            tokenizer_config.strip_accents.unwrap_or(lower_case),
        )?;
        let pad_token_id = tokenizer.vocab().token_to_id(BertVocab::pad_value());

        // Setup transformer
        let mut var_store = nn::VarStore::new(device);
        let transformer_config =
            BertConfig::from_file(transformer_config_resource.get_local_path()?)?;
        transformer_config.validate()?;
        let transformer = BertModel::new(var_store.root(), &transformer_config);
        var_store.load(transformer_weights_resource.get_local_path()?)?;

        // Setup pooling layer
        let pooling_config = PoolingConfig::from_file(pooling_config_resource.get_local_path()?)?;
        let pooling_layer = Pooling::new(pooling_config)?;
        let mut embeddings_dim = pooling_layer.output_dimension();

        // Setup dense layer
        let dense_layer = match (
            modules.dense_module(),
            dense_config_resource,
            dense_weights_resource,
        ) {
            (Some(_), Some(config_resource), Some(weights_resource)) => {
                let dense_config = DenseConfig::from_file(config_resource.get_local_path()?)?;
                embeddings_dim = dense_config.out_features;
                Some(Dense::new(
                    dense_config,
                    weights_resource.get_local_path()?,
                    device,
                )?)
            }
            (Some(module), _, _) => {
                return Err(SentenceVectorsError::InvalidConfigurationError(format!(
                    "dense module `{}` declared in modules.json but its resources are missing",
                    module.path
                )));
            }
            (None, _, _) => None,
        };

        let normalize_embeddings = modules.has_normalization();

        info!(
            embeddings_dim,
            layers = transformer_config.num_hidden_layers,
            dense = dense_layer.is_some(),
            normalize = normalize_embeddings,
            "sentence embeddings model loaded"
        );

        Ok(Self {
            sentence_bert_config,
            tokenizer,
            tokenizer_truncation_strategy: TruncationStrategy::LongestFirst,
            pad_token_id,
            var_store,
            transformer,
            pooling_layer,
            dense_layer,
            normalize_embeddings,
            embeddings_dim,
        })
    }

    /// Get a reference to the model tokenizer.
    pub fn get_tokenizer(&self) -> &BertTokenizer {
        &self.tokenizer
    }

    /// Sets the tokenizer's truncation strategy
    pub fn set_tokenizer_truncation(&mut self, truncation_strategy: TruncationStrategy) {
        self.tokenizer_truncation_strategy = truncation_strategy;
    }

    /// Return the embedding output dimension
    pub fn get_embedding_dim(&self) -> i64 {
        self.embeddings_dim
    }

    /// Tokenizes the inputs, truncated to `max_seq_length` and padded to the longest input
    pub fn tokenize<S>(&self, inputs: &[S]) -> SentenceEmbeddingsTokenizerOutput
    where
        S: AsRef<str>,
    {
        let tokenized_input = self.tokenizer.encode_list(
            inputs,
            self.sentence_bert_config.max_seq_length,
            &self.tokenizer_truncation_strategy,
            0,
        );

        let PaddedBatch { token_ids, masks } = pad_with_mask(
            tokenized_input
                .into_iter()
                .map(|input| input.token_ids)
                .collect(),
            self.pad_token_id,
        );

        SentenceEmbeddingsTokenizerOutput {
            tokens_ids: token_ids,
            tokens_masks: masks,
        }
    }

    /// Computes sentence embeddings, outputs `Tensor` of shape (*batch size*, *embeddings_dim*).
    pub fn encode_as_tensor<S>(&self, inputs: &[S]) -> Result<Tensor, SentenceVectorsError>
    where
        S: AsRef<str>,
    {
        let SentenceEmbeddingsTokenizerOutput {
            tokens_ids,
            tokens_masks,
        } = self.tokenize(inputs);
        let tokens_ids = Tensor::stack(&tokens_ids, 0).to(self.var_store.device());
        let tokens_masks = Tensor::stack(&tokens_masks, 0).to(self.var_store.device());

        tch::no_grad(|| {
            let transformer_output = self.transformer.forward(&tokens_ids, &tokens_masks)?;
            let pooled = self
                .pooling_layer
                .forward(&transformer_output.hidden_state, &tokens_masks);
            let maybe_linear = match &self.dense_layer {
                Some(dense_layer) => dense_layer.forward(&pooled),
                None => pooled,
            };
            let maybe_normalized = if self.normalize_embeddings {
                let norm = maybe_linear
                    .norm_scalaropt_dim(2, [1], true)
                    .clamp_min(1e-12)
                    .expand_as(&maybe_linear);
                maybe_linear / norm
            } else {
                maybe_linear
            };
            Ok(maybe_normalized)
        })
    }

    /// Computes sentence embeddings.
    pub fn encode<S>(&self, inputs: &[S]) -> Result<Vec<Embedding>, SentenceVectorsError>
    where
        S: AsRef<str>,
    {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.encode_as_tensor(inputs)?;
        Ok(Vec::<Vec<f32>>::try_from(embeddings)?)
    }
}

impl EmbeddingModel for SentenceEmbeddingsModel {
    fn embed(&self, text: &str) -> Result<Embedding, SentenceVectorsError> {
        self.encode(&[text])?.pop().ok_or_else(|| {
            SentenceVectorsError::ValueError("no embedding returned for the input".to_string())
        })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, SentenceVectorsError> {
        self.encode(texts)
    }
}

/// Container for the SentenceEmbeddings tokenizer output.
pub struct SentenceEmbeddingsTokenizerOutput {
    pub tokens_ids: Vec<Tensor>,
    pub tokens_masks: Vec<Tensor>,
}
