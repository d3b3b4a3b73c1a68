use std::path::Path;

use serde::{de, Deserialize, Deserializer};
use tch::{nn, Device, Kind, Tensor};

use crate::common::activations::{Activation, TensorFunction};
use crate::{Config, SentenceVectorsError};

/// Configuration for the [`Pooling`] layer (`<pooling module>/config.json`).
#[derive(Debug, Deserialize)]
pub struct PoolingConfig {
    /// Dimensions for the word embeddings
    pub word_embedding_dimension: i64,
    /// Use the first token (CLS token) as text representations
    #[serde(default)]
    pub pooling_mode_cls_token: bool,
    /// Use max in each dimension over all tokens
    #[serde(default)]
    pub pooling_mode_max_tokens: bool,
    /// Perform mean-pooling
    #[serde(default)]
    pub pooling_mode_mean_tokens: bool,
    /// Perform mean-pooling, but divide by sqrt(input_length)
    #[serde(default)]
    pub pooling_mode_mean_sqrt_len_tokens: bool,
}

impl Config for PoolingConfig {}

impl PoolingConfig {
    /// Number of pooling modes enabled; the output dimension is this times
    /// `word_embedding_dimension`.
    pub fn mode_count(&self) -> i64 {
        [
            self.pooling_mode_cls_token,
            self.pooling_mode_max_tokens,
            self.pooling_mode_mean_tokens,
            self.pooling_mode_mean_sqrt_len_tokens,
        ]
        .iter()
        .filter(|&&enabled| enabled)
        .count() as i64
    }
}

/// Performs pooling (CLS, max or mean) on the token embeddings.
///
/// Turns a variable sized sentence into a fixed sized sentence embedding. Enabled modes are
/// concatenated in the order CLS, max, mean, mean-sqrt-len.
pub struct Pooling {
    conf: PoolingConfig,
}

impl Pooling {
    pub fn new(conf: PoolingConfig) -> Result<Pooling, SentenceVectorsError> {
        if conf.mode_count() == 0 {
            return Err(SentenceVectorsError::InvalidConfigurationError(
                "pooling configuration enables no pooling mode".to_string(),
            ));
        }
        Ok(Pooling { conf })
    }

    /// Output dimension of the layer
    pub fn output_dimension(&self) -> i64 {
        self.conf.mode_count() * self.conf.word_embedding_dimension
    }

    /// Pools `token_embeddings` of shape (*batch size*, *sequence_length*, *hidden_size*) into
    /// (*batch size*, *output dimension*). `attention_mask` has shape
    /// (*batch size*, *sequence_length*), 1 for real tokens.
    pub fn forward(&self, token_embeddings: &Tensor, attention_mask: &Tensor) -> Tensor {
        let mut output_vectors = Vec::with_capacity(4);
        let input_mask_expanded = attention_mask
            .unsqueeze(-1)
            .expand_as(token_embeddings)
            .to_kind(token_embeddings.kind());

        if self.conf.pooling_mode_cls_token {
            output_vectors.push(token_embeddings.select(1, 0));
        }

        if self.conf.pooling_mode_max_tokens {
            let masked = token_embeddings.masked_fill(&input_mask_expanded.eq(0), -1e9);
            output_vectors.push(masked.max_dim(1, false).0);
        }

        if self.conf.pooling_mode_mean_tokens || self.conf.pooling_mode_mean_sqrt_len_tokens {
            let sum_embeddings = (token_embeddings * &input_mask_expanded).sum_dim_intlist(
                [1].as_slice(),
                false,
                Kind::Float,
            );
            let sum_mask = input_mask_expanded
                .sum_dim_intlist([1].as_slice(), false, Kind::Float)
                .clamp_min(1e-9);

            if self.conf.pooling_mode_mean_tokens {
                output_vectors.push(&sum_embeddings / &sum_mask);
            }
            if self.conf.pooling_mode_mean_sqrt_len_tokens {
                output_vectors.push(sum_embeddings / sum_mask.sqrt());
            }
        }

        Tensor::cat(&output_vectors, 1)
    }
}

/// Configuration for the [`Dense`] layer (`<dense module>/config.json`).
#[derive(Debug, Deserialize)]
pub struct DenseConfig {
    /// Size of the input dimension
    pub in_features: i64,
    /// Output size
    pub out_features: i64,
    /// Add a bias vector
    pub bias: bool,
    /// Activation function applied on output, e.g. `torch.nn.modules.activation.Tanh`
    #[serde(deserialize_with = "last_part")]
    pub activation_function: Activation,
}

impl Config for DenseConfig {}

/// Splits the given string on `.` and builds an `Activation` from the lower-cased last part
fn last_part<'de, D>(deserializer: D) -> Result<Activation, D::Error>
where
    D: Deserializer<'de>,
{
    let activation = String::deserialize(deserializer)?;
    activation
        .split('.')
        .next_back()
        .map(|s| serde_json::from_value(serde_json::Value::String(s.to_lowercase())))
        .transpose()
        .map_err(de::Error::custom)?
        .ok_or_else(|| format!("Invalid Activation: {activation}"))
        .map_err(de::Error::custom)
}

/// Feed-forward layer with activation function, applied to the pooled sentence embedding.
///
/// Weights live in their own variable store (`<dense module>/rust_model.ot`) under the names
/// `weight` and `bias` (convert with `convert-tensor --strip-prefix linear.`).
pub struct Dense {
    linear: nn::Linear,
    activation: TensorFunction,
    _var_store: nn::VarStore,
}

impl Dense {
    pub fn new<P: AsRef<Path>>(
        dense_conf: DenseConfig,
        dense_weights: P,
        device: Device,
    ) -> Result<Dense, SentenceVectorsError> {
        let mut vs_dense = nn::VarStore::new(device);

        let linear_conf = nn::LinearConfig {
            ws_init: nn::Init::Const(0.),
            bs_init: Some(nn::Init::Const(0.)),
            bias: dense_conf.bias,
        };
        let linear = nn::linear(
            vs_dense.root(),
            dense_conf.in_features,
            dense_conf.out_features,
            linear_conf,
        );

        let activation = dense_conf.activation_function.get_function();

        vs_dense.load(dense_weights)?;

        Ok(Dense {
            linear,
            activation,
            _var_store: vs_dense,
        })
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        self.activation.get_fn()(&x.apply(&self.linear))
    }
}
