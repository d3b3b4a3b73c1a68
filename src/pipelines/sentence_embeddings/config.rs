use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tch::Device;
use tracing::info;

use crate::resources::ResourceProvider;
use crate::{Config, SentenceVectorsError};

/// # Configuration for sentence embeddings
///
/// Contains the resources of a Sentence-Transformers model (BERT encoder, pooling layer, optional
/// dense layer, tokenizer) and the device to place the model on.
pub struct SentenceEmbeddingsConfig {
    /// Modules configuration resource, contains layers definition
    pub modules_config_resource: Box<dyn ResourceProvider + Send>,
    /// Transformer model configuration resource
    pub transformer_config_resource: Box<dyn ResourceProvider + Send>,
    /// Transformer weights resource
    pub transformer_weights_resource: Box<dyn ResourceProvider + Send>,
    /// Pooling layer configuration resource
    pub pooling_config_resource: Box<dyn ResourceProvider + Send>,
    /// Optional dense layer configuration resource
    pub dense_config_resource: Option<Box<dyn ResourceProvider + Send>>,
    /// Optional dense layer weights resource
    pub dense_weights_resource: Option<Box<dyn ResourceProvider + Send>>,
    /// Sentence BERT specific configuration resource
    pub sentence_bert_config_resource: Box<dyn ResourceProvider + Send>,
    /// Transformer's tokenizer configuration resource
    pub tokenizer_config_resource: Box<dyn ResourceProvider + Send>,
    /// Transformer's tokenizer vocab resource
    pub tokenizer_vocab_resource: Box<dyn ResourceProvider + Send>,
    /// Device to place the transformer model on
    pub device: Device,
}

impl SentenceEmbeddingsConfig {
    /// Copies every model file to `destination`, keeping the Sentence-Transformers layout
    /// (module subdirectories included), so that the copy can be loaded again with
    /// `SentenceEmbeddingsBuilder::local`.
    ///
    /// Returns the destination directory.
    pub fn save_local_copy<P: AsRef<Path>>(
        &self,
        destination: P,
    ) -> Result<PathBuf, SentenceVectorsError> {
        let destination = destination.as_ref();
        let modules = SentenceEmbeddingsModulesConfig::from_file(
            self.modules_config_resource.get_local_path()?,
        )?
        .validate()?;

        let pooling_path = Path::new(&modules.pooling_module()?.path);
        let mut files: Vec<(PathBuf, &(dyn ResourceProvider + Send))> = vec![
            ("modules.json".into(), self.modules_config_resource.as_ref()),
            ("config.json".into(), self.transformer_config_resource.as_ref()),
            ("rust_model.ot".into(), self.transformer_weights_resource.as_ref()),
            (pooling_path.join("config.json"), self.pooling_config_resource.as_ref()),
            (
                "sentence_bert_config.json".into(),
                self.sentence_bert_config_resource.as_ref(),
            ),
            (
                "tokenizer_config.json".into(),
                self.tokenizer_config_resource.as_ref(),
            ),
            ("vocab.txt".into(), self.tokenizer_vocab_resource.as_ref()),
        ];
        if let (Some(dense), Some(config), Some(weights)) = (
            modules.dense_module(),
            self.dense_config_resource.as_ref(),
            self.dense_weights_resource.as_ref(),
        ) {
            let dense_path = Path::new(&dense.path);
            files.push((dense_path.join("config.json"), config.as_ref()));
            files.push((dense_path.join("rust_model.ot"), weights.as_ref()));
        }

        // Modules without files (e.g. Normalize) still get their directory
        for module in modules.iter() {
            fs::create_dir_all(destination.join(&module.path))?;
        }
        for (relative_path, resource) in files {
            let target = destination.join(relative_path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(resource.get_local_path()?, &target)?;
        }

        info!(destination = %destination.display(), "saved local copy of the model");
        Ok(destination.to_path_buf())
    }
}

/// Configuration for the modules that define the model's layers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceEmbeddingsModulesConfig(pub Vec<SentenceEmbeddingsModuleConfig>);

impl std::ops::Deref for SentenceEmbeddingsModulesConfig {
    type Target = Vec<SentenceEmbeddingsModuleConfig>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<SentenceEmbeddingsModuleConfig>> for SentenceEmbeddingsModulesConfig {
    fn from(source: Vec<SentenceEmbeddingsModuleConfig>) -> Self {
        Self(source)
    }
}

impl Config for SentenceEmbeddingsModulesConfig {}

impl SentenceEmbeddingsModulesConfig {
    /// Checks that the first module is a Transformer and the second a Pooling layer.
    pub fn validate(self) -> Result<Self, SentenceVectorsError> {
        match self.first() {
            Some(SentenceEmbeddingsModuleConfig {
                module_type: SentenceEmbeddingsModuleType::Transformer,
                ..
            }) => (),
            Some(_) => {
                return Err(SentenceVectorsError::InvalidConfigurationError(
                    "First module defined in modules.json must be a Transformer".to_string(),
                ));
            }
            None => {
                return Err(SentenceVectorsError::InvalidConfigurationError(
                    "No modules found in modules.json".to_string(),
                ));
            }
        }

        match self.get(1) {
            Some(SentenceEmbeddingsModuleConfig {
                module_type: SentenceEmbeddingsModuleType::Pooling,
                ..
            }) => (),
            Some(_) => {
                return Err(SentenceVectorsError::InvalidConfigurationError(
                    "Second module defined in modules.json must be a Pooling".to_string(),
                ));
            }
            None => {
                return Err(SentenceVectorsError::InvalidConfigurationError(
                    "Pooling module not found in second position in modules.json".to_string(),
                ));
            }
        }

        Ok(self)
    }

    pub fn pooling_module(&self) -> Result<&SentenceEmbeddingsModuleConfig, SentenceVectorsError> {
        self.get(1).ok_or_else(|| {
            SentenceVectorsError::InvalidConfigurationError(
                "Pooling module not found in modules.json".to_string(),
            )
        })
    }

    pub fn dense_module(&self) -> Option<&SentenceEmbeddingsModuleConfig> {
        self.iter()
            .skip(2)
            .take(2)
            .find(|module| module.module_type == SentenceEmbeddingsModuleType::Dense)
    }

    pub fn has_normalization(&self) -> bool {
        self.iter()
            .skip(2)
            .take(2)
            .any(|module| module.module_type == SentenceEmbeddingsModuleType::Normalize)
    }
}

/// Configuration defining a single module (model's layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceEmbeddingsModuleConfig {
    pub idx: usize,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    #[serde(with = "serde_sentence_embeddings_module_type")]
    pub module_type: SentenceEmbeddingsModuleType,
}

/// Available module types, based on Sentence-Transformers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentenceEmbeddingsModuleType {
    Transformer,
    Pooling,
    Dense,
    Normalize,
}

mod serde_sentence_embeddings_module_type {
    use super::SentenceEmbeddingsModuleType;
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S>(
        module_type: &SentenceEmbeddingsModuleType,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("sentence_transformers.models.{module_type:?}"))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SentenceEmbeddingsModuleType, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SentenceEmbeddingsModuleTypeVisitor;

        impl de::Visitor<'_> for SentenceEmbeddingsModuleTypeVisitor {
            type Value = SentenceEmbeddingsModuleType;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a sentence embeddings module type")
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
                s.split('.')
                    .next_back()
                    .map(|s| serde_json::from_value(serde_json::Value::String(s.to_string())))
                    .transpose()
                    .map_err(de::Error::custom)?
                    .ok_or_else(|| format!("Invalid SentenceEmbeddingsModuleType: {s}"))
                    .map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(SentenceEmbeddingsModuleTypeVisitor)
    }
}

/// Configuration for Sentence-Transformers specific parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceEmbeddingsSentenceBertConfig {
    pub max_seq_length: usize,
    #[serde(default)]
    pub do_lower_case: bool,
}

impl Config for SentenceEmbeddingsSentenceBertConfig {}

/// Configuration for transformer's tokenizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceEmbeddingsTokenizerConfig {
    pub do_lower_case: Option<bool>,
    pub strip_accents: Option<bool>,
}

impl Config for SentenceEmbeddingsTokenizerConfig {}
