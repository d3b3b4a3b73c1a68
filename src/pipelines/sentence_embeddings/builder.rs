use std::path::{Path, PathBuf};

use tch::Device;
use tracing::info;

use crate::pipelines::sentence_embeddings::{
    SentenceEmbeddingsConfig, SentenceEmbeddingsModel, SentenceEmbeddingsModulesConfig,
};
use crate::resources::{LocalResource, ResourceProvider};
use crate::{Config, SentenceVectorsError};

#[cfg(feature = "remote")]
use crate::resources::RemoteResource;

/// Location of the Sentence-Transformers files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// Local directory with the Sentence-Transformers layout
    Local(PathBuf),
    /// Hugging Face hub repository id, e.g. `sentence-transformers/all-MiniLM-L6-v2`
    #[cfg(feature = "remote")]
    Remote(String),
}

/// # SentenceEmbeddings Model Builder
///
/// Allows the user to build a model from standard Sentence-Transformer files
/// (configuration and weights), stored locally or on the Hugging Face hub.
pub struct SentenceEmbeddingsBuilder {
    device: Device,
    source: ModelSource,
}

impl SentenceEmbeddingsBuilder {
    pub fn local<P: Into<PathBuf>>(model_dir: P) -> Self {
        Self {
            device: Device::cuda_if_available(),
            source: ModelSource::Local(model_dir.into()),
        }
    }

    /// Files are downloaded from `https://huggingface.co/{repo_id}/resolve/main/` and cached.
    #[cfg(feature = "remote")]
    pub fn remote<S: Into<String>>(repo_id: S) -> Self {
        Self {
            device: Device::cuda_if_available(),
            source: ModelSource::Remote(repo_id.into()),
        }
    }

    /// An existing directory is loaded locally, anything else is taken as a hub repository id.
    pub fn from_reference(reference: &str) -> Self {
        if Path::new(reference).is_dir() {
            return Self::local(reference);
        }
        #[cfg(feature = "remote")]
        {
            Self::remote(reference)
        }
        #[cfg(not(feature = "remote"))]
        {
            Self::local(reference)
        }
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    fn resource(&self, file: &str) -> Box<dyn ResourceProvider + Send> {
        match &self.source {
            ModelSource::Local(model_dir) => Box::new(LocalResource::from(model_dir.join(file))),
            #[cfg(feature = "remote")]
            ModelSource::Remote(repo_id) => Box::new(RemoteResource::from_hub(repo_id, file)),
        }
    }

    /// Resolves the resources of the model. `modules.json` is read first to locate the pooling
    /// and dense module files.
    pub fn config(&self) -> Result<SentenceEmbeddingsConfig, SentenceVectorsError> {
        let modules_config_resource = self.resource("modules.json");
        let modules =
            SentenceEmbeddingsModulesConfig::from_file(modules_config_resource.get_local_path()?)?
                .validate()?;

        let pooling_config_resource =
            self.resource(&module_file(&modules.pooling_module()?.path, "config.json"));

        let (dense_config_resource, dense_weights_resource) = match modules.dense_module() {
            Some(module) => (
                Some(self.resource(&module_file(&module.path, "config.json"))),
                Some(self.resource(&module_file(&module.path, "rust_model.ot"))),
            ),
            None => (None, None),
        };

        Ok(SentenceEmbeddingsConfig {
            modules_config_resource,
            transformer_config_resource: self.resource("config.json"),
            transformer_weights_resource: self.resource("rust_model.ot"),
            pooling_config_resource,
            dense_config_resource,
            dense_weights_resource,
            sentence_bert_config_resource: self.resource("sentence_bert_config.json"),
            tokenizer_config_resource: self.resource("tokenizer_config.json"),
            tokenizer_vocab_resource: self.resource("vocab.txt"),
            device: self.device,
        })
    }

    pub fn create_model(self) -> Result<SentenceEmbeddingsModel, SentenceVectorsError> {
        info!(source = ?self.source, "loading sentence embeddings model");
        SentenceEmbeddingsModel::new(self.config()?)
    }
}

/// Path of `file` inside a module directory, `/`-separated as in hub URLs
fn module_file(module_path: &str, file: &str) -> String {
    let module_path = module_path.trim_matches('/');
    if module_path.is_empty() {
        file.to_string()
    } else {
        format!("{module_path}/{file}")
    }
}
