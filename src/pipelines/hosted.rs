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

//! # Universal sentence encoder
//!
//! Runs an exported universal sentence encoder ([Cer et al., 2018](https://arxiv.org/abs/1803.11175))
//! saved as a TorchScript module. The module takes a list of strings and returns a tensor of
//! shape (*batch size*, *embedding dimension*).
//!
//! The module reference is either a local file or, with the `remote` feature, a URL. Downloaded
//! archives (`.tar.gz`, `.tgz`, `.zip`) are extracted in the cache and searched for `model.pt`.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use sentence_vectors::pipelines::hosted::UniversalSentenceEncoder;
//! use sentence_vectors::pipelines::vectorization::EmbeddingModel;
//! use tch::Device;
//!
//! let encoder = UniversalSentenceEncoder::load("path/to/use/model.pt", Device::cuda_if_available())?;
//! let embeddings = encoder.embed_batch(&["How old are you?", "What is your age?"])?;
//! # Ok(())
//! # }
//! ```

use std::convert::TryFrom;
use std::fs;
use std::path::{Path, PathBuf};

use tch::{CModule, Device, IValue, Kind, Tensor};
use tracing::info;

use crate::pipelines::vectorization::{Embedding, EmbeddingModel};
use crate::resources::{LocalResource, ResourceProvider};
use crate::SentenceVectorsError;

/// File looked up in extracted module archives
pub const MODULE_FILE_NAME: &str = "model.pt";

const ARCHIVE_SUFFIXES: [&str; 3] = [".tar.gz", ".tgz", ".zip"];

fn is_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Finds `model.pt` in `dir` or its subdirectories, shallowest first.
fn find_module_file(dir: &Path) -> Result<Option<PathBuf>, SentenceVectorsError> {
    let candidate = dir.join(MODULE_FILE_NAME);
    if candidate.is_file() {
        return Ok(Some(candidate));
    }
    let mut subdirs = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()?;
    subdirs.retain(|path| path.is_dir());
    subdirs.sort();
    for subdir in subdirs {
        if let Some(found) = find_module_file(&subdir)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Local path of the TorchScript module behind `reference`.
pub fn resolve_module_path(reference: &str) -> Result<PathBuf, SentenceVectorsError> {
    let resource: Box<dyn ResourceProvider> = if is_url(reference) {
        remote_module(reference)?
    } else {
        Box::new(LocalResource::from(PathBuf::from(reference)))
    };
    let local_path = resource.get_local_path()?;
    if local_path.is_file() {
        return Ok(local_path);
    }
    find_module_file(&local_path)?.ok_or_else(|| {
        SentenceVectorsError::IOError(format!(
            "no {MODULE_FILE_NAME} found under {}",
            local_path.display()
        ))
    })
}

#[cfg(feature = "remote")]
fn remote_module(url: &str) -> Result<Box<dyn ResourceProvider>, SentenceVectorsError> {
    use crate::resources::RemoteResource;

    let cache_subdir = "universal-sentence-encoder";
    let resource = if ARCHIVE_SUFFIXES.iter().any(|suffix| url.ends_with(suffix)) {
        RemoteResource::archive(url, cache_subdir)
    } else {
        RemoteResource::new(url, cache_subdir)
    };
    Ok(Box::new(resource))
}

#[cfg(not(feature = "remote"))]
fn remote_module(url: &str) -> Result<Box<dyn ResourceProvider>, SentenceVectorsError> {
    Err(SentenceVectorsError::InvalidConfigurationError(format!(
        "loading {url} requires the `remote` feature ({} archives or a module file)",
        ARCHIVE_SUFFIXES.join(", ")
    )))
}

/// # TorchScript universal sentence encoder
pub struct UniversalSentenceEncoder {
    module: CModule,
}

impl UniversalSentenceEncoder {
    pub fn load(reference: &str, device: Device) -> Result<Self, SentenceVectorsError> {
        let module_path = resolve_module_path(reference)?;
        let module = CModule::load_on_device(&module_path, device)?;
        info!("module {} loaded", reference);
        Ok(UniversalSentenceEncoder { module })
    }

    /// Encodes a batch of sentences in one call of the module.
    pub fn encode<S: AsRef<str>>(&self, texts: &[S]) -> Result<Tensor, SentenceVectorsError> {
        let input = IValue::StringList(
            texts
                .iter()
                .map(|text| text.as_ref().to_string())
                .collect(),
        );
        let output = tch::no_grad(|| self.module.forward_is(&[input]))?;
        match output {
            IValue::Tensor(embeddings) => Ok(embeddings),
            other => Err(SentenceVectorsError::ValueError(format!(
                "expected a tensor from the encoder module, got {other:?}"
            ))),
        }
    }
}

impl EmbeddingModel for UniversalSentenceEncoder {
    fn embed(&self, text: &str) -> Result<Embedding, SentenceVectorsError> {
        self.embed_batch(&[text])?.pop().ok_or_else(|| {
            SentenceVectorsError::ValueError("the encoder module returned no embedding".to_string())
        })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, SentenceVectorsError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.encode(texts)?.to_kind(Kind::Float).to(Device::Cpu);
        let embeddings = Vec::<Vec<f32>>::try_from(embeddings)?;
        if embeddings.len() != texts.len() {
            return Err(SentenceVectorsError::ValueError(format!(
                "the encoder module returned {} embeddings for {} sentences",
                embeddings.len(),
                texts.len()
            )));
        }
        Ok(embeddings)
    }
}
