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
use std::path::Path;

use tch::{Device, Kind, Tensor};
use tracing::info;

use crate::pipelines::flair::CharLanguageModel;
use crate::pipelines::vectorization::{Embedding, EmbeddingModel};
use crate::SentenceVectorsError;

/// Character positions whose hidden state represents each token.
///
/// The language model reads `"\n" + tokens.join(" ") + " "`, reversed (markers excluded) for
/// backward models. A forward model represents a token by the state at the character following
/// it; a backward model by the state at the character preceding it in the original text, which
/// follows it in reversed order.
pub(crate) fn token_offsets(token_lengths: &[usize], is_forward: bool) -> Vec<i64> {
    let text_length =
        token_lengths.iter().sum::<usize>() + token_lengths.len().saturating_sub(1);
    let mut offset_forward = 1;
    let mut offset_backward = text_length + 1;

    let mut offsets = Vec::with_capacity(token_lengths.len());
    for &length in token_lengths {
        offset_forward += length;
        let offset = if is_forward {
            offset_forward
        } else {
            offset_backward
        };
        offsets.push(offset as i64);
        offset_forward += 1;
        offset_backward = offset_backward.saturating_sub(length + 1);
    }
    offsets
}

/// # Contextual string embeddings of one Flair language model
pub struct FlairEmbeddings {
    language_model: CharLanguageModel,
}

impl FlairEmbeddings {
    pub fn new(language_model: CharLanguageModel) -> Self {
        FlairEmbeddings { language_model }
    }

    pub fn from_dir<P: AsRef<Path>>(
        model_dir: P,
        device: Device,
    ) -> Result<Self, SentenceVectorsError> {
        Ok(FlairEmbeddings::new(CharLanguageModel::from_dir(
            model_dir, device,
        )?))
    }

    pub fn embedding_dim(&self) -> i64 {
        self.language_model.output_dim()
    }

    /// One vector per token, shape (*number of tokens*, *embedding_dim*).
    pub fn token_embeddings<S: AsRef<str>>(&self, tokens: &[S]) -> Tensor {
        let text = tokens
            .iter()
            .map(|token| token.as_ref())
            .collect::<Vec<&str>>()
            .join(" ");
        let is_forward = self.language_model.is_forward();
        let text = if is_forward {
            text
        } else {
            text.chars().rev().collect()
        };

        let states = self.language_model.representation(&text);
        let lengths = tokens
            .iter()
            .map(|token| token.as_ref().chars().count())
            .collect::<Vec<_>>();
        let index = Tensor::from_slice(&token_offsets(&lengths, is_forward))
            .to(self.language_model.device());
        states.index_select(0, &index)
    }
}

/// # Mean of the stacked token embeddings of a sentence
///
/// Token embeddings of every model are concatenated per token, then averaged over the tokens.
/// Tokens are the whitespace-separated words of the sentence.
pub struct DocumentPoolEmbeddings {
    embeddings: Vec<FlairEmbeddings>,
    embedding_dim: i64,
}

impl DocumentPoolEmbeddings {
    pub fn new(embeddings: Vec<FlairEmbeddings>) -> Result<Self, SentenceVectorsError> {
        if embeddings.is_empty() {
            return Err(SentenceVectorsError::InvalidConfigurationError(
                "at least one Flair model is required".to_string(),
            ));
        }
        let embedding_dim = embeddings.iter().map(FlairEmbeddings::embedding_dim).sum();
        Ok(DocumentPoolEmbeddings {
            embeddings,
            embedding_dim,
        })
    }

    /// Loads one `FlairEmbeddings` per model directory.
    pub fn from_dirs<P: AsRef<Path>>(
        model_dirs: &[P],
        device: Device,
    ) -> Result<Self, SentenceVectorsError> {
        let embeddings = model_dirs
            .iter()
            .map(|model_dir| FlairEmbeddings::from_dir(model_dir, device))
            .collect::<Result<Vec<_>, _>>()?;
        let pool = DocumentPoolEmbeddings::new(embeddings)?;
        info!(
            models = model_dirs.len(),
            embedding_dim = pool.embedding_dim,
            "flair document pool ready"
        );
        Ok(pool)
    }

    /// Loads the models of a comma-separated list of directories, e.g.
    /// `pubmed-forward,pubmed-backward`.
    pub fn from_model_list(models: &str, device: Device) -> Result<Self, SentenceVectorsError> {
        let model_dirs = models
            .split(',')
            .map(str::trim)
            .filter(|model_dir| !model_dir.is_empty())
            .collect::<Vec<_>>();
        DocumentPoolEmbeddings::from_dirs(&model_dirs, device)
    }

    pub fn embedding_dim(&self) -> i64 {
        self.embedding_dim
    }
}

impl EmbeddingModel for DocumentPoolEmbeddings {
    fn embed(&self, text: &str) -> Result<Embedding, SentenceVectorsError> {
        let tokens = text.split_whitespace().collect::<Vec<_>>();
        if tokens.is_empty() {
            return Ok(vec![0f32; self.embedding_dim as usize]);
        }

        let stacked = self
            .embeddings
            .iter()
            .map(|embeddings| embeddings.token_embeddings(&tokens).to(Device::Cpu))
            .collect::<Vec<_>>();
        let pooled = Tensor::cat(&stacked, 1).mean_dim([0].as_slice(), false, Kind::Float);
        Ok(Vec::<f32>::try_from(pooled)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_offsets_point_after_each_token() {
        // "\nThe cat sat. " -> positions of the spaces following each token
        assert_eq!(token_offsets(&[3, 3, 4], true), vec![4, 8, 13]);
    }

    #[test]
    fn backward_offsets_point_after_each_reversed_token() {
        // "\n.tas tac ehT " -> positions of the characters following "ehT", "tac" and ".tas"
        assert_eq!(token_offsets(&[3, 3, 4], false), vec![13, 9, 5]);
    }

    #[test]
    fn single_token_offsets() {
        assert_eq!(token_offsets(&[5], true), vec![6]);
        assert_eq!(token_offsets(&[5], false), vec![6]);
        assert!(token_offsets(&[], true).is_empty());
    }
}
