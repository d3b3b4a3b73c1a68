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

use crate::bert::bert_model::BertConfig;
use std::borrow::Borrow;
use tch::nn::{embedding, EmbeddingConfig};
use tch::{nn, Kind, Tensor};

#[derive(Debug)]
/// # Embedding layer of the BERT encoder
/// Sum of the word, position and segment (token type) embeddings, followed by a layer norm.
pub struct BertEmbeddings {
    word_embeddings: nn::Embedding,
    position_embeddings: nn::Embedding,
    token_type_embeddings: nn::Embedding,
    layer_norm: nn::LayerNorm,
}

impl BertEmbeddings {
    pub fn new<'p, P>(p: P, config: &BertConfig) -> BertEmbeddings
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let embedding_config = EmbeddingConfig {
            padding_idx: 0,
            ..Default::default()
        };

        let word_embeddings = embedding(
            p / "word_embeddings",
            config.vocab_size,
            config.hidden_size,
            embedding_config,
        );
        let position_embeddings = embedding(
            p / "position_embeddings",
            config.max_position_embeddings,
            config.hidden_size,
            Default::default(),
        );
        let token_type_embeddings = embedding(
            p / "token_type_embeddings",
            config.type_vocab_size,
            config.hidden_size,
            Default::default(),
        );

        let layer_norm_config = nn::LayerNormConfig {
            eps: config.layer_norm_eps.unwrap_or(1e-12),
            ..Default::default()
        };
        let layer_norm =
            nn::layer_norm(p / "LayerNorm", vec![config.hidden_size], layer_norm_config);

        BertEmbeddings {
            word_embeddings,
            position_embeddings,
            token_type_embeddings,
            layer_norm,
        }
    }

    /// Embeds a batch of token ids of shape (*batch size*, *sequence_length*). All tokens are
    /// assigned to the first segment.
    pub fn forward(&self, input_ids: &Tensor) -> Tensor {
        let input_shape = input_ids.size();
        let seq_length = input_shape[1];
        let device = input_ids.device();

        let position_ids = Tensor::arange(seq_length, (Kind::Int64, device))
            .unsqueeze(0)
            .expand(input_shape.as_slice(), true);
        let token_type_ids = Tensor::zeros(input_shape.as_slice(), (Kind::Int64, device));

        let embeddings = input_ids.apply(&self.word_embeddings)
            + position_ids.apply(&self.position_embeddings)
            + token_type_ids.apply(&self.token_type_embeddings);
        embeddings.apply(&self.layer_norm)
    }
}
