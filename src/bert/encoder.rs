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

use crate::bert::attention::{BertAttention, BertFeedForward};
use crate::bert::bert_model::BertConfig;
use std::borrow::Borrow;
use tch::{nn, Tensor};

/// # BERT Layer
/// Self-attention block followed by the feed-forward block.
pub struct BertLayer {
    attention: BertAttention,
    feed_forward: BertFeedForward,
}

impl BertLayer {
    pub fn new<'p, P>(p: P, config: &BertConfig) -> BertLayer
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let attention = BertAttention::new(p / "attention", config);
        let feed_forward = BertFeedForward::new(p, config);

        BertLayer {
            attention,
            feed_forward,
        }
    }

    pub fn forward(&self, hidden_states: &Tensor, mask: &Tensor) -> Tensor {
        let attention_output = self.attention.forward(hidden_states, mask);
        self.feed_forward.forward(&attention_output)
    }
}

/// # BERT Encoder
/// Stack of `BertLayer`. The output of every layer is kept so that callers can pool from
/// any layer, not only the last one.
pub struct BertEncoder {
    layers: Vec<BertLayer>,
}

impl BertEncoder {
    pub fn new<'p, P>(p: P, config: &BertConfig) -> BertEncoder
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow() / "layer";
        let layers = (0..config.num_hidden_layers)
            .map(|layer_index| BertLayer::new(&p / layer_index, config))
            .collect();

        BertEncoder { layers }
    }

    /// Returns the hidden states produced by each layer, first layer first.
    pub fn forward(&self, embeddings: Tensor, mask: &Tensor) -> Vec<Tensor> {
        let mut all_hidden_states = Vec::with_capacity(self.layers.len());
        let mut hidden_state = embeddings;
        for layer in &self.layers {
            hidden_state = layer.forward(&hidden_state, mask);
            all_hidden_states.push(hidden_state.shallow_clone());
        }
        all_hidden_states
    }
}
