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
use crate::common::activations::TensorFunction;
use std::borrow::Borrow;
use tch::{nn, Tensor};

#[derive(Debug)]
pub struct BertSelfAttention {
    num_attention_heads: i64,
    attention_head_size: i64,
    query: nn::Linear,
    key: nn::Linear,
    value: nn::Linear,
}

impl BertSelfAttention {
    pub fn new<'p, P>(p: P, config: &BertConfig) -> BertSelfAttention
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let query = nn::linear(
            p / "query",
            config.hidden_size,
            config.hidden_size,
            Default::default(),
        );
        let key = nn::linear(
            p / "key",
            config.hidden_size,
            config.hidden_size,
            Default::default(),
        );
        let value = nn::linear(
            p / "value",
            config.hidden_size,
            config.hidden_size,
            Default::default(),
        );

        BertSelfAttention {
            num_attention_heads: config.num_attention_heads,
            attention_head_size: config.hidden_size / config.num_attention_heads,
            query,
            key,
            value,
        }
    }

    fn split_heads(&self, x: Tensor, bs: i64) -> Tensor {
        x.view((bs, -1, self.num_attention_heads, self.attention_head_size))
            .transpose(1, 2)
    }

    fn flatten(&self, x: Tensor, bs: i64) -> Tensor {
        x.transpose(1, 2)
            .contiguous()
            .view((bs, -1, self.num_attention_heads * self.attention_head_size))
    }

    /// `mask` is the additive attention mask of shape (*batch size*, 1, 1, *sequence_length*)
    pub fn forward(&self, hidden_states: &Tensor, mask: &Tensor) -> Tensor {
        let bs = hidden_states.size()[0];

        let query_layer = self.split_heads(hidden_states.apply(&self.query), bs);
        let key_layer = self.split_heads(hidden_states.apply(&self.key), bs);
        let value_layer = self.split_heads(hidden_states.apply(&self.value), bs);
        let query_layer: Tensor = query_layer / (self.attention_head_size as f64).sqrt();

        let scores = query_layer.matmul(&key_layer.transpose(-1, -2)) + mask;
        let weights = scores.softmax(-1, scores.kind());
        self.flatten(weights.matmul(&value_layer), bs)
    }
}

#[derive(Debug)]
struct ResidualOutput {
    linear: nn::Linear,
    layer_norm: nn::LayerNorm,
}

impl ResidualOutput {
    fn new<'p, P>(p: P, config: &BertConfig, input_size: i64) -> ResidualOutput
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let linear = nn::linear(
            p / "dense",
            input_size,
            config.hidden_size,
            Default::default(),
        );
        let layer_norm_config = nn::LayerNormConfig {
            eps: config.layer_norm_eps.unwrap_or(1e-12),
            ..Default::default()
        };
        let layer_norm =
            nn::layer_norm(p / "LayerNorm", vec![config.hidden_size], layer_norm_config);

        ResidualOutput { linear, layer_norm }
    }

    fn forward(&self, hidden_states: &Tensor, input_tensor: &Tensor) -> Tensor {
        let hidden_states: Tensor = input_tensor + hidden_states.apply(&self.linear);
        hidden_states.apply(&self.layer_norm)
    }
}

#[derive(Debug)]
pub struct BertAttention {
    _self: BertSelfAttention,
    output: ResidualOutput,
}

impl BertAttention {
    pub fn new<'p, P>(p: P, config: &BertConfig) -> BertAttention
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let _self = BertSelfAttention::new(p / "self", config);
        let output = ResidualOutput::new(p / "output", config, config.hidden_size);
        BertAttention { _self, output }
    }

    pub fn forward(&self, hidden_states: &Tensor, mask: &Tensor) -> Tensor {
        let self_output = self._self.forward(hidden_states, mask);
        self.output.forward(&self_output, hidden_states)
    }
}

/// Feed-forward block of a BERT layer: intermediate projection with activation, then the
/// residual output projection.
#[derive(Debug)]
pub struct BertFeedForward {
    intermediate: nn::Linear,
    activation: TensorFunction,
    output: ResidualOutput,
}

impl BertFeedForward {
    pub fn new<'p, P>(p: P, config: &BertConfig) -> BertFeedForward
    where
        P: Borrow<nn::Path<'p>>,
    {
        let p = p.borrow();

        let intermediate = nn::linear(
            p / "intermediate" / "dense",
            config.hidden_size,
            config.intermediate_size,
            Default::default(),
        );
        let activation = config.hidden_act.get_function();
        let output = ResidualOutput::new(p / "output", config, config.intermediate_size);

        BertFeedForward {
            intermediate,
            activation,
            output,
        }
    }

    pub fn forward(&self, attention_output: &Tensor) -> Tensor {
        let intermediate = (self.activation.get_fn())(&attention_output.apply(&self.intermediate));
        self.output.forward(&intermediate, attention_output)
    }
}
