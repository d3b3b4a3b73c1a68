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

use crate::SentenceVectorsError;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tch::{Kind, Tensor};

/// # Reduction of the token vectors of a sentence into one sentence vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolingStrategy {
    /// Masked average over the tokens
    ReduceMean,
    /// Masked maximum over the tokens
    ReduceMax,
    /// Concatenation of `ReduceMean` and `ReduceMax`
    ReduceMeanMax,
    /// Vector of the first token (`[CLS]`)
    FirstToken,
    /// Vector of the last real token (`[SEP]`)
    LastToken,
}

impl FromStr for PoolingStrategy {
    type Err = SentenceVectorsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REDUCE_MEAN" => Ok(PoolingStrategy::ReduceMean),
            "REDUCE_MAX" => Ok(PoolingStrategy::ReduceMax),
            "REDUCE_MEAN_MAX" => Ok(PoolingStrategy::ReduceMeanMax),
            "FIRST_TOKEN" | "CLS_TOKEN" => Ok(PoolingStrategy::FirstToken),
            "LAST_TOKEN" | "SEP_TOKEN" => Ok(PoolingStrategy::LastToken),
            "NONE" => Err(SentenceVectorsError::InvalidConfigurationError(
                "pooling strategy NONE produces one vector per token, a sentence vector is required"
                    .to_string(),
            )),
            other => Err(SentenceVectorsError::InvalidConfigurationError(format!(
                "unknown pooling strategy `{other}`"
            ))),
        }
    }
}

impl Display for PoolingStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PoolingStrategy::ReduceMean => "REDUCE_MEAN",
            PoolingStrategy::ReduceMax => "REDUCE_MAX",
            PoolingStrategy::ReduceMeanMax => "REDUCE_MEAN_MAX",
            PoolingStrategy::FirstToken => "FIRST_TOKEN",
            PoolingStrategy::LastToken => "LAST_TOKEN",
        };
        f.write_str(name)
    }
}

impl PoolingStrategy {
    /// Pools `hidden_states` (*batch size*, *sequence_length*, *hidden_size*) into
    /// (*batch size*, *hidden_size*), or twice the hidden size for `ReduceMeanMax`.
    /// `mask` has shape (*batch size*, *sequence_length*), 1 for real tokens.
    pub fn pool(&self, hidden_states: &Tensor, mask: &Tensor) -> Tensor {
        match self {
            PoolingStrategy::ReduceMean => masked_reduce_mean(hidden_states, mask),
            PoolingStrategy::ReduceMax => masked_reduce_max(hidden_states, mask),
            PoolingStrategy::ReduceMeanMax => Tensor::cat(
                &[
                    masked_reduce_mean(hidden_states, mask),
                    masked_reduce_max(hidden_states, mask),
                ],
                1,
            ),
            PoolingStrategy::FirstToken => hidden_states.select(1, 0),
            PoolingStrategy::LastToken => last_token(hidden_states, mask),
        }
    }
}

fn expanded_mask(hidden_states: &Tensor, mask: &Tensor) -> Tensor {
    mask.unsqueeze(-1).to_kind(hidden_states.kind())
}

/// Σ(h·m) / (Σm + 1e-10)
pub fn masked_reduce_mean(hidden_states: &Tensor, mask: &Tensor) -> Tensor {
    let mask = expanded_mask(hidden_states, mask);
    let summed = (hidden_states * &mask).sum_dim_intlist([1].as_slice(), false, Kind::Float);
    let counts = mask.sum_dim_intlist([1].as_slice(), false, Kind::Float);
    summed / (counts + 1e-10)
}

/// max(h − (1 − m)·1e30)
pub fn masked_reduce_max(hidden_states: &Tensor, mask: &Tensor) -> Tensor {
    let mask = expanded_mask(hidden_states, mask);
    (hidden_states + (mask - 1.0) * 1e30).max_dim(1, false).0
}

/// Vector at position Σm − 1
pub fn last_token(hidden_states: &Tensor, mask: &Tensor) -> Tensor {
    let hidden_size = hidden_states.size().last().copied().unwrap_or(0);
    let positions = (mask.sum_dim_intlist([1].as_slice(), false, Kind::Int64) - 1).clamp_min(0);
    let index = positions.view([-1, 1, 1]).expand([-1, 1, hidden_size], false);
    hidden_states.gather(1, &index, false).squeeze_dim(1)
}

/// # Encoder layers the token vectors are taken from
///
/// Negative indices count from the last layer (`-1` is the last layer). When several layers are
/// given, their outputs are concatenated on the hidden axis before pooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolingLayers(Vec<i64>);

impl Default for PoolingLayers {
    fn default() -> Self {
        PoolingLayers(vec![-2])
    }
}

impl PoolingLayers {
    pub fn new(indices: Vec<i64>) -> Result<Self, SentenceVectorsError> {
        if indices.is_empty() {
            return Err(SentenceVectorsError::InvalidConfigurationError(
                "at least one pooling layer is required".to_string(),
            ));
        }
        Ok(PoolingLayers(indices))
    }

    pub fn indices(&self) -> &[i64] {
        &self.0
    }

    /// Resolves the indices against an encoder with `num_layers` layers.
    pub fn resolve(&self, num_layers: usize) -> Result<Vec<usize>, SentenceVectorsError> {
        let total = num_layers as i64;
        self.0
            .iter()
            .map(|&index| {
                let resolved = if index < 0 { total + index } else { index };
                if (0..total).contains(&resolved) {
                    Ok(resolved as usize)
                } else {
                    Err(SentenceVectorsError::InvalidConfigurationError(format!(
                        "pooling layer {index} out of range for an encoder with {num_layers} layers"
                    )))
                }
            })
            .collect()
    }
}

impl FromStr for PoolingLayers {
    type Err = SentenceVectorsError;

    /// Parses `"-2"`, `"-2,-1"` or `"-2 -1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let indices = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i64>().map_err(|e| {
                    SentenceVectorsError::InvalidConfigurationError(format!(
                        "invalid pooling layer `{part}`: {e}"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        PoolingLayers::new(indices)
    }
}

impl Display for PoolingLayers {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let indices = self
            .0
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // batch of one sentence, 3 positions of which 2 are real tokens, hidden size 2
    fn hidden_and_mask() -> (Tensor, Tensor) {
        let hidden = Tensor::from_slice(&[1f32, -4., 3., 2., 50., 50.]).view((1, 3, 2));
        let mask = Tensor::from_slice(&[1i64, 1, 0]).view((1, 3));
        (hidden, mask)
    }

    fn pooled(strategy: PoolingStrategy) -> Vec<f32> {
        let (hidden, mask) = hidden_and_mask();
        Vec::<f32>::try_from(strategy.pool(&hidden, &mask).squeeze_dim(0)).unwrap()
    }

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn reductions_skip_padding() {
        assert_close(&pooled(PoolingStrategy::ReduceMean), &[2., -1.]);
        assert_close(&pooled(PoolingStrategy::ReduceMax), &[3., 2.]);
        assert_close(&pooled(PoolingStrategy::ReduceMeanMax), &[2., -1., 3., 2.]);
    }

    #[test]
    fn token_strategies_pick_first_and_last_real_token() {
        assert_close(&pooled(PoolingStrategy::FirstToken), &[1., -4.]);
        assert_close(&pooled(PoolingStrategy::LastToken), &[3., 2.]);
    }

    #[test]
    fn strategies_parse_with_aliases() {
        assert_eq!(
            "reduce_mean".parse::<PoolingStrategy>().unwrap(),
            PoolingStrategy::ReduceMean
        );
        assert_eq!(
            "CLS_TOKEN".parse::<PoolingStrategy>().unwrap(),
            PoolingStrategy::FirstToken
        );
        assert_eq!(
            "SEP_TOKEN".parse::<PoolingStrategy>().unwrap(),
            PoolingStrategy::LastToken
        );
        assert!("NONE".parse::<PoolingStrategy>().is_err());
        assert!("AVERAGE".parse::<PoolingStrategy>().is_err());
    }

    #[test]
    fn layers_parse_and_resolve_from_the_end() {
        let layers: PoolingLayers = "-2, -1".parse().unwrap();
        assert_eq!(layers.indices(), &[-2, -1]);
        assert_eq!(layers.resolve(12).unwrap(), vec![10, 11]);

        let layers: PoolingLayers = "-4 0".parse().unwrap();
        assert_eq!(layers.resolve(4).unwrap(), vec![0, 0]);
        assert!("-5".parse::<PoolingLayers>().unwrap().resolve(4).is_err());
        assert!("".parse::<PoolingLayers>().is_err());
        assert!("-1,x".parse::<PoolingLayers>().is_err());
    }
}
