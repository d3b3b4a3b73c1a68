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

use tch::Tensor;

/// # Padded token ids of a batch and their attention masks
pub struct PaddedBatch {
    /// One 1-D tensor of length `max_len` per input
    pub token_ids: Vec<Tensor>,
    /// 1 for real tokens, 0 for padding
    pub masks: Vec<Tensor>,
}

/// Right-pads every id sequence with `pad_id` to the longest sequence of the batch.
pub fn pad_with_mask(token_ids: Vec<Vec<i64>>, pad_id: i64) -> PaddedBatch {
    let max_len = token_ids.iter().map(Vec::len).max().unwrap_or(0);

    let mut padded_ids = Vec::with_capacity(token_ids.len());
    let mut masks = Vec::with_capacity(token_ids.len());
    for mut ids in token_ids {
        let length = ids.len();
        ids.resize(max_len, pad_id);
        let mask = (0..max_len)
            .map(|position| i64::from(position < length))
            .collect::<Vec<_>>();
        padded_ids.push(Tensor::from_slice(&ids));
        masks.push(Tensor::from_slice(&mask));
    }
    PaddedBatch {
        token_ids: padded_ids,
        masks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorter_inputs_are_padded_and_masked() {
        let batch = pad_with_mask(vec![vec![101, 7, 102], vec![101, 102]], 0);
        let ids = batch
            .token_ids
            .iter()
            .map(|ids| Vec::<i64>::try_from(ids).unwrap())
            .collect::<Vec<_>>();
        let masks = batch
            .masks
            .iter()
            .map(|mask| Vec::<i64>::try_from(mask).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![vec![101, 7, 102], vec![101, 102, 0]]);
        assert_eq!(masks, vec![vec![1, 1, 1], vec![1, 1, 0]]);
    }

    #[test]
    fn empty_batch_stays_empty() {
        let batch = pad_with_mask(Vec::new(), 0);
        assert!(batch.token_ids.is_empty());
        assert!(batch.masks.is_empty());
    }
}
