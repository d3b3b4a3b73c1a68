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

//! # sent2vec sentence embeddings
//!
//! Reads sent2vec models ([Pagliardini et al., 2018](https://arxiv.org/abs/1703.02507)) stored
//! in the fastText binary format and computes sentence vectors as the average of the input
//! vectors of the sentence's words and word n-grams.
//!
//! The binary layout is little-endian:
//! - header: magic `793712314`, version
//! - arguments: `dim`, `ws`, `epoch`, `minCount`, `neg`, `wordNgrams`, `loss`, `model`,
//!   `bucket`, `minn`, `maxn`, `lrUpdateRate` (i32 each) and `t` (f64)
//! - dictionary: `size`, `nwords`, `nlabels` (i32), `ntokens`, `pruneidx_size` (i64), then
//!   `size` entries (null-terminated word, i64 count, i8 type) and the prune index
//!   (`pruneidx_size` pairs of i32)
//! - quantization flag (u8), then the input matrix: rows and columns (i64) followed by the
//!   row-major f32 values
//!
//! Quantized models are not supported. The output matrix that follows is not read.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use sentence_vectors::pipelines::sent2vec::Sent2VecModel;
//! use sentence_vectors::pipelines::vectorization::EmbeddingModel;
//!
//! let model = Sent2VecModel::load("BioSentVec_PubMed_MIMICIII-bigram_d700.bin")?;
//! let embedding = model.embed("the patient was admitted with chest pain")?;
//! assert_eq!(embedding.len(), model.dim());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use tracing::{info, warn};

use crate::pipelines::vectorization::{Embedding, EmbeddingModel};
use crate::SentenceVectorsError;

/// First field of every fastText-format model file
pub const FASTTEXT_FILEFORMAT_MAGIC: i32 = 793_712_314;

const NGRAM_HASH_MULTIPLIER: u64 = 116_049_371;
const WORD_ENTRY: i8 = 0;

/// Training arguments stored in the model header
#[derive(Debug, Clone, PartialEq)]
pub struct Sent2VecArgs {
    pub dim: i32,
    pub ws: i32,
    pub epoch: i32,
    pub min_count: i32,
    pub neg: i32,
    pub word_ngrams: i32,
    pub loss: i32,
    pub model: i32,
    pub bucket: i32,
    pub minn: i32,
    pub maxn: i32,
    pub lr_update_rate: i32,
    pub t: f64,
}

struct BinaryReader<R> {
    inner: R,
}

impl<R: Read> BinaryReader<R> {
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SentenceVectorsError> {
        let mut buffer = [0u8; N];
        self.inner.read_exact(&mut buffer).map_err(truncated)?;
        Ok(buffer)
    }

    fn read_u8(&mut self) -> Result<u8, SentenceVectorsError> {
        Ok(u8::from_le_bytes(self.read_array()?))
    }

    fn read_i8(&mut self) -> Result<i8, SentenceVectorsError> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    fn read_i32(&mut self) -> Result<i32, SentenceVectorsError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    fn read_i64(&mut self) -> Result<i64, SentenceVectorsError> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    fn read_f64(&mut self) -> Result<f64, SentenceVectorsError> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    fn read_word(&mut self) -> Result<String, SentenceVectorsError> {
        let mut bytes = Vec::new();
        loop {
            match self.read_u8()? {
                0 => break,
                byte => bytes.push(byte),
            }
        }
        String::from_utf8(bytes).map_err(|e| {
            SentenceVectorsError::ValueError(format!("dictionary entry is not valid UTF-8: {e}"))
        })
    }

    fn read_f32s(&mut self, count: usize) -> Result<Vec<f32>, SentenceVectorsError> {
        let mut bytes = vec![0u8; count * 4];
        self.inner.read_exact(&mut bytes).map_err(truncated)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

fn truncated(error: io::Error) -> SentenceVectorsError {
    match error.kind() {
        io::ErrorKind::UnexpectedEof => {
            SentenceVectorsError::IOError("truncated sent2vec model file".to_string())
        }
        _ => error.into(),
    }
}

fn non_negative(value: i64, field: &str) -> Result<usize, SentenceVectorsError> {
    usize::try_from(value).map_err(|_| {
        SentenceVectorsError::InvalidConfigurationError(format!(
            "invalid {field} in sent2vec model: {value}"
        ))
    })
}

/// # sent2vec model
pub struct Sent2VecModel {
    args: Sent2VecArgs,
    word_ids: HashMap<String, usize>,
    nwords: usize,
    prune_index: HashMap<u64, usize>,
    input_rows: usize,
    input_matrix: Vec<f32>,
}

impl Sent2VecModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SentenceVectorsError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            SentenceVectorsError::IOError(format!("could not open {}: {e}", path.display()))
        })?;
        let model = Sent2VecModel::from_reader(BufReader::new(file))?;
        info!(
            model = %path.display(),
            dim = model.args.dim,
            words = model.nwords,
            word_ngrams = model.args.word_ngrams,
            "sent2vec model loaded"
        );
        Ok(model)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SentenceVectorsError> {
        let mut reader = BinaryReader { inner: reader };

        let magic = reader.read_i32()?;
        if magic != FASTTEXT_FILEFORMAT_MAGIC {
            return Err(SentenceVectorsError::InvalidConfigurationError(format!(
                "not a fastText-format model (magic {magic})"
            )));
        }
        let _version = reader.read_i32()?;

        let args = Sent2VecArgs {
            dim: reader.read_i32()?,
            ws: reader.read_i32()?,
            epoch: reader.read_i32()?,
            min_count: reader.read_i32()?,
            neg: reader.read_i32()?,
            word_ngrams: reader.read_i32()?,
            loss: reader.read_i32()?,
            model: reader.read_i32()?,
            bucket: reader.read_i32()?,
            minn: reader.read_i32()?,
            maxn: reader.read_i32()?,
            lr_update_rate: reader.read_i32()?,
            t: reader.read_f64()?,
        };
        if args.maxn > 0 {
            warn!(
                minn = args.minn,
                maxn = args.maxn,
                "character n-grams are ignored, only words and word n-grams are embedded"
            );
        }

        let size = non_negative(reader.read_i32()?.into(), "dictionary size")?;
        let nwords = non_negative(reader.read_i32()?.into(), "word count")?;
        let _nlabels = reader.read_i32()?;
        let _ntokens = reader.read_i64()?;
        let prune_index_size = reader.read_i64()?.max(0) as usize;

        let mut word_ids = HashMap::with_capacity(nwords);
        for id in 0..size {
            let word = reader.read_word()?;
            let _count = reader.read_i64()?;
            let entry_type = reader.read_i8()?;
            if entry_type == WORD_ENTRY && id < nwords {
                word_ids.insert(word, id);
            }
        }

        let mut prune_index = HashMap::with_capacity(prune_index_size);
        for _ in 0..prune_index_size {
            let first = reader.read_i32()?;
            let second = reader.read_i32()?;
            prune_index.insert(
                non_negative(first.into(), "prune index key")? as u64,
                non_negative(second.into(), "prune index value")?,
            );
        }

        if reader.read_u8()? != 0 {
            return Err(SentenceVectorsError::InvalidConfigurationError(
                "quantized sent2vec models are not supported".to_string(),
            ));
        }

        let input_rows = non_negative(reader.read_i64()?, "input matrix rows")?;
        let input_columns = non_negative(reader.read_i64()?, "input matrix columns")?;
        if input_columns != args.dim as usize {
            return Err(SentenceVectorsError::InvalidConfigurationError(format!(
                "input matrix has {input_columns} columns, model dimension is {}",
                args.dim
            )));
        }
        let input_matrix = reader.read_f32s(input_rows * input_columns)?;

        Ok(Sent2VecModel {
            args,
            word_ids,
            nwords,
            prune_index,
            input_rows,
            input_matrix,
        })
    }

    pub fn args(&self) -> &Sent2VecArgs {
        &self.args
    }

    /// Sentence vector dimension
    pub fn dim(&self) -> usize {
        self.args.dim as usize
    }

    /// Rows of the input matrix averaged for `sentence`: in-vocabulary words (unknown words are
    /// dropped), then the hashed word n-grams up to `wordNgrams` words.
    pub fn sentence_rows(&self, sentence: &str) -> Vec<usize> {
        let mut rows = sentence
            .split_whitespace()
            .filter_map(|word| self.word_ids.get(word).copied())
            .collect::<Vec<_>>();

        let word_count = rows.len();
        let max_ngram = self.args.word_ngrams.max(1) as usize;
        let bucket = self.args.bucket.max(0) as u64;
        if bucket > 0 {
            for start in 0..word_count {
                let mut hash = rows[start] as u64;
                for end in (start + 1)..word_count.min(start + max_ngram) {
                    hash = hash
                        .wrapping_mul(NGRAM_HASH_MULTIPLIER)
                        .wrapping_add(rows[end] as u64);
                    if let Some(row) = self.ngram_row(hash % bucket) {
                        rows.push(row);
                    }
                }
            }
        }
        rows
    }

    fn ngram_row(&self, bucket_id: u64) -> Option<usize> {
        if self.prune_index.is_empty() {
            Some(self.nwords + bucket_id as usize)
        } else {
            self.prune_index
                .get(&bucket_id)
                .map(|&pruned_id| self.nwords + pruned_id)
        }
    }

    fn row(&self, index: usize) -> Result<&[f32], SentenceVectorsError> {
        if index >= self.input_rows {
            return Err(SentenceVectorsError::ValueError(format!(
                "row {index} outside of the {} rows input matrix",
                self.input_rows
            )));
        }
        let dim = self.dim();
        Ok(&self.input_matrix[index * dim..(index + 1) * dim])
    }
}

impl EmbeddingModel for Sent2VecModel {
    /// Average of the input vectors of the sentence's rows; a sentence without known words
    /// yields a zero vector.
    fn embed(&self, text: &str) -> Result<Embedding, SentenceVectorsError> {
        let rows = self.sentence_rows(text);
        let mut embedding = vec![0f32; self.dim()];
        if rows.is_empty() {
            return Ok(embedding);
        }
        for &index in &rows {
            for (value, weight) in embedding.iter_mut().zip(self.row(index)?) {
                *value += weight;
            }
        }
        let count = rows.len() as f32;
        embedding.iter_mut().for_each(|value| *value /= count);
        Ok(embedding)
    }
}
