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

//! # WordPiece tokenization
//!
//! Splits sentences into the WordPiece tokens of a BERT vocabulary, e.g. to prepare input for
//! the tokenized mode of the BERT serving pipeline.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use sentence_vectors::pipelines::wordpiece::WordPieceTokenizer;
//!
//! let tokenizer = WordPieceTokenizer::from_file("path/to/vocab.txt", true)?;
//! assert_eq!(tokenizer.tokenize_to_line("unaffable"), "un ##aff ##able");
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use rust_tokenizers::tokenizer::{BertTokenizer, Tokenizer};

use crate::SentenceVectorsError;

/// # BERT WordPiece tokenizer
pub struct WordPieceTokenizer {
    tokenizer: BertTokenizer,
}

impl WordPieceTokenizer {
    /// Loads a one-token-per-line vocabulary. Accents are stripped for lower-cased models only.
    pub fn from_file<P: AsRef<Path>>(
        vocab: P,
        lower_case: bool,
    ) -> Result<Self, SentenceVectorsError> {
        let vocab = vocab.as_ref();
        let vocab_path = vocab.to_str().ok_or_else(|| {
            SentenceVectorsError::IOError(format!("invalid vocabulary path {}", vocab.display()))
        })?;
        let tokenizer = BertTokenizer::from_file(vocab_path, lower_case, lower_case)?;
        Ok(WordPieceTokenizer { tokenizer })
    }

    pub fn tokenize(&self, sentence: &str) -> Vec<String> {
        self.tokenizer.tokenize(sentence)
    }

    /// Tokens joined by single spaces.
    pub fn tokenize_to_line(&self, sentence: &str) -> String {
        self.tokenize(sentence).join(" ").trim_end().to_string()
    }
}
