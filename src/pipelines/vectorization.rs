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

//! # Sentence-pair vectorization pipeline
//!
//! Reads a file of tab-separated sentence pairs (`left\tright`, one pair per line), embeds both
//! sentences of every pair with an [`EmbeddingModel`] and writes one output line per accepted
//! pair: the two vectors as comma-joined decimal text, separated by a tab.
//!
//! Line rules:
//! - an empty or whitespace-only line is skipped,
//! - a line whose right-hand field is at most one character long once stripped is skipped,
//! - a line without a tab is malformed; the run fails or skips it depending on the
//!   [`MalformedLinePolicy`].
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use sentence_vectors::pipelines::vectorization::{
//!     Embedding, EmbeddingModel, MalformedLinePolicy, VectorizationConfig, VectorizationPipeline,
//! };
//! use sentence_vectors::SentenceVectorsError;
//!
//! struct LengthModel;
//!
//! impl EmbeddingModel for LengthModel {
//!     fn embed(&self, text: &str) -> Result<Embedding, SentenceVectorsError> {
//!         Ok(vec![text.len() as f32, text.split_whitespace().count() as f32])
//!     }
//! }
//!
//! let pipeline = VectorizationPipeline::new(VectorizationConfig {
//!     on_malformed: MalformedLinePolicy::Skip,
//! });
//! let summary = pipeline.run(&LengthModel, "sentences.txt", "vectors.txt")?;
//! # Ok(())
//! # }
//! ```

use crate::SentenceVectorsError;
use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Sentence embedding, length fixed by the model
pub type Embedding = Vec<f32>;

/// # Model able to turn a sentence into a fixed-size vector
///
/// `embed` is the only required method. Models that can encode several sentences in a single
/// forward pass (or a single server round-trip) override `embed_batch`; models accepting
/// pre-tokenized input override `embed_tokens` and `embed_tokens_batch`.
pub trait EmbeddingModel {
    /// Computes the embedding of a single sentence.
    fn embed(&self, text: &str) -> Result<Embedding, SentenceVectorsError>;

    /// Computes the embeddings of several sentences, in input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, SentenceVectorsError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Computes the embedding of an already tokenized sentence. Defaults to embedding the
    /// space-joined tokens.
    fn embed_tokens(&self, tokens: &[String]) -> Result<Embedding, SentenceVectorsError> {
        self.embed(&tokens.join(" "))
    }

    /// Computes the embeddings of several tokenized sentences, in input order.
    fn embed_tokens_batch(
        &self,
        sentences: &[Vec<String>],
    ) -> Result<Vec<Embedding>, SentenceVectorsError> {
        sentences
            .iter()
            .map(|tokens| self.embed_tokens(tokens))
            .collect()
    }
}

impl<M: EmbeddingModel + ?Sized> EmbeddingModel for &M {
    fn embed(&self, text: &str) -> Result<Embedding, SentenceVectorsError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, SentenceVectorsError> {
        (**self).embed_batch(texts)
    }

    fn embed_tokens(&self, tokens: &[String]) -> Result<Embedding, SentenceVectorsError> {
        (**self).embed_tokens(tokens)
    }

    fn embed_tokens_batch(
        &self,
        sentences: &[Vec<String>],
    ) -> Result<Vec<Embedding>, SentenceVectorsError> {
        (**self).embed_tokens_batch(sentences)
    }
}

impl<M: EmbeddingModel + ?Sized> EmbeddingModel for Box<M> {
    fn embed(&self, text: &str) -> Result<Embedding, SentenceVectorsError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, SentenceVectorsError> {
        (**self).embed_batch(texts)
    }

    fn embed_tokens(&self, tokens: &[String]) -> Result<Embedding, SentenceVectorsError> {
        (**self).embed_tokens(tokens)
    }

    fn embed_tokens_batch(
        &self,
        sentences: &[Vec<String>],
    ) -> Result<Vec<Embedding>, SentenceVectorsError> {
        (**self).embed_tokens_batch(sentences)
    }
}

/// # Pair of sentences read from one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentencePairRecord {
    pub left: String,
    pub right: String,
}

/// Outcome of parsing one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Line produces no output (empty, or right-hand field too short)
    Skipped,
    /// Line cannot be split into a pair
    Malformed(String),
    /// Line holds a sentence pair
    Pair(SentencePairRecord),
}

impl SentencePairRecord {
    /// Parses a `left\tright` line. Fields beyond the second are ignored, both sentences are
    /// whitespace-stripped.
    pub fn parse_line(line: &str) -> ParsedLine {
        if line.trim().is_empty() {
            return ParsedLine::Skipped;
        }

        let mut fields = line.split('\t');
        let left = fields.next().unwrap_or_default();
        let right = match fields.next() {
            Some(right) => right.trim(),
            None => return ParsedLine::Malformed("missing tab separator".to_string()),
        };

        if right.chars().count() <= 1 {
            return ParsedLine::Skipped;
        }

        ParsedLine::Pair(SentencePairRecord {
            left: left.trim().to_string(),
            right: right.to_string(),
        })
    }
}

/// Serializes an embedding as comma-joined decimal text (shortest representation that
/// round-trips, e.g. `0.1`).
pub fn format_embedding(embedding: &[f32]) -> String {
    let mut output = String::with_capacity(embedding.len() * 12);
    for (position, value) in embedding.iter().enumerate() {
        if position > 0 {
            output.push(',');
        }
        output.push_str(&value.to_string());
    }
    output
}

/// # Output line for one sentence pair
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub left: Embedding,
    pub right: Embedding,
}

impl OutputRecord {
    /// `left + "\t" + right + "\n"`
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\n",
            format_embedding(&self.left),
            format_embedding(&self.right)
        )
    }
}

/// # Behaviour for lines that cannot be split into a sentence pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedLinePolicy {
    /// Abort the run, the output file keeps the lines written so far
    #[default]
    Fail,
    /// Log a warning and continue with the next line
    Skip,
}

impl FromStr for MalformedLinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(MalformedLinePolicy::Fail),
            "skip" => Ok(MalformedLinePolicy::Skip),
            other => Err(format!(
                "invalid malformed line policy `{other}` (expected `fail` or `skip`)"
            )),
        }
    }
}

impl Display for MalformedLinePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedLinePolicy::Fail => write!(f, "fail"),
            MalformedLinePolicy::Skip => write!(f, "skip"),
        }
    }
}

/// # Configuration for the vectorization pipeline
#[derive(Debug, Clone, Default)]
pub struct VectorizationConfig {
    /// What to do with lines missing the tab separator
    pub on_malformed: MalformedLinePolicy,
}

/// # Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VectorizationSummary {
    /// Lines examined, including empty ones
    pub lines_read: usize,
    /// Output lines written
    pub pairs_written: usize,
    /// Lines skipped by the empty/short line rule
    pub lines_skipped: usize,
    /// Malformed lines skipped under `MalformedLinePolicy::Skip`
    pub malformed_lines: usize,
    /// Dimension of the first embedding written
    pub dimension: Option<usize>,
}

impl VectorizationSummary {
    fn observe_dimension(&mut self, line_number: usize, record: &OutputRecord) {
        let expected = *self.dimension.get_or_insert(record.left.len());
        for dimension in [record.left.len(), record.right.len()] {
            if dimension != expected {
                warn!(
                    line_number,
                    expected, dimension, "embedding dimension changed within the run"
                );
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SentenceInput {
    Raw,
    Tokenized,
}

/// # Sentence-pair vectorization pipeline
pub struct VectorizationPipeline {
    config: VectorizationConfig,
}

impl Default for VectorizationPipeline {
    fn default() -> Self {
        VectorizationPipeline::new(VectorizationConfig::default())
    }
}

impl VectorizationPipeline {
    pub fn new(config: VectorizationConfig) -> Self {
        VectorizationPipeline { config }
    }

    /// Vectorizes `input_path` into `output_path`, embedding the sentences as plain text. Both
    /// sentences of a pair are sent to the model in one `embed_batch` call.
    ///
    /// The output file is truncated first. If the run fails part-way, the output file holds
    /// the lines written before the failure.
    pub fn run<M, P, Q>(
        &self,
        model: &M,
        input_path: P,
        output_path: Q,
    ) -> Result<VectorizationSummary, SentenceVectorsError>
    where
        M: EmbeddingModel + ?Sized,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        self.run_with(
            model,
            input_path.as_ref(),
            output_path.as_ref(),
            SentenceInput::Raw,
        )
    }

    /// Same as `run`, but every sentence is treated as space-separated tokens. Both token
    /// lists of a pair are sent to the model in one `embed_tokens_batch` call.
    pub fn run_tokenized<M, P, Q>(
        &self,
        model: &M,
        input_path: P,
        output_path: Q,
    ) -> Result<VectorizationSummary, SentenceVectorsError>
    where
        M: EmbeddingModel + ?Sized,
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        self.run_with(
            model,
            input_path.as_ref(),
            output_path.as_ref(),
            SentenceInput::Tokenized,
        )
    }

    fn run_with<M>(
        &self,
        model: &M,
        input_path: &Path,
        output_path: &Path,
        input: SentenceInput,
    ) -> Result<VectorizationSummary, SentenceVectorsError>
    where
        M: EmbeddingModel + ?Sized,
    {
        let content = fs::read_to_string(input_path).map_err(|e| {
            SentenceVectorsError::IOError(format!("{}: {e}", input_path.display()))
        })?;
        let output_file = File::create(output_path).map_err(|e| {
            SentenceVectorsError::IOError(format!("{}: {e}", output_path.display()))
        })?;
        let mut writer = BufWriter::new(output_file);
        let mut summary = VectorizationSummary::default();

        for (index, line) in content.split('\n').enumerate() {
            let line_number = index + 1;
            summary.lines_read += 1;

            let record = match SentencePairRecord::parse_line(line) {
                ParsedLine::Pair(record) => record,
                ParsedLine::Skipped => {
                    summary.lines_skipped += 1;
                    continue;
                }
                ParsedLine::Malformed(reason) => match self.config.on_malformed {
                    MalformedLinePolicy::Fail => {
                        return Err(SentenceVectorsError::MalformedLine {
                            line_number,
                            reason,
                        });
                    }
                    MalformedLinePolicy::Skip => {
                        warn!(line_number, %reason, "skipping malformed line");
                        summary.malformed_lines += 1;
                        continue;
                    }
                },
            };

            let output = embed_pair(model, &record, input)?;
            summary.observe_dimension(line_number, &output);
            writer.write_all(output.to_line().as_bytes())?;
            summary.pairs_written += 1;
            debug!(line_number, "pair vectorized");
        }

        writer.flush()?;
        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            pairs = summary.pairs_written,
            skipped = summary.lines_skipped,
            malformed = summary.malformed_lines,
            dimension = ?summary.dimension,
            "vectorization finished"
        );
        Ok(summary)
    }
}

/// Splits a pre-tokenized sentence on single spaces, dropping empty tokens.
pub fn split_tokens(sentence: &str) -> Vec<String> {
    sentence
        .split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn embed_pair<M>(
    model: &M,
    record: &SentencePairRecord,
    input: SentenceInput,
) -> Result<OutputRecord, SentenceVectorsError>
where
    M: EmbeddingModel + ?Sized,
{
    let embeddings = match input {
        SentenceInput::Raw => model.embed_batch(&[record.left.as_str(), record.right.as_str()])?,
        SentenceInput::Tokenized => {
            model.embed_tokens_batch(&[split_tokens(&record.left), split_tokens(&record.right)])?
        }
    };
    let mut embeddings = embeddings.into_iter();
    let (left, right) = match (embeddings.next(), embeddings.next(), embeddings.next()) {
        (Some(left), Some(right), None) => (left, right),
        _ => {
            return Err(SentenceVectorsError::ValueError(
                "model did not return exactly two embeddings for a sentence pair".to_string(),
            ))
        }
    };

    if left.is_empty() || right.is_empty() {
        return Err(SentenceVectorsError::ValueError(
            "model produced an empty embedding".to_string(),
        ));
    }
    Ok(OutputRecord { left, right })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pair_strips_fields() {
        let parsed = SentencePairRecord::parse_line("  The cat sat. \tThe dog ran.\r");
        assert_eq!(
            parsed,
            ParsedLine::Pair(SentencePairRecord {
                left: "The cat sat.".to_string(),
                right: "The dog ran.".to_string(),
            })
        );
    }

    #[test]
    fn parse_skips_empty_and_short_lines() {
        assert_eq!(SentencePairRecord::parse_line(""), ParsedLine::Skipped);
        assert_eq!(SentencePairRecord::parse_line("\r"), ParsedLine::Skipped);
        assert_eq!(SentencePairRecord::parse_line(" \t "), ParsedLine::Skipped);
        assert_eq!(SentencePairRecord::parse_line("sentence\t"), ParsedLine::Skipped);
        assert_eq!(SentencePairRecord::parse_line("sentence\t x "), ParsedLine::Skipped);
        assert!(matches!(
            SentencePairRecord::parse_line("sentence\tok"),
            ParsedLine::Pair(_)
        ));
    }

    #[test]
    fn parse_flags_missing_tab() {
        assert!(matches!(
            SentencePairRecord::parse_line("no separator here"),
            ParsedLine::Malformed(_)
        ));
    }

    #[test]
    fn extra_fields_are_ignored() {
        let parsed = SentencePairRecord::parse_line("a b\tc d\tscore");
        assert_eq!(
            parsed,
            ParsedLine::Pair(SentencePairRecord {
                left: "a b".to_string(),
                right: "c d".to_string(),
            })
        );
    }

    #[test]
    fn embeddings_use_shortest_decimal_text() {
        assert_eq!(format_embedding(&[0.1, -2.5, 3.0]), "0.1,-2.5,3");
        assert_eq!(format_embedding(&[]), "");
        let record = OutputRecord {
            left: vec![0.1, 0.2, 0.3],
            right: vec![0.4, 0.5, 0.6],
        };
        assert_eq!(record.to_line(), "0.1,0.2,0.3\t0.4,0.5,0.6\n");
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Skip".parse(), Ok(MalformedLinePolicy::Skip));
        assert_eq!("FAIL".parse(), Ok(MalformedLinePolicy::Fail));
        assert!("ignore".parse::<MalformedLinePolicy>().is_err());
    }

    #[test]
    fn tokens_split_on_single_spaces() {
        assert_eq!(split_tokens("un ##aff  ##able"), vec!["un", "##aff", "##able"]);
    }
}
