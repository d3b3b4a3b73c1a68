//! # Flair contextual string embeddings
//!
//! Sentence vectors from a stack of Flair character language models
//! ([Akbik et al., 2018](https://aclanthology.org/C18-1139/)). Each model reads the sentence
//! character by character (backward models read it reversed); the hidden state next to a word
//! is that word's contextual embedding. The embeddings of all models are concatenated per word
//! and averaged over the words of the sentence.
//!
//! Each model directory holds a `config.json` ([`CharLanguageModelConfig`]) and the weights in
//! `rust_model.ot`, converted from the PyTorch checkpoint.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use sentence_vectors::pipelines::flair::DocumentPoolEmbeddings;
//! use sentence_vectors::pipelines::vectorization::EmbeddingModel;
//!
//! let model = DocumentPoolEmbeddings::from_model_list(
//!     "embeddings/pubmed-forward,embeddings/pubmed-backward",
//!     tch::Device::cuda_if_available(),
//! )?;
//! let embedding = model.embed("The cat sat on the mat.")?;
//! # Ok(())
//! # }
//! ```

mod document_pool;
mod language_model;

pub use document_pool::{DocumentPoolEmbeddings, FlairEmbeddings};
pub use language_model::{CharLanguageModel, CharLanguageModelConfig, UNKNOWN_CHARACTER};
