//! # Sentence Embeddings pipeline
//!
//! Compute sentence/text embeddings that can be compared (e.g. with
//! cosine-similarity) to find sentences with a similar meaning.
//!
//! The implementation is based on [Sentence-Transformers][sbert]. Models using a BERT encoder
//! can be loaded from a local directory or from the [Hugging Face Hub][sbert-hub]; the
//! transformer and dense weights must be available in the `.ot` format (see the
//! `convert-tensor` binary).
//!
//! [sbert]: https://sbert.net/
//! [sbert-hub]: https://huggingface.co/sentence-transformers/
//!
//! Basic usage is as follows:
//!
//! ```no_run
//! use sentence_vectors::pipelines::sentence_embeddings::SentenceEmbeddingsBuilder;
//!
//! # fn main() -> anyhow::Result<()> {
//! let model = SentenceEmbeddingsBuilder::local("local/path/to/all-MiniLM-L6-v2")
//!     .with_device(tch::Device::cuda_if_available())
//!     .create_model()?;
//!
//! let sentences = ["This is an example sentence", "Each sentence is converted"];
//! let embeddings = model.encode(&sentences)?;
//! # Ok(())
//! # }
//! ```
//!
//! A model fetched from the hub can be persisted with the same layout, to be loaded offline
//! later:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use sentence_vectors::pipelines::sentence_embeddings::SentenceEmbeddingsBuilder;
//!
//! let builder = SentenceEmbeddingsBuilder::from_reference("sentence-transformers/all-MiniLM-L6-v2");
//! builder.config()?.save_local_copy("downl_sentence-transformers_all-MiniLM-L6-v2")?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
mod config;
pub mod layers;
mod pipeline;

pub use builder::{ModelSource, SentenceEmbeddingsBuilder};
pub use config::{
    SentenceEmbeddingsConfig, SentenceEmbeddingsModuleConfig, SentenceEmbeddingsModuleType,
    SentenceEmbeddingsModulesConfig, SentenceEmbeddingsSentenceBertConfig,
    SentenceEmbeddingsTokenizerConfig,
};
pub use pipeline::{SentenceEmbeddingsModel, SentenceEmbeddingsTokenizerOutput};
