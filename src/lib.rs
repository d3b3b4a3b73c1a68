//! Sentence-pair vectorization with pretrained sentence embedding models.
//!
//! The crate reads a tab-separated file of sentence pairs, computes one embedding per sentence
//! with a pretrained model and writes the two vectors of each pair to an output file, one line
//! per pair, each vector as comma-joined decimal text and the two vectors separated by a tab.
//!
//! The vectorization pipeline is written once against the
//! [`EmbeddingModel`](pipelines::vectorization::EmbeddingModel) trait. The following model
//! families implement it:
//! - Sentence-Transformers models (BERT encoder, pooling, optional dense and normalization
//!   layers): [`pipelines::sentence_embeddings`]
//! - BERT checkpoints served by a local embedding server and queried through a socket client,
//!   with configurable pooling strategy and layers: [`pipelines::bert_serving`]
//! - Stacks of Flair contextual character language models with document mean pooling:
//!   [`pipelines::flair`]
//! - sent2vec models (fastText binary format): [`pipelines::sent2vec`]
//! - Hosted universal sentence encoders exported as TorchScript modules:
//!   [`pipelines::hosted`]
//!
//! [`pipelines::wordpiece`] pre-tokenizes sentences for the token-list input of the BERT serving
//! pipeline.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use sentence_vectors::pipelines::sentence_embeddings::SentenceEmbeddingsBuilder;
//! use sentence_vectors::pipelines::vectorization::VectorizationPipeline;
//!
//! let model = SentenceEmbeddingsBuilder::local("resources/all-MiniLM-L6-v2")
//!     .with_device(tch::Device::Cpu)
//!     .create_model()?;
//!
//! let summary = VectorizationPipeline::default().run(&model, "sentences.txt", "vectors.txt")?;
//! println!("{} pairs written", summary.pairs_written);
//! # Ok(())
//! # }
//! ```
//!
//! Model weights are read from `.ot` files (see the `convert-tensor` binary), configuration
//! from the JSON files shipped with the models. Remote resources are cached under
//! `SENTENCE_VECTORS_CACHE` when set, or the user cache directory otherwise (default `remote`
//! feature).

pub mod bert;
mod common;
pub mod pipelines;

pub use common::error::SentenceVectorsError;
pub use common::resources;
pub use common::{Activation, Config};
