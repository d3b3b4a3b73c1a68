//! # BERT serving pipeline
//!
//! Sentence vectors from a BERT checkpoint served by a local embedding server. The encoder takes
//! the token vectors of one or more encoder layers (`PoolingLayers`, negative indices counting
//! from the last layer) and reduces them with a `PoolingStrategy`:
//!
//! | Strategy | Sentence vector |
//! |---|---|
//! | `REDUCE_MEAN` | masked average of the token vectors |
//! | `REDUCE_MAX` | masked maximum of the token vectors |
//! | `REDUCE_MEAN_MAX` | both, concatenated |
//! | `FIRST_TOKEN` / `CLS_TOKEN` | vector of `[CLS]` |
//! | `LAST_TOKEN` / `SEP_TOKEN` | vector of the last real token, `[SEP]` |
//!
//! The encoder runs inside an [`EmbeddingServer`] listening on loopback TCP (port 5555 by
//! default); the vectorization pipeline talks to it through an [`EmbeddingClient`], which
//! implements `EmbeddingModel`. A [`ServerSession`] owns both and shuts them down when closed
//! or dropped.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use sentence_vectors::pipelines::bert_serving::{
//!     BertServingConfig, BertServingEncoder, PoolingStrategy,
//! };
//! use sentence_vectors::pipelines::vectorization::EmbeddingModel;
//!
//! let mut config = BertServingConfig::new("path/to/uncased_L-12_H-768_A-12");
//! config.pooling_strategy = PoolingStrategy::ReduceMeanMax;
//! config.pooling_layers = "-2,-1".parse()?;
//! let encoder = BertServingEncoder::new(config)?;
//! let embedding = encoder.embed("The cat sat on the mat.")?;
//! # Ok(())
//! # }
//! ```

mod client;
mod encoder;
mod pooling;
pub mod protocol;
mod server;
mod session;

pub use client::EmbeddingClient;
pub use encoder::{BertServingConfig, BertServingEncoder, DEFAULT_MAX_SEQ_LEN};
pub use pooling::{PoolingLayers, PoolingStrategy};
pub use protocol::{EncodeInput, ServerStatus};
pub use server::{is_port_in_use, EmbeddingServer, ServerConfig, DEFAULT_PORT};
pub use session::{ServerSession, SessionState};
