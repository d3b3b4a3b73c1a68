//! # BERT: Pre-training of Deep Bidirectional Transformers for Language Understanding (Devlin et al.)
//!
//! Inference-only BERT encoder ([https://arxiv.org/abs/1810.04805](https://arxiv.org/abs/1810.04805)
//! Devlin, Chang, Lee, Toutanova, 2018) shared by the sentence-transformers pipeline and the
//! BERT serving pipeline. The encoder returns the hidden states of every layer so that sentence
//! vectors can be pooled from any layer.
//!
//! All models expect the following resources:
//! - Configuration file expected to have a structure following the [Transformers library](https://github.com/huggingface/transformers)
//! - Model weights following the Transformers parameter names, converted to the `.ot` format
//!   (see the `convert-tensor` binary)
//! - `BertTokenizer` using a `vocab.txt` vocabulary
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use rust_tokenizers::tokenizer::BertTokenizer;
//! use sentence_vectors::bert::{BertConfig, BertModel};
//! use sentence_vectors::Config;
//! use tch::{nn, Device};
//!
//! let device = Device::cuda_if_available();
//! let mut vs = nn::VarStore::new(device);
//! let tokenizer = BertTokenizer::from_file("path/to/vocab.txt", true, true)?;
//! let config = BertConfig::from_file("path/to/config.json")?;
//! let bert_model = BertModel::new(vs.root(), &config);
//! vs.load("path/to/rust_model.ot")?;
//! # Ok(())
//! # }
//! ```

mod attention;
mod bert_model;
mod embeddings;
mod encoder;
mod padding;

pub use bert_model::{BertConfig, BertModel, BertModelOutput};
pub use padding::{pad_with_mask, PaddedBatch};
