//! # Sentence vectorization pipelines
//!
//! [`vectorization`] holds the sentence-pair pipeline and the `EmbeddingModel` trait it is
//! written against. The other modules are the model families implementing that trait:
//!
//! | Module | Model family | Model reference |
//! |---|---|---|
//! | [`sentence_embeddings`] | Sentence-Transformers (BERT) | local directory or hub repository id |
//! | [`bert_serving`] | BERT checkpoint behind a local embedding server | model directory (+ fine-tuned checkpoint) |
//! | [`flair`] | stacked Flair character language models | comma-separated model directories |
//! | [`sent2vec`] | sent2vec | fastText-format `.bin` file |
//! | [`hosted`] | universal sentence encoder | URL or TorchScript file |
//!
//! [`wordpiece`] exposes the WordPiece tokenizer used to pre-tokenize sentences for the BERT
//! serving pipeline.

pub mod bert_serving;
pub mod flair;
pub mod hosted;
pub mod sent2vec;
pub mod sentence_embeddings;
pub mod vectorization;
pub mod wordpiece;
