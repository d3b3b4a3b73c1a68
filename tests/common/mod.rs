#![allow(dead_code)]

use std::fs;
use std::net::TcpListener;
use std::path::Path;

use sentence_vectors::bert::{BertConfig, BertModel};
use sentence_vectors::pipelines::vectorization::{Embedding, EmbeddingModel};
use sentence_vectors::{Activation, SentenceVectorsError};
use tch::{nn, Device};

pub const VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "the", "cat", "sat", "dog", "ran", "on", "mat",
    ".", "un", "##aff", "##able",
];

pub const HIDDEN_SIZE: i64 = 8;

/// Deterministic model: `[characters, words, first byte / 100]`
pub struct CountingModel;

impl EmbeddingModel for CountingModel {
    fn embed(&self, text: &str) -> Result<Embedding, SentenceVectorsError> {
        Ok(vec![
            text.chars().count() as f32,
            text.split_whitespace().count() as f32,
            text.bytes().next().map_or(0.0, |byte| byte as f32 / 100.0),
        ])
    }
}

pub fn tiny_bert_config() -> BertConfig {
    BertConfig {
        hidden_act: Activation::gelu,
        hidden_size: HIDDEN_SIZE,
        intermediate_size: 16,
        max_position_embeddings: 32,
        num_attention_heads: 2,
        num_hidden_layers: 2,
        type_vocab_size: 2,
        vocab_size: VOCAB.len() as i64,
        layer_norm_eps: Some(1e-12),
    }
}

pub fn write_vocab(dir: &Path) -> anyhow::Result<()> {
    fs::write(dir.join("vocab.txt"), VOCAB.join("\n"))?;
    Ok(())
}

/// Randomly initialized BERT checkpoint: `config.json`, `vocab.txt`, `rust_model.ot`
pub fn write_tiny_bert(dir: &Path) -> anyhow::Result<()> {
    let config = tiny_bert_config();
    fs::write(dir.join("config.json"), serde_json::to_string(&config)?)?;
    write_vocab(dir)?;

    let var_store = nn::VarStore::new(Device::Cpu);
    let _model = BertModel::new(var_store.root(), &config);
    var_store.save(dir.join("rust_model.ot"))?;
    Ok(())
}

/// Sentence-Transformers layout around the tiny BERT, mean pooling, optional normalization
pub fn write_tiny_sentence_transformer(dir: &Path, normalize: bool) -> anyhow::Result<()> {
    write_tiny_bert(dir)?;

    let mut modules = vec![
        serde_json::json!({"idx": 0, "name": "0", "path": "", "type": "sentence_transformers.models.Transformer"}),
        serde_json::json!({"idx": 1, "name": "1", "path": "1_Pooling", "type": "sentence_transformers.models.Pooling"}),
    ];
    if normalize {
        modules.push(serde_json::json!({"idx": 2, "name": "2", "path": "2_Normalize", "type": "sentence_transformers.models.Normalize"}));
    }
    fs::write(dir.join("modules.json"), serde_json::to_string(&modules)?)?;

    fs::create_dir_all(dir.join("1_Pooling"))?;
    fs::write(
        dir.join("1_Pooling").join("config.json"),
        serde_json::json!({
            "word_embedding_dimension": HIDDEN_SIZE,
            "pooling_mode_mean_tokens": true
        })
        .to_string(),
    )?;
    fs::write(
        dir.join("sentence_bert_config.json"),
        r#"{"max_seq_length": 16, "do_lower_case": false}"#,
    )?;
    fs::write(
        dir.join("tokenizer_config.json"),
        r#"{"do_lower_case": true}"#,
    )?;
    Ok(())
}

/// A loopback port nothing listens on
pub fn free_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
