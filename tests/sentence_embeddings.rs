mod common;

use std::fs;

use common::{write_tiny_sentence_transformer, HIDDEN_SIZE};
use sentence_vectors::pipelines::sentence_embeddings::{
    ModelSource, SentenceEmbeddingsBuilder, SentenceEmbeddingsModel,
};
use sentence_vectors::pipelines::vectorization::{EmbeddingModel, VectorizationPipeline};
use tch::{nn, Device};

#[test]
fn sbert_local_mean_pooling() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_tiny_sentence_transformer(dir.path(), false)?;

    let model = SentenceEmbeddingsBuilder::local(dir.path())
        .with_device(Device::Cpu)
        .create_model()?;
    assert_eq!(model.get_embedding_dim(), HIDDEN_SIZE);

    let sentences = ["The cat sat on the mat.", "The dog ran."];
    let embeddings = model.encode(&sentences)?;
    assert_eq!(embeddings.len(), 2);
    assert!(embeddings
        .iter()
        .all(|embedding| embedding.len() == HIDDEN_SIZE as usize));

    // padding in a batch does not change the vector of the shorter sentence
    let alone = model.embed("The dog ran.")?;
    for (batched, single) in embeddings[1].iter().zip(alone.iter()) {
        assert!((batched - single).abs() < 1e-4);
    }
    assert!(model.encode::<&str>(&[])?.is_empty());
    Ok(())
}

#[test]
fn sbert_normalized_embeddings_have_unit_norm() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_tiny_sentence_transformer(dir.path(), true)?;

    let model = SentenceEmbeddingsBuilder::local(dir.path())
        .with_device(Device::Cpu)
        .create_model()?;
    for embedding in model.encode(&["the cat sat", "un affable dog"])? {
        let norm = embedding.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
    Ok(())
}

#[test]
fn sbert_dense_layer_sets_the_dimension() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_tiny_sentence_transformer(dir.path(), false)?;

    let modules = serde_json::json!([
        {"idx": 0, "name": "0", "path": "", "type": "sentence_transformers.models.Transformer"},
        {"idx": 1, "name": "1", "path": "1_Pooling", "type": "sentence_transformers.models.Pooling"},
        {"idx": 2, "name": "2", "path": "2_Dense", "type": "sentence_transformers.models.Dense"}
    ]);
    fs::write(dir.path().join("modules.json"), modules.to_string())?;
    let dense_dir = dir.path().join("2_Dense");
    fs::create_dir_all(&dense_dir)?;
    fs::write(
        dense_dir.join("config.json"),
        r#"{"in_features": 8, "out_features": 4, "bias": true,
            "activation_function": "torch.nn.modules.activation.Tanh"}"#,
    )?;
    let var_store = nn::VarStore::new(Device::Cpu);
    let _linear = nn::linear(var_store.root(), 8, 4, Default::default());
    var_store.save(dense_dir.join("rust_model.ot"))?;

    let model = SentenceEmbeddingsBuilder::local(dir.path())
        .with_device(Device::Cpu)
        .create_model()?;
    assert_eq!(model.get_embedding_dim(), 4);
    let embedding = model.embed("the cat sat")?;
    assert_eq!(embedding.len(), 4);
    assert!(embedding.iter().all(|value| value.abs() <= 1.0));
    Ok(())
}

#[test]
fn local_copy_can_be_loaded_again() -> anyhow::Result<()> {
    let source = tempfile::tempdir()?;
    let destination = tempfile::tempdir()?;
    write_tiny_sentence_transformer(source.path(), true)?;

    let config = SentenceEmbeddingsBuilder::local(source.path())
        .with_device(Device::Cpu)
        .config()?;
    let copy = config.save_local_copy(destination.path().join("downl_tiny"))?;
    assert!(copy.join("1_Pooling").join("config.json").is_file());
    assert!(copy.join("2_Normalize").is_dir());

    let original = SentenceEmbeddingsModel::new(config)?;
    let copied = SentenceEmbeddingsBuilder::local(&copy)
        .with_device(Device::Cpu)
        .create_model()?;
    let expected = original.embed("the dog sat on the mat")?;
    for (left, right) in copied.embed("the dog sat on the mat")?.iter().zip(expected.iter()) {
        assert!((left - right).abs() < 1e-6);
    }
    Ok(())
}

#[test]
fn invalid_module_order_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_tiny_sentence_transformer(dir.path(), false)?;
    let modules = serde_json::json!([
        {"idx": 0, "name": "0", "path": "1_Pooling", "type": "sentence_transformers.models.Pooling"},
        {"idx": 1, "name": "1", "path": "", "type": "sentence_transformers.models.Transformer"}
    ]);
    fs::write(dir.path().join("modules.json"), modules.to_string())?;

    assert!(SentenceEmbeddingsBuilder::local(dir.path())
        .with_device(Device::Cpu)
        .create_model()
        .is_err());
    Ok(())
}

#[test]
fn existing_directory_reference_is_local() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_tiny_sentence_transformer(dir.path(), false)?;

    let builder = SentenceEmbeddingsBuilder::from_reference(dir.path().to_str().unwrap());
    assert_eq!(builder.source(), &ModelSource::Local(dir.path().to_path_buf()));

    let input = dir.path().join("input.txt");
    let output = dir.path().join("output.txt");
    fs::write(&input, "the cat sat\tthe dog ran\n")?;
    let model = builder.with_device(Device::Cpu).create_model()?;
    let summary = VectorizationPipeline::default().run(&model, &input, &output)?;
    assert_eq!(summary.dimension, Some(HIDDEN_SIZE as usize));
    Ok(())
}
