mod common;

use std::cell::Cell;
use std::fs;
use std::net::TcpListener;

use common::{free_port, write_tiny_bert, CountingModel, HIDDEN_SIZE};
use sentence_vectors::pipelines::bert_serving::{
    is_port_in_use, BertServingConfig, BertServingEncoder, EmbeddingClient, EmbeddingServer,
    EncodeInput, PoolingStrategy, ServerConfig, ServerSession, SessionState,
};
use sentence_vectors::pipelines::vectorization::{
    format_embedding, split_tokens, EmbeddingModel, VectorizationPipeline,
};
use sentence_vectors::SentenceVectorsError;
use tch::Device;

#[test]
fn server_round_trip() -> anyhow::Result<()> {
    let config = ServerConfig::with_port(free_port()?);
    let server = EmbeddingServer::start(CountingModel, config.clone())?;
    let client = EmbeddingClient::connect(&config)?;

    let embeddings = client.encode(EncodeInput::Raw(vec![
        "The cat sat.".to_string(),
        "The dog ran.".to_string(),
    ]))?;
    assert_eq!(embeddings.len(), 2);
    assert_eq!(embeddings[0], CountingModel.embed("The cat sat.")?);

    let embedding = client.embed_tokens(&["the".to_string(), "cat".to_string()])?;
    assert_eq!(embedding, CountingModel.embed("the cat")?);

    let status = client.server_status()?;
    assert_eq!(status.port, config.port);
    assert_eq!(status.encode_requests, 2);
    assert_eq!(status.sentences_encoded, 3);

    client.close()?;
    let status = server.close()?;
    assert_eq!(status.encode_requests, 2);
    assert!(!is_port_in_use(config.port));
    Ok(())
}

#[test]
fn token_lists_are_sent_in_one_request() -> anyhow::Result<()> {
    let config = ServerConfig::with_port(free_port()?);
    let _server = EmbeddingServer::start(CountingModel, config.clone())?;
    let client = EmbeddingClient::connect(&config)?;

    let embeddings = client.embed_tokens_batch(&[
        split_tokens("un ##aff ##able"),
        split_tokens("the  cat"),
    ])?;
    assert_eq!(embeddings[0], CountingModel.embed("un ##aff ##able")?);
    assert_eq!(embeddings[1], CountingModel.embed("the cat")?);

    let status = client.server_status()?;
    assert_eq!(status.encode_requests, 1);
    assert_eq!(status.sentences_encoded, 2);
    Ok(())
}

#[test]
fn closing_the_server_disconnects_its_clients() -> anyhow::Result<()> {
    let config = ServerConfig::with_port(free_port()?);
    let server = EmbeddingServer::start(CountingModel, config.clone())?;
    let client = EmbeddingClient::connect(&config)?;
    assert_eq!(client.server_status()?.encode_requests, 0);

    server.close()?;
    assert!(!is_port_in_use(config.port));
    assert!(client.server_status().is_err());
    Ok(())
}

#[test]
fn occupied_port_fails_before_starting() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    assert!(is_port_in_use(port));

    match ServerSession::open(CountingModel, ServerConfig::with_port(port)) {
        Err(SentenceVectorsError::PortInUse(reported)) => assert_eq!(reported, port),
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("session opened on an occupied port"),
    }
    Ok(())
}

#[test]
fn occupied_port_is_reported_before_the_model_loads() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    let dir = tempfile::tempdir()?;

    let loaded = Cell::new(false);
    let result = ServerSession::open_with(ServerConfig::with_port(port), || {
        loaded.set(true);
        BertServingEncoder::new(BertServingConfig::new(dir.path().join("missing")))
    });
    assert!(matches!(result, Err(SentenceVectorsError::PortInUse(reported)) if reported == port));
    assert!(!loaded.get());
    Ok(())
}

#[test]
fn tokenized_session_encodes_each_pair_in_one_request() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("input.txt");
    let output = dir.path().join("output.txt");
    fs::write(&input, "un ##aff ##able\tthe cat\nthe  dog\ta mat\n")?;

    let port = free_port()?;
    let mut session = ServerSession::open_with(ServerConfig::with_port(port), || Ok(CountingModel))?;
    let pipeline = VectorizationPipeline::default();
    let summary = session.process(|client| pipeline.run_tokenized(client, &input, &output))?;
    assert_eq!(summary.pairs_written, 2);

    let status = session.close()?;
    assert_eq!(status.encode_requests, 2);
    assert_eq!(status.sentences_encoded, 4);

    let first_line = fs::read_to_string(&output)?
        .lines()
        .next()
        .map(str::to_string)
        .unwrap_or_default();
    assert_eq!(
        first_line,
        format!(
            "{}\t{}",
            format_embedding(&CountingModel.embed("un ##aff ##able")?),
            format_embedding(&CountingModel.embed("the cat")?)
        )
    );
    Ok(())
}

#[test]
fn session_runs_the_pipeline_and_releases_the_port() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("input.txt");
    let output = dir.path().join("output.txt");
    fs::write(&input, "The cat sat.\tThe dog ran.\nA mat.\tOn the mat.\n")?;

    let port = free_port()?;
    let mut session = ServerSession::open(CountingModel, ServerConfig::with_port(port))?;
    assert_eq!(session.state(), SessionState::ClientConnected);

    let pipeline = VectorizationPipeline::default();
    let summary = session.process(|client| pipeline.run(client, &input, &output))?;
    assert_eq!(session.state(), SessionState::Processing);
    assert_eq!(summary.pairs_written, 2);

    let status = session.close()?;
    assert_eq!(status.encode_requests, 2);
    assert_eq!(status.sentences_encoded, 4);
    assert!(!is_port_in_use(port));

    let mut expected = String::new();
    for (left, right) in [("The cat sat.", "The dog ran."), ("A mat.", "On the mat.")] {
        expected.push_str(&format!(
            "{}\t{}\n",
            format_embedding(&CountingModel.embed(left)?),
            format_embedding(&CountingModel.embed(right)?),
        ));
    }
    assert_eq!(fs::read_to_string(&output)?, expected);
    Ok(())
}

#[test]
fn dropped_session_shuts_the_server_down() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("input.txt");
    fs::write(&input, "a line without separator\n")?;

    let port = free_port()?;
    {
        let mut session =
            ServerSession::open(CountingModel, ServerConfig::with_port(port))?;
        assert!(is_port_in_use(port));
        let pipeline = VectorizationPipeline::default();
        let result =
            session.process(|client| pipeline.run(client, &input, dir.path().join("out.txt")));
        assert!(matches!(
            result,
            Err(SentenceVectorsError::MalformedLine { line_number: 1, .. })
        ));
    }
    assert!(!is_port_in_use(port));
    Ok(())
}

#[test]
fn bert_encoder_pools_selected_layers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_tiny_bert(dir.path())?;

    let mut config = BertServingConfig::new(dir.path());
    config.device = Device::Cpu;
    let encoder = BertServingEncoder::new(config.clone())?;
    let embeddings = encoder.embed_batch(&["the cat sat on the mat .", "the dog ran ."])?;
    assert_eq!(embeddings.len(), 2);
    assert!(embeddings
        .iter()
        .all(|embedding| embedding.len() == HIDDEN_SIZE as usize));
    assert!(embeddings[0].iter().all(|value| value.is_finite()));

    // a sentence encoded alone or in a padded batch gets the same vector
    let alone = encoder.embed("the dog ran .")?;
    for (batched, single) in embeddings[1].iter().zip(alone.iter()) {
        assert!((batched - single).abs() < 1e-4);
    }

    // tokens map straight to vocabulary ids
    let tokenized = encoder.embed_tokens(&[
        "the".to_string(),
        "dog".to_string(),
        "ran".to_string(),
        ".".to_string(),
    ])?;
    for (from_tokens, from_text) in tokenized.iter().zip(alone.iter()) {
        assert!((from_tokens - from_text).abs() < 1e-4);
    }

    config.pooling_strategy = PoolingStrategy::ReduceMeanMax;
    config.pooling_layers = "-2,-1".parse()?;
    let encoder = BertServingEncoder::new(config)?;
    assert_eq!(encoder.embed("the cat")?.len(), 4 * HIDDEN_SIZE as usize);
    Ok(())
}

#[test]
fn bert_encoder_rejects_invalid_settings() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_tiny_bert(dir.path())?;

    let mut config = BertServingConfig::new(dir.path());
    config.device = Device::Cpu;
    config.max_seq_len = 64;
    assert!(BertServingEncoder::new(config.clone()).is_err());

    config.max_seq_len = 16;
    config.pooling_layers = "-3".parse()?;
    assert!(BertServingEncoder::new(config.clone()).is_err());

    config.pooling_layers = "-1".parse()?;
    config.checkpoint_name = Some("missing.ot".to_string());
    assert!(BertServingEncoder::new(config).is_err());
    Ok(())
}

#[test]
fn bert_encoder_behind_the_server() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    write_tiny_bert(dir.path())?;
    let mut config = BertServingConfig::new(dir.path());
    config.device = Device::Cpu;
    let local = BertServingEncoder::new(config.clone())?;
    let expected = local.embed("the cat sat .")?;

    let port = free_port()?;
    let mut session =
        ServerSession::open_with(ServerConfig::with_port(port), || BertServingEncoder::new(config))?;
    let served = session.process(|client| client.embed("the cat sat ."))?;
    session.close()?;

    assert_eq!(served.len(), expected.len());
    for (served, expected) in served.iter().zip(expected.iter()) {
        assert!((served - expected).abs() < 1e-5);
    }
    Ok(())
}
