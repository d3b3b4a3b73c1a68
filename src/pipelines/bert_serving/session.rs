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

use tracing::{info, warn};

use crate::pipelines::bert_serving::protocol::ServerStatus;
use crate::pipelines::bert_serving::{
    is_port_in_use, EmbeddingClient, EmbeddingServer, ServerConfig,
};
use crate::pipelines::vectorization::EmbeddingModel;
use crate::SentenceVectorsError;

/// Lifecycle of a server-backed vectorization run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    PortChecked,
    ServerStarted,
    ClientConnected,
    Processing,
    ClientClosed,
    ServerClosed,
}

/// # Embedding server and its client, owned together
///
/// `open_with` checks the port, loads the model, starts the server and connects the client;
/// `process` hands the client to the caller (typically a `VectorizationPipeline` run); `close`
/// logs the server status then closes the client and the server. A session dropped without
/// `close`, e.g. on an error path, closes the client and the server as well.
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// use sentence_vectors::pipelines::bert_serving::{
///     BertServingConfig, BertServingEncoder, ServerConfig, ServerSession,
/// };
/// use sentence_vectors::pipelines::vectorization::VectorizationPipeline;
///
/// let mut session = ServerSession::open_with(ServerConfig::with_port(5555), || {
///     BertServingEncoder::new(BertServingConfig::new("uncased_L-12_H-768_A-12"))
/// })?;
/// let pipeline = VectorizationPipeline::default();
/// session.process(|client| pipeline.run_tokenized(client, "sentences.txt", "vectors.txt"))?;
/// session.close()?;
/// # Ok(())
/// # }
/// ```
pub struct ServerSession {
    state: SessionState,
    server: Option<EmbeddingServer>,
    client: Option<EmbeddingClient>,
}

impl ServerSession {
    /// Serves an already loaded `model`. Fails with `PortInUse`, without starting anything,
    /// when the port is already taken.
    pub fn open<M>(model: M, config: ServerConfig) -> Result<Self, SentenceVectorsError>
    where
        M: EmbeddingModel + Send + 'static,
    {
        Self::open_with(config, || Ok(model))
    }

    /// Checks the port, then calls `load` and serves the model it returns. An occupied port
    /// fails with `PortInUse` before `load` runs.
    pub fn open_with<M, F>(config: ServerConfig, load: F) -> Result<Self, SentenceVectorsError>
    where
        M: EmbeddingModel + Send + 'static,
        F: FnOnce() -> Result<M, SentenceVectorsError>,
    {
        let mut session = ServerSession {
            state: SessionState::NotStarted,
            server: None,
            client: None,
        };

        if is_port_in_use(config.port) {
            return Err(SentenceVectorsError::PortInUse(config.port));
        }
        session.state = SessionState::PortChecked;

        let model = load()?;
        session.server = Some(EmbeddingServer::start(model, config.clone())?);
        session.state = SessionState::ServerStarted;

        session.client = Some(EmbeddingClient::connect(&config)?);
        session.state = SessionState::ClientConnected;

        info!(port = config.port, "embedding session opened");
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs `f` with the connected client.
    pub fn process<T, F>(&mut self, f: F) -> Result<T, SentenceVectorsError>
    where
        F: FnOnce(&EmbeddingClient) -> Result<T, SentenceVectorsError>,
    {
        let client = self.client.as_ref().ok_or_else(|| {
            SentenceVectorsError::ServerError(format!(
                "no connected client in session state {:?}",
                self.state
            ))
        })?;
        self.state = SessionState::Processing;
        f(client)
    }

    /// Logs the server status, closes the client then the server.
    pub fn close(mut self) -> Result<ServerStatus, SentenceVectorsError> {
        let client = self.client.take().ok_or_else(|| {
            SentenceVectorsError::ServerError("session has no connected client".to_string())
        })?;
        let status = client.server_status()?;
        info!(
            port = status.port,
            encode_requests = status.encode_requests,
            sentences_encoded = status.sentences_encoded,
            "embedding server status"
        );
        client.close()?;
        self.state = SessionState::ClientClosed;

        if let Some(server) = self.server.take() {
            server.close()?;
        }
        self.state = SessionState::ServerClosed;
        Ok(status)
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        if self.state == SessionState::ServerClosed {
            return;
        }
        if let Some(client) = self.client.take() {
            let _ = client.close();
        }
        if let Some(server) = self.server.take() {
            warn!(
                port = server.port(),
                state = ?self.state,
                "embedding session dropped before close, shutting down the server"
            );
            drop(server);
        }
    }
}
