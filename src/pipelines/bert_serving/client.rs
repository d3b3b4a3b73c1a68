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

use std::cell::RefCell;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};

use tracing::debug;

use crate::pipelines::bert_serving::protocol::{EncodeInput, Request, Response, ServerStatus};
use crate::pipelines::bert_serving::ServerConfig;
use crate::pipelines::vectorization::{Embedding, EmbeddingModel};
use crate::SentenceVectorsError;

/// # Socket client of an `EmbeddingServer`
///
/// Requests are sent one at a time and block until the response line is read. Token lists
/// passed through `EmbeddingModel::embed_tokens_batch` are sent in a single tokenized request.
pub struct EmbeddingClient {
    reader: RefCell<BufReader<TcpStream>>,
    writer: TcpStream,
}

impl EmbeddingClient {
    pub fn connect(config: &ServerConfig) -> Result<Self, SentenceVectorsError> {
        let stream = TcpStream::connect(config.address()).map_err(|e| {
            SentenceVectorsError::ServerError(format!(
                "could not connect to the embedding server at {}: {e}",
                config.address()
            ))
        })?;
        let reader = RefCell::new(BufReader::new(stream.try_clone()?));
        debug!(address = %config.address(), "connected to the embedding server");
        Ok(EmbeddingClient {
            reader,
            writer: stream,
        })
    }

    fn round_trip(&self, request: &Request) -> Result<Response, SentenceVectorsError> {
        let mut payload = serde_json::to_string(request)?;
        payload.push('\n');
        let mut writer = &self.writer;
        writer.write_all(payload.as_bytes())?;
        writer.flush()?;

        let mut line = String::new();
        let read = self.reader.borrow_mut().read_line(&mut line)?;
        if read == 0 {
            return Err(SentenceVectorsError::ServerError(
                "connection closed by the embedding server".to_string(),
            ));
        }
        Ok(serde_json::from_str(&line)?)
    }

    /// Encodes the sentences in one round-trip, embeddings in input order.
    pub fn encode(&self, input: EncodeInput) -> Result<Vec<Embedding>, SentenceVectorsError> {
        let expected = input.len();
        match self.round_trip(&Request::Encode { texts: input })? {
            Response::Embeddings { embeddings } if embeddings.len() == expected => Ok(embeddings),
            Response::Embeddings { embeddings } => Err(SentenceVectorsError::ServerError(format!(
                "expected {expected} embeddings, received {}",
                embeddings.len()
            ))),
            Response::Error { message } => Err(SentenceVectorsError::ServerError(message)),
            Response::Status(_) => Err(SentenceVectorsError::ServerError(
                "unexpected status response to an encode request".to_string(),
            )),
        }
    }

    pub fn server_status(&self) -> Result<ServerStatus, SentenceVectorsError> {
        match self.round_trip(&Request::Status)? {
            Response::Status(status) => Ok(status),
            Response::Error { message } => Err(SentenceVectorsError::ServerError(message)),
            Response::Embeddings { .. } => Err(SentenceVectorsError::ServerError(
                "unexpected embeddings response to a status request".to_string(),
            )),
        }
    }

    /// Closes the connection; the server then waits for the next client.
    pub fn close(self) -> Result<(), SentenceVectorsError> {
        match self.writer.shutdown(Shutdown::Both) {
            Err(error) if error.kind() != io::ErrorKind::NotConnected => Err(error.into()),
            _ => Ok(()),
        }
    }

    fn single(embeddings: Vec<Embedding>) -> Result<Embedding, SentenceVectorsError> {
        embeddings.into_iter().next().ok_or_else(|| {
            SentenceVectorsError::ServerError("no embedding returned for the input".to_string())
        })
    }
}

impl EmbeddingModel for EmbeddingClient {
    fn embed(&self, text: &str) -> Result<Embedding, SentenceVectorsError> {
        Self::single(self.embed_batch(&[text])?)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, SentenceVectorsError> {
        self.encode(EncodeInput::Raw(
            texts.iter().map(|text| text.to_string()).collect(),
        ))
    }

    fn embed_tokens(&self, tokens: &[String]) -> Result<Embedding, SentenceVectorsError> {
        Self::single(self.embed_tokens_batch(&[tokens.to_vec()])?)
    }

    fn embed_tokens_batch(
        &self,
        sentences: &[Vec<String>],
    ) -> Result<Vec<Embedding>, SentenceVectorsError> {
        self.encode(EncodeInput::Tokenized(sentences.to_vec()))
    }
}
