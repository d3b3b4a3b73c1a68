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

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::pipelines::bert_serving::protocol::{EncodeInput, Request, Response, ServerStatus};
use crate::pipelines::vectorization::{Embedding, EmbeddingModel};
use crate::SentenceVectorsError;

/// Port the embedding server listens on when none is given
pub const DEFAULT_PORT: u16 = 5555;

/// Encode requests waiting for the model worker
const JOB_QUEUE_SIZE: usize = 32;

/// # Address of the embedding server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind, loopback by default
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn with_port(port: u16) -> Self {
        ServerConfig {
            port,
            ..Default::default()
        }
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Returns `true` when something accepts connections on `localhost:port`.
pub fn is_port_in_use(port: u16) -> bool {
    TcpStream::connect(("localhost", port)).is_ok()
}

struct Counters {
    port: u16,
    encode_requests: AtomicU64,
    sentences_encoded: AtomicU64,
}

impl Counters {
    fn status(&self) -> ServerStatus {
        ServerStatus {
            port: self.port,
            encode_requests: self.encode_requests.load(Ordering::SeqCst),
            sentences_encoded: self.sentences_encoded.load(Ordering::SeqCst),
        }
    }
}

/// Encode request handed to the model worker, with the channel its result is sent back on
type Job = (
    EncodeInput,
    oneshot::Sender<Result<Vec<Embedding>, SentenceVectorsError>>,
);

/// # Local embedding server
///
/// Serves an `EmbeddingModel` over loopback TCP using the newline-delimited JSON protocol of
/// [`protocol`](super::protocol). Connections are accepted on a tokio runtime owned by the
/// server; the model itself runs on a dedicated worker thread fed through a job queue, so it
/// does not need to be `Sync`.
///
/// The server is a scoped resource: `close` (or dropping the server) signals the accept loop
/// and every open connection, waits for them and joins the model worker, after which the port
/// is free again.
pub struct EmbeddingServer {
    config: ServerConfig,
    counters: Arc<Counters>,
    runtime: Option<Runtime>,
    shutdown: watch::Sender<bool>,
    accept_loop: Option<tokio::task::JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
}

impl EmbeddingServer {
    /// Starts serving `model` on `config.port`.
    ///
    /// Fails with `PortInUse` when the port already accepts connections.
    pub fn start<M>(model: M, config: ServerConfig) -> Result<Self, SentenceVectorsError>
    where
        M: EmbeddingModel + Send + 'static,
    {
        if is_port_in_use(config.port) {
            return Err(SentenceVectorsError::PortInUse(config.port));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name(format!("embedding-server-{}", config.port))
            .enable_io()
            .build()?;
        let listener = runtime
            .block_on(TcpListener::bind(config.address()))
            .map_err(|e| match e.kind() {
                io::ErrorKind::AddrInUse => SentenceVectorsError::PortInUse(config.port),
                _ => SentenceVectorsError::ServerError(format!(
                    "could not bind {}: {e}",
                    config.address()
                )),
            })?;

        let (job_sender, job_receiver) = mpsc::channel(JOB_QUEUE_SIZE);
        let worker = thread::Builder::new()
            .name(format!("embedding-model-{}", config.port))
            .spawn(move || run_model(model, job_receiver))?;

        let counters = Arc::new(Counters {
            port: config.port,
            encode_requests: AtomicU64::new(0),
            sentences_encoded: AtomicU64::new(0),
        });
        let (shutdown, shutdown_receiver) = watch::channel(false);
        let accept_loop = runtime.spawn(serve(
            listener,
            job_sender,
            Arc::clone(&counters),
            shutdown_receiver,
        ));

        info!(address = %config.address(), "embedding server started");
        Ok(EmbeddingServer {
            config,
            counters,
            runtime: Some(runtime),
            shutdown,
            accept_loop: Some(accept_loop),
            worker: Some(worker),
        })
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn status(&self) -> ServerStatus {
        self.counters.status()
    }

    /// Stops the server and returns its final counters.
    pub fn close(mut self) -> Result<ServerStatus, SentenceVectorsError> {
        self.shutdown()?;
        Ok(self.counters.status())
    }

    fn shutdown(&mut self) -> Result<(), SentenceVectorsError> {
        let runtime = match self.runtime.take() {
            Some(runtime) => runtime,
            None => return Ok(()),
        };

        let _ = self.shutdown.send(true);
        let accept_loop = self.accept_loop.take();
        let result = match accept_loop {
            Some(accept_loop) => runtime.block_on(accept_loop).map_err(|e| {
                SentenceVectorsError::ServerError(format!("embedding server task failed: {e}"))
            }),
            None => Ok(()),
        };
        // dropping the runtime closes the listener and the remaining job senders
        drop(runtime);

        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| {
                SentenceVectorsError::ServerError("embedding model worker panicked".to_string())
            })?;
        }
        info!(port = self.config.port, "embedding server stopped");
        result
    }
}

impl Drop for EmbeddingServer {
    fn drop(&mut self) {
        if let Err(error) = self.shutdown() {
            warn!(%error, "embedding server did not shut down cleanly");
        }
    }
}

/// Model worker loop, ends once every job sender is dropped.
fn run_model<M: EmbeddingModel>(model: M, mut jobs: mpsc::Receiver<Job>) {
    while let Some((input, reply)) = jobs.blocking_recv() {
        let result = encode(&model, &input);
        if reply.send(result).is_err() {
            debug!("client went away before its embeddings were ready");
        }
    }
}

async fn serve(
    listener: TcpListener,
    jobs: mpsc::Sender<Job>,
    counters: Arc<Counters>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "client connected");
                    let jobs = jobs.clone();
                    let counters = Arc::clone(&counters);
                    let shutdown = shutdown.clone();
                    connections.spawn(async move {
                        let result = handle_connection(stream, jobs, &counters, shutdown).await;
                        if let Err(error) = result {
                            warn!(%error, "client connection ended with an error");
                        }
                        debug!(%peer, "client disconnected");
                    });
                }
                Err(error) => warn!(%error, "failed to accept a connection"),
            },
        }
    }
    drop(listener);
    while connections.join_next().await.is_some() {}
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    jobs: mpsc::Sender<Job>,
    counters: &Counters,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), SentenceVectorsError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.changed() => break,
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                let served = tokio::select! {
                    _ = shutdown.changed() => None,
                    response = respond(request, &jobs, counters) => Some(response),
                };
                match served {
                    Some(response) => response,
                    None => break,
                }
            }
            Err(error) => Response::Error {
                message: format!("invalid request: {error}"),
            },
        };
        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        writer.write_all(payload.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

async fn respond(request: Request, jobs: &mpsc::Sender<Job>, counters: &Counters) -> Response {
    let texts = match request {
        Request::Status => return Response::Status(counters.status()),
        Request::Encode { texts } => texts,
    };
    let (reply, result) = oneshot::channel();
    if jobs.send((texts, reply)).await.is_err() {
        return Response::Error {
            message: "embedding model worker stopped".to_string(),
        };
    }
    match result.await {
        Ok(Ok(embeddings)) => {
            counters.encode_requests.fetch_add(1, Ordering::SeqCst);
            counters
                .sentences_encoded
                .fetch_add(embeddings.len() as u64, Ordering::SeqCst);
            debug!(sentences = embeddings.len(), "encode request served");
            Response::Embeddings { embeddings }
        }
        Ok(Err(error)) => {
            warn!(%error, "encode request failed");
            Response::Error {
                message: error.to_string(),
            }
        }
        Err(_) => Response::Error {
            message: "embedding model worker stopped".to_string(),
        },
    }
}

fn encode<M: EmbeddingModel>(
    model: &M,
    input: &EncodeInput,
) -> Result<Vec<Embedding>, SentenceVectorsError> {
    match input {
        EncodeInput::Raw(sentences) => {
            let sentences = sentences.iter().map(String::as_str).collect::<Vec<_>>();
            model.embed_batch(&sentences)
        }
        EncodeInput::Tokenized(sentences) => model.embed_tokens_batch(sentences),
    }
}
