//! Server handle: owns the transport and the JSON-RPC request lifecycle.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use trellis_types::{ServerConfig, Transport};

use crate::codec::{FrameReader, FrameWriter};
use crate::protocol::{self, Incoming, Notification, Request, ResponseError, ServerInitializedParams};
use crate::types::{LspEvent, RequestError, ServerStopReason};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

const WRITER_CHANNEL_CAPACITY: usize = 64;

type Reply = Result<serde_json::Value, ResponseError>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

enum WriterCommand {
    Send(serde_json::Value),
    Shutdown,
}

pub(crate) struct RunningServer {
    label: String,
    /// Present only for the stdio transport.
    child: Option<Child>,
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: AtomicU64,
    pending: PendingMap,
    /// Set by the reader task once the stream is gone.
    closed: Arc<AtomicBool>,
    request_timeout: Duration,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl RunningServer {
    /// Open the configured transport and complete the `initialize` handshake.
    pub async fn connect(
        config: &ServerConfig,
        workspace_root: Option<&Path>,
        event_tx: mpsc::Sender<LspEvent>,
    ) -> Result<Self> {
        let label = config.describe();
        match config.transport() {
            Transport::Stdio { command, args } => {
                let resolved = which::which(command)
                    .with_context(|| format!("{command} not found in PATH"))?;
                let mut cmd = Command::new(&resolved);
                cmd.args(args)
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::null())
                    .kill_on_drop(true);
                if let Some(root) = workspace_root {
                    cmd.current_dir(root);
                }
                let mut child = cmd
                    .spawn()
                    .with_context(|| format!("spawning {command}"))?;
                let stdout = child.stdout.take().context("no stdout from child")?;
                let stdin = child.stdin.take().context("no stdin from child")?;
                Self::start(
                    label,
                    stdout,
                    stdin,
                    Some(child),
                    config.request_timeout(),
                    workspace_root,
                    event_tx,
                )
                .await
            }
            Transport::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))
                    .await
                    .with_context(|| format!("connecting to {label}"))?;
                let (reader, writer) = stream.into_split();
                Self::start(
                    label,
                    reader,
                    writer,
                    None,
                    config.request_timeout(),
                    workspace_root,
                    event_tx,
                )
                .await
            }
        }
    }

    /// Run the client over an already open byte stream.
    pub async fn start<R, W>(
        label: String,
        reader: R,
        writer: W,
        child: Option<Child>,
        request_timeout: Duration,
        workspace_root: Option<&Path>,
        event_tx: mpsc::Sender<LspEvent>,
    ) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: PendingMap = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));

        let (writer_tx, mut writer_rx) = mpsc::channel(WRITER_CHANNEL_CAPACITY);
        let writer_label = label.clone();
        let writer_handle = tokio::spawn(async move {
            let mut writer = FrameWriter::new(writer);
            while let Some(WriterCommand::Send(frame)) = writer_rx.recv().await {
                if let Err(e) = writer.write_frame(&frame).await {
                    tracing::warn!(server = %writer_label, error = %e, "LSP write failed");
                    break;
                }
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader_closed = Arc::clone(&closed);
        let reader_writer_tx = writer_tx.clone();
        let reader_label = label.clone();
        let reader_handle = tokio::spawn(async move {
            let mut reader = FrameReader::new(reader);
            let reason = loop {
                match reader.read_frame().await {
                    Ok(Some(frame)) => {
                        Self::dispatch_frame(frame, &reader_pending, &event_tx, &reader_writer_tx)
                            .await;
                    }
                    Ok(None) => break ServerStopReason::Exited,
                    Err(e) => break ServerStopReason::Failed(e.to_string()),
                }
            };
            match &reason {
                ServerStopReason::Exited => {
                    tracing::info!(server = %reader_label, "Language server closed the connection");
                }
                ServerStopReason::Failed(error) => {
                    tracing::warn!(server = %reader_label, %error, "Language server connection failed");
                }
            }
            reader_closed.store(true, Ordering::SeqCst);
            // Dropping the senders fails every in-flight request.
            reader_pending.lock().await.clear();
            let _ = event_tx.send(LspEvent::ServerStopped { reason }).await;
        });

        let server = Self {
            label,
            child,
            writer_tx,
            next_id: AtomicU64::new(1),
            pending,
            closed,
            request_timeout,
            reader_handle,
            writer_handle,
        };
        server.initialize(workspace_root).await?;
        Ok(server)
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    async fn dispatch_frame(
        frame: serde_json::Value,
        pending: &Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
        event_tx: &mpsc::Sender<LspEvent>,
        writer_tx: &mpsc::Sender<WriterCommand>,
    ) {
        let Some(incoming) = Incoming::classify(frame) else {
            tracing::trace!("Ignoring malformed JSON-RPC frame");
            return;
        };

        match incoming {
            Incoming::Response { id, result } => {
                let sender = pending.lock().await.remove(&id);
                match sender {
                    Some(tx) => {
                        let _ = tx.send(result);
                    }
                    None => tracing::debug!(id, "Response for unknown or abandoned request"),
                }
            }
            Incoming::ServerRequest { id, method } => {
                tracing::debug!(%method, "Server request not supported; replying method not found");
                let reply = protocol::method_not_found(id, &method);
                let _ = writer_tx.send(WriterCommand::Send(reply)).await;
            }
            Incoming::Notification { method, params } => {
                Self::handle_notification(&method, params, event_tx).await;
            }
        }
    }

    async fn handle_notification(
        method: &str,
        params: Option<serde_json::Value>,
        event_tx: &mpsc::Sender<LspEvent>,
    ) {
        match method {
            protocol::SERVER_INITIALIZED => {
                let parsed = params.map(serde_json::from_value::<ServerInitializedParams>);
                match parsed {
                    Some(Ok(params)) => {
                        tracing::info!(configuration = %params.configuration, "Language server ready");
                        let _ = event_tx
                            .send(LspEvent::Initialized {
                                configuration: params.configuration,
                                configurations: params.configurations,
                            })
                            .await;
                    }
                    Some(Err(e)) => tracing::debug!(error = %e, "Malformed {method} notification"),
                    None => tracing::debug!("{method} notification without params"),
                }
            }
            _ => tracing::trace!(%method, "Ignoring notification"),
        }
    }

    async fn initialize(&self, workspace_root: Option<&Path>) -> Result<()> {
        let root_uri = workspace_root
            .map(protocol::path_to_file_uri)
            .transpose()
            .context("converting workspace root to URI")?;
        let params = protocol::initialize_params(root_uri.as_ref().map(url::Url::as_str));
        let _capabilities: serde_json::Value = self
            .request(protocol::INITIALIZE, Some(params))
            .await
            .context("LSP initialize failed")?;
        self.notify(protocol::INITIALIZED, Some(serde_json::json!({})))
            .await
            .context("sending initialized")?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), RequestError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(RequestError::Disconnected)
        } else {
            Ok(())
        }
    }

    /// Send a request and decode its result.
    pub async fn request<P, T>(&self, method: &str, params: Option<P>) -> Result<T, RequestError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = serde_json::to_value(Request::new(id, method, params)).map_err(|source| {
            RequestError::Encode {
                method: method.to_string(),
                source,
            }
        })?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);
        if self.ensure_open().is_err()
            || self
                .writer_tx
                .send(WriterCommand::Send(frame))
                .await
                .is_err()
        {
            self.pending.lock().await.remove(&id);
            return Err(RequestError::Disconnected);
        }
        tracing::trace!(id, %method, "Request sent");

        let reply = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(RequestError::Disconnected),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(RequestError::Timeout {
                    method: method.to_string(),
                    timeout: self.request_timeout,
                });
            }
        };

        let result = reply.map_err(|error| RequestError::Server {
            code: error.code,
            message: error.message,
        })?;
        serde_json::from_value(result).map_err(|source| RequestError::InvalidResponse {
            method: method.to_string(),
            source,
        })
    }

    pub async fn notify<P: Serialize>(
        &self,
        method: &str,
        params: Option<P>,
    ) -> Result<(), RequestError> {
        self.ensure_open()?;
        let frame = serde_json::to_value(Notification::new(method, params)).map_err(|source| {
            RequestError::Encode {
                method: method.to_string(),
                source,
            }
        })?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| RequestError::Disconnected)
    }

    /// `shutdown` then `exit`, then wait briefly for the child before killing it.
    pub async fn shutdown(mut self) {
        let acknowledged = tokio::time::timeout(
            SHUTDOWN_TIMEOUT,
            self.request::<(), serde_json::Value>(protocol::SHUTDOWN, None),
        )
        .await;
        match acknowledged {
            Ok(Ok(_)) => {
                let _ = self.notify(protocol::EXIT, None::<()>).await;
            }
            Ok(Err(e)) => tracing::debug!(server = %self.label, error = %e, "Shutdown request failed"),
            Err(_) => tracing::debug!(server = %self.label, "Shutdown request timed out"),
        }

        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;
        let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut self.writer_handle).await;

        if let Some(child) = self.child.as_mut()
            && tokio::time::timeout(SHUTDOWN_TIMEOUT, child.wait())
                .await
                .is_err()
        {
            tracing::debug!(server = %self.label, "Language server didn't exit in time, killing");
            let _ = child.kill().await;
        }
        self.reader_handle.abort();
    }
}
