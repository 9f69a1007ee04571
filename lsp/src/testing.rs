//! In-memory language server for unit tests.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadHalf, WriteHalf};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::codec::{FrameReader, FrameWriter};

pub(crate) enum Reply {
    Result(Value),
    Error(i64, String),
    /// Never answer.
    Silent,
    /// Close the connection.
    Hangup,
}

/// Every method the fake server saw, with its params, in arrival order.
#[derive(Clone, Default)]
pub(crate) struct Received(Arc<Mutex<Vec<(String, Value)>>>);

impl Received {
    fn push(&self, method: &str, params: Value) {
        self.0.lock().unwrap().push((method.to_string(), params));
    }

    pub fn methods(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn params(&self, method: &str) -> Vec<Value> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

pub(crate) struct FakeServer {
    pub reader: ReadHalf<DuplexStream>,
    pub writer: WriteHalf<DuplexStream>,
    pub received: Received,
    pub task: JoinHandle<()>,
}

/// Spawn a server that completes the handshake, announces `Debug` of
/// `[Debug, Release]` as ready, and answers other requests with `handler`.
pub(crate) fn spawn<F>(handler: F) -> FakeServer
where
    F: FnMut(&str, &Value) -> Reply + Send + 'static,
{
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(client_io);
    let received = Received::default();
    let task = tokio::spawn(serve(server_io, received.clone(), handler));

    FakeServer {
        reader,
        writer,
        received,
        task,
    }
}

/// Same server behind a local TCP port; every accepted connection gets its
/// own copy of `handler` and all of them log into one [`Received`].
pub(crate) async fn listen_tcp<F>(handler: F) -> (u16, Received)
where
    F: FnMut(&str, &Value) -> Reply + Clone + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let received = Received::default();
    let log = received.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream, log.clone(), handler.clone()));
        }
    });
    (port, received)
}

async fn serve<S, F>(io: S, log: Received, mut handler: F)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    F: FnMut(&str, &Value) -> Reply,
{
    let (server_read, server_write) = tokio::io::split(io);
    let mut frames = FrameReader::new(server_read);
    let mut out = FrameWriter::new(server_write);
    while let Ok(Some(frame)) = frames.read_frame().await {
        let Some(method) = frame["method"].as_str().map(str::to_string) else {
            continue;
        };
        let params = frame.get("params").cloned().unwrap_or(Value::Null);
        log.push(&method, params.clone());
        let id = frame.get("id").cloned();

        let reply = match method.as_str() {
            "initialize" => Reply::Result(json!({ "capabilities": {} })),
            "initialized" => {
                let ready = json!({
                    "jsonrpc": "2.0",
                    "method": "beef/initialized",
                    "params": { "configuration": "Debug", "configurations": ["Debug", "Release"] }
                });
                if out.write_frame(&ready).await.is_err() {
                    break;
                }
                continue;
            }
            "shutdown" => Reply::Result(Value::Null),
            "exit" => break,
            _ => handler(&method, &params),
        };
        let Some(id) = id else {
            continue;
        };
        let frame = match reply {
            Reply::Result(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Reply::Error(code, message) => {
                json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
            }
            Reply::Silent => continue,
            Reply::Hangup => break,
        };
        if out.write_frame(&frame).await.is_err() {
            break;
        }
    }
}
