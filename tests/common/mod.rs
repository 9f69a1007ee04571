//! Shared test utilities and fixtures
//!
//! An in-process Beef language server speaking framed JSON-RPC over
//! `tokio::io::duplex`, plus schema and value fixtures.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use trellis_lsp::codec::{FrameReader, FrameWriter};
use trellis_lsp::{BridgeEvent, LspClient};
use trellis_settings::InboundMessage;
use trellis_types::Schema;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Every method the server saw, with its params, in arrival order.
#[derive(Clone, Default)]
pub struct Received(Arc<Mutex<Vec<(String, Value)>>>);

impl Received {
    fn push(&self, method: &str, params: Value) {
        self.0.lock().unwrap().push((method.to_string(), params));
    }

    /// Methods after the `initialize`/`initialized` handshake.
    pub fn methods(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .filter(|m| m != "initialize" && m != "initialized")
            .collect()
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

/// Start a server answering each request with `handler` (`None` = no
/// reply) and return a client that finished the handshake and saw the
/// workspace come up.
pub async fn start<F>(mut handler: F) -> (LspClient, Received)
where
    F: FnMut(&str, &Value) -> Option<Value> + Send + 'static,
{
    let (client_io, server_io) = tokio::io::duplex(256 * 1024);
    let (client_read, client_write) = tokio::io::split(client_io);
    let received = Received::default();
    let log = received.clone();

    tokio::spawn(async move {
        let (server_read, server_write) = tokio::io::split(server_io);
        let mut frames = FrameReader::new(server_read);
        let mut out = FrameWriter::new(server_write);
        while let Ok(Some(frame)) = frames.read_frame().await {
            let Some(method) = frame["method"].as_str().map(str::to_string) else {
                continue;
            };
            let params = frame.get("params").cloned().unwrap_or(Value::Null);
            log.push(&method, params.clone());

            let result = match method.as_str() {
                "initialize" => Some(json!({ "capabilities": {} })),
                "initialized" => {
                    let ready = json!({
                        "jsonrpc": "2.0",
                        "method": "beef/initialized",
                        "params": { "configuration": "Debug", "configurations": ["Debug", "Release"] }
                    });
                    if out.write_frame(&ready).await.is_err() {
                        break;
                    }
                    None
                }
                "shutdown" => Some(Value::Null),
                "exit" => break,
                _ => handler(&method, &params),
            };
            let (Some(id), Some(result)) = (frame.get("id"), result) else {
                continue;
            };
            let reply = json!({ "jsonrpc": "2.0", "id": id, "result": result });
            if out.write_frame(&reply).await.is_err() {
                break;
            }
        }
    });

    let mut client = LspClient::from_streams(client_read, client_write, TIMEOUT)
        .await
        .unwrap();
    client.wait_until_running(TIMEOUT).await;
    (client, received)
}

pub fn workspace_schema() -> Value {
    json!({
        "id": "workspace",
        "configurations": ["Debug", "Release"],
        "configuration": "Debug",
        "platforms": ["Win64", "Linux64"],
        "platform": "Win64",
        "groups": [
            { "id": 1, "name": "General", "settings": [
                { "type": "string", "name": "startupProject" },
                { "type": "list", "name": "extraPlatforms" }
            ] },
            { "id": 2, "name": "Compiler", "configuration": true, "platform": true, "settings": [
                { "type": "bool", "name": "incremental" },
                { "type": "int", "name": "optLevel", "values": [0, 1, 2, 3] },
                { "type": "object", "name": "defines" }
            ] }
        ]
    })
}

pub fn schema() -> Schema {
    serde_json::from_value(workspace_schema()).unwrap()
}

type GroupTable = BTreeMap<u64, Map<String, Value>>;

/// Settings storage keyed by `configuration|platform`, seeded so each
/// selection has distinguishable values.
#[derive(Clone)]
pub struct SettingsStore(Arc<Mutex<BTreeMap<String, GroupTable>>>);

impl SettingsStore {
    pub fn seeded() -> Self {
        let mut all = BTreeMap::new();
        for configuration in ["Debug", "Release"] {
            for platform in ["Win64", "Linux64"] {
                let opt = if configuration == "Debug" { 0 } else { 3 };
                let mut general = Map::new();
                general.insert("startupProject".into(), json!("Core"));
                general.insert("extraPlatforms".into(), json!(["Wasm"]));
                let mut compiler = Map::new();
                compiler.insert("incremental".into(), json!(configuration == "Debug"));
                compiler.insert("optLevel".into(), json!(opt));
                compiler.insert("defines".into(), json!({ "TARGET": platform }));
                let table = BTreeMap::from([(1, general), (2, compiler)]);
                all.insert(format!("{configuration}|{platform}"), table);
            }
        }
        Self(Arc::new(Mutex::new(all)))
    }

    fn key(params: &Value) -> String {
        format!(
            "{}|{}",
            params["configuration"].as_str().unwrap_or_default(),
            params["platform"].as_str().unwrap_or_default()
        )
    }

    pub fn get(&self, configuration: &str, platform: &str, group: u64, setting: &str) -> Value {
        self.0.lock().unwrap()[&format!("{configuration}|{platform}")][&group][setting].clone()
    }

    fn values(&self, params: &Value) -> Value {
        let all = self.0.lock().unwrap();
        let groups: Vec<Value> = all
            .get(&Self::key(params))
            .map(|table| {
                table
                    .iter()
                    .map(|(id, settings)| json!({ "id": id, "settings": settings }))
                    .collect()
            })
            .unwrap_or_default();
        json!({ "groups": groups })
    }

    fn store(&self, params: &Value) {
        let mut all = self.0.lock().unwrap();
        let table = all.entry(Self::key(params)).or_default();
        for group in params["groups"].as_array().into_iter().flatten() {
            let id = group["id"].as_u64().unwrap_or_default();
            let Some(settings) = group["settings"].as_object() else {
                continue;
            };
            let entry = table.entry(id).or_default();
            for (name, value) in settings {
                entry.insert(name.clone(), value.clone());
            }
        }
    }
}

/// A server backed by `store` that also knows two projects and can build.
pub async fn start_settings_server(store: SettingsStore) -> (LspClient, Received) {
    start(move |method, params| match method {
        "beef/settingsSchema" => Some(workspace_schema()),
        "beef/getSettingsValues" => Some(store.values(params)),
        "beef/setSettingsValues" => {
            store.store(params);
            None
        }
        "beef/projects" => Some(json!([
            { "name": "Core", "directory": "/ws/Core" },
            { "name": "Tests", "directory": "/ws/Tests" }
        ])),
        "beef/fileProject" => {
            let uri = params["textDocument"]["uri"].as_str().unwrap_or_default();
            Some(json!(if uri.ends_with("/Core/BeefProj.toml") { "Core" } else { "" }))
        }
        "beef/changeConfiguration" => Some(params.clone()),
        "beef/build" => Some(json!({
            "exitCode": 0,
            "lines": ["Compile Core", "WARNING: unused variable", "Build succeeded"]
        })),
        _ => None,
    })
    .await
}

/// Next settings message from the bridge; panics on a failure event or
/// when nothing arrives in time.
pub async fn next_settings(events: &mut mpsc::UnboundedReceiver<BridgeEvent>) -> InboundMessage {
    match tokio::time::timeout(TIMEOUT, events.recv()).await {
        Ok(Some(BridgeEvent::Settings(message))) => message,
        Ok(Some(BridgeEvent::Failed { operation, message })) => {
            panic!("{operation} failed: {message}")
        }
        Ok(None) => panic!("bridge stopped"),
        Err(_) => panic!("no settings message within {TIMEOUT:?}"),
    }
}
