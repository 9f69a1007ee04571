//! JSON-RPC envelopes and the `beef/*` method parameters.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trellis_types::{GroupValues, Selection};

pub(crate) const INITIALIZE: &str = "initialize";
pub(crate) const INITIALIZED: &str = "initialized";
pub(crate) const SHUTDOWN: &str = "shutdown";
pub(crate) const EXIT: &str = "exit";

pub(crate) const PROJECTS: &str = "beef/projects";
pub(crate) const SETTINGS_SCHEMA: &str = "beef/settingsSchema";
pub(crate) const GET_SETTINGS_VALUES: &str = "beef/getSettingsValues";
pub(crate) const SET_SETTINGS_VALUES: &str = "beef/setSettingsValues";
pub(crate) const FILE_PROJECT: &str = "beef/fileProject";
pub(crate) const CHANGE_CONFIGURATION: &str = "beef/changeConfiguration";
pub(crate) const BUILD: &str = "beef/build";
pub(crate) const RUN: &str = "beef/run";
/// Server-to-client notification announcing the active configuration.
pub(crate) const SERVER_INITIALIZED: &str = "beef/initialized";

/// JSON-RPC "method not found".
pub(crate) const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a, P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<P>,
}

impl<'a, P> Request<'a, P> {
    pub fn new(id: u64, method: &'a str, params: Option<P>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification<'a, P> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<P>,
}

impl<'a, P> Notification<'a, P> {
    pub fn new(method: &'a str, params: Option<P>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponseError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// A frame received from the server, classified by shape.
#[derive(Debug)]
pub(crate) enum Incoming {
    Response {
        id: u64,
        result: Result<serde_json::Value, ResponseError>,
    },
    ServerRequest {
        id: serde_json::Value,
        method: String,
    },
    Notification {
        method: String,
        params: Option<serde_json::Value>,
    },
}

impl Incoming {
    /// `None` for frames that fit no JSON-RPC shape.
    pub fn classify(mut frame: serde_json::Value) -> Option<Self> {
        let object = frame.as_object_mut()?;
        let method = object
            .get("method")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        match (object.remove("id"), method) {
            (Some(id), Some(method)) => Some(Self::ServerRequest { id, method }),
            (None, Some(method)) => Some(Self::Notification {
                method,
                params: object.remove("params"),
            }),
            (Some(id), None) => {
                let id = id.as_u64()?;
                let result = match object.remove("error") {
                    Some(error) => Err(serde_json::from_value(error).ok()?),
                    None => Ok(object.remove("result")?),
                };
                Some(Self::Response { id, result })
            }
            (None, None) => None,
        }
    }
}

pub(crate) fn method_not_found(id: serde_json::Value, method: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": METHOD_NOT_FOUND,
            "message": format!("Method not found: {method}")
        }
    })
}

pub(crate) fn initialize_params(root_uri: Option<&str>) -> serde_json::Value {
    let folders = root_uri.map(|uri| serde_json::json!([{ "uri": uri, "name": "workspace" }]));
    serde_json::json!({
        "processId": std::process::id(),
        "clientInfo": { "name": "trellis", "version": env!("CARGO_PKG_VERSION") },
        "rootUri": root_uri,
        "capabilities": {},
        "workspaceFolders": folders
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct SettingsSchemaParams<'a> {
    pub id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SettingsValuesParams<'a> {
    pub id: &'a str,
    pub configuration: &'a str,
    pub platform: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<&'a str>,
}

impl<'a> SettingsValuesParams<'a> {
    pub fn new(id: &'a str, selection: &'a Selection, project: Option<&'a str>) -> Self {
        Self {
            id,
            configuration: &selection.configuration,
            platform: &selection.platform,
            project,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SetSettingsValuesParams<'a> {
    #[serde(flatten)]
    pub target: SettingsValuesParams<'a>,
    pub groups: &'a [GroupValues],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileProjectParams {
    pub text_document: TextDocumentIdentifier,
}

#[derive(Debug, Serialize)]
pub(crate) struct TextDocumentIdentifier {
    pub uri: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ConfigurationParams {
    pub configuration: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerInitializedParams {
    pub configuration: String,
    #[serde(default)]
    pub configurations: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BuildParams {
    pub clean: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RunParams<'a> {
    pub project: &'a str,
}

pub(crate) fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}
