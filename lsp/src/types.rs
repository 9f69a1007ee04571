//! Public types of the language-server client.

use std::time::Duration;

/// Something that happened on the server connection outside a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LspEvent {
    /// The server finished loading the workspace.
    Initialized {
        configuration: String,
        configurations: Vec<String>,
    },
    ServerStopped { reason: ServerStopReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStopReason {
    /// The stream closed cleanly.
    Exited,
    /// The stream broke.
    Failed(String),
}

/// Connection status as last reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientStatus {
    /// Handshake done, waiting for the server to load the workspace.
    Starting,
    Running {
        configuration: String,
        configurations: Vec<String>,
    },
    Stopped(ServerStopReason),
}

impl ClientStatus {
    /// Active build configuration, once known.
    #[must_use]
    pub fn configuration(&self) -> Option<&str> {
        match self {
            Self::Running { configuration, .. } => Some(configuration),
            _ => None,
        }
    }

    #[must_use]
    pub fn configurations(&self) -> &[String] {
        match self {
            Self::Running { configurations, .. } => configurations,
            _ => &[],
        }
    }

    /// Status line text, e.g. `Beef Lsp: Debug`.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Starting => "Beef Lsp: starting".to_string(),
            Self::Running { configuration, .. } => format!("Beef Lsp: {configuration}"),
            Self::Stopped(ServerStopReason::Exited) => "Beef Lsp: stopped".to_string(),
            Self::Stopped(ServerStopReason::Failed(reason)) => format!("Beef Lsp: failed ({reason})"),
        }
    }
}

/// Failure of a single request or notification.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("server error {code}: {message}")]
    Server { code: i64, message: String },
    #[error("'{method}' timed out after {}s", timeout.as_secs())]
    Timeout { method: String, timeout: Duration },
    #[error("language server connection closed")]
    Disconnected,
    #[error("unexpected reply to '{method}': {source}")]
    InvalidResponse {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot encode '{method}': {source}")]
    Encode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Uri(#[from] crate::protocol::PathToUriError),
}
