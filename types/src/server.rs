//! Resolved language-server connection settings.
//!
//! The raw deserialization struct (defaults, flat `transport` string) stays
//! private. Existence of a [`ServerConfig`] is proof that the selected
//! transport has everything it needs.

use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_SERVER_COMMAND: &str = "BeefLsp";
pub const DEFAULT_TCP_HOST: &str = "127.0.0.1";
pub const DEFAULT_TCP_PORT: u16 = 5556;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerConfigError {
    #[error("server command must not be empty")]
    EmptyCommand,
    #[error("tcp host must not be empty")]
    EmptyHost,
    #[error("tcp port must not be 0")]
    ZeroPort,
    #[error("request timeout must be at least one second")]
    ZeroTimeout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TransportKind {
    #[default]
    Stdio,
    Tcp,
}

fn default_command() -> String {
    DEFAULT_SERVER_COMMAND.to_string()
}

fn default_host() -> String {
    DEFAULT_TCP_HOST.to_string()
}

const fn default_port() -> u16 {
    DEFAULT_TCP_PORT
}

const fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Deserialize)]
struct RawServerConfig {
    #[serde(default = "default_command")]
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    transport: TransportKind,
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_timeout")]
    request_timeout_secs: u64,
}

/// How the client reaches the language server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Spawn `command args...` and speak over its stdin/stdout.
    Stdio { command: String, args: Vec<String> },
    /// Connect to an already running server.
    Tcp { host: String, port: u16 },
}

/// Validated language-server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawServerConfig")]
pub struct ServerConfig {
    transport: Transport,
    request_timeout: Duration,
}

impl TryFrom<RawServerConfig> for ServerConfig {
    type Error = ServerConfigError;

    fn try_from(raw: RawServerConfig) -> Result<Self, Self::Error> {
        if raw.request_timeout_secs == 0 {
            return Err(ServerConfigError::ZeroTimeout);
        }
        let transport = match raw.transport {
            TransportKind::Stdio => {
                if raw.command.trim().is_empty() {
                    return Err(ServerConfigError::EmptyCommand);
                }
                Transport::Stdio {
                    command: raw.command,
                    args: raw.args,
                }
            }
            TransportKind::Tcp => {
                if raw.host.trim().is_empty() {
                    return Err(ServerConfigError::EmptyHost);
                }
                if raw.port == 0 {
                    return Err(ServerConfigError::ZeroPort);
                }
                Transport::Tcp {
                    host: raw.host,
                    port: raw.port,
                }
            }
        };
        Ok(Self {
            transport,
            request_timeout: Duration::from_secs(raw.request_timeout_secs),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Stdio {
                command: default_command(),
                args: Vec::new(),
            },
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn new(transport: Transport, request_timeout: Duration) -> Self {
        Self {
            transport,
            request_timeout,
        }
    }

    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Short human description, e.g. `BeefLsp` or `tcp://127.0.0.1:5556`.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.transport {
            Transport::Stdio { command, .. } => command.clone(),
            Transport::Tcp { host, port } => format!("tcp://{host}:{port}"),
        }
    }
}
