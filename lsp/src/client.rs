//! `LspClient` facade: typed `beef/*` calls over one server connection.
//!
//! Construction is the handshake. Requests take `&self`, so a settings bridge
//! and a command can share one client; only status bookkeeping needs `&mut`.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use trellis_types::{
    BuildResult, GroupValues, Project, RunResult, Schema, Selection, ServerConfig, SettingsValues,
};

use crate::protocol::{
    self, BuildParams, ConfigurationParams, FileProjectParams, RunParams, SetSettingsValuesParams,
    SettingsSchemaParams, SettingsValuesParams, TextDocumentIdentifier,
};
use crate::server::RunningServer;
use crate::types::{ClientStatus, LspEvent, RequestError};

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct LspClient {
    server: RunningServer,
    event_rx: mpsc::Receiver<LspEvent>,
    status: ClientStatus,
}

impl LspClient {
    /// Connect using the configured transport.
    pub async fn connect(config: &ServerConfig, workspace_root: Option<&Path>) -> Result<Self> {
        tracing::info!(server = %config.describe(), "Starting language server");
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let server = RunningServer::connect(config, workspace_root, event_tx).await?;
        Ok(Self::with_server(server, event_rx))
    }

    /// Connect over an already open stream pair, e.g. an in-process server.
    pub async fn from_streams<R, W>(reader: R, writer: W, request_timeout: Duration) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let server = RunningServer::start(
            "stream".to_string(),
            reader,
            writer,
            None,
            request_timeout,
            None,
            event_tx,
        )
        .await?;
        Ok(Self::with_server(server, event_rx))
    }

    fn with_server(server: RunningServer, event_rx: mpsc::Receiver<LspEvent>) -> Self {
        tracing::debug!(server = server.label(), "Language server handshake complete");
        Self {
            server,
            event_rx,
            status: ClientStatus::Starting,
        }
    }

    #[must_use]
    pub fn status(&self) -> &ClientStatus {
        &self.status
    }

    /// Drain pending connection events, up to `budget`. Never blocks.
    pub fn poll_events(&mut self, budget: usize) -> usize {
        let mut count = 0;
        while count < budget {
            match self.event_rx.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    count += 1;
                }
                Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => {
                    break;
                }
            }
        }
        count
    }

    /// Wait until the server reports the workspace as loaded, it stops, or
    /// `timeout` passes.
    pub async fn wait_until_running(&mut self, timeout: Duration) -> &ClientStatus {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.status == ClientStatus::Starting {
            match tokio::time::timeout_at(deadline, self.event_rx.recv()).await {
                Ok(Some(event)) => self.handle_event(event),
                Ok(None) | Err(_) => break,
            }
        }
        &self.status
    }

    fn handle_event(&mut self, event: LspEvent) {
        match event {
            LspEvent::Initialized {
                configuration,
                configurations,
            } => {
                self.status = ClientStatus::Running {
                    configuration,
                    configurations,
                };
            }
            LspEvent::ServerStopped { reason } => {
                self.status = ClientStatus::Stopped(reason);
            }
        }
        tracing::debug!(status = %self.status.label(), "Language server status changed");
    }

    pub async fn projects(&self) -> Result<Vec<Project>, RequestError> {
        self.server.request(protocol::PROJECTS, None::<()>).await
    }

    /// Schema of settings view `id` (`workspace` or `project`).
    pub async fn settings_schema(
        &self,
        id: &str,
        project: Option<&str>,
    ) -> Result<Schema, RequestError> {
        self.server
            .request(
                protocol::SETTINGS_SCHEMA,
                Some(SettingsSchemaParams { id, project }),
            )
            .await
    }

    pub async fn settings_values(
        &self,
        id: &str,
        selection: &Selection,
        project: Option<&str>,
    ) -> Result<SettingsValues, RequestError> {
        self.server
            .request(
                protocol::GET_SETTINGS_VALUES,
                Some(SettingsValuesParams::new(id, selection, project)),
            )
            .await
    }

    /// Fire-and-forget: the server sends no reply.
    pub async fn set_settings_values(
        &self,
        id: &str,
        selection: &Selection,
        project: Option<&str>,
        groups: &[GroupValues],
    ) -> Result<(), RequestError> {
        let params = SetSettingsValuesParams {
            target: SettingsValuesParams::new(id, selection, project),
            groups,
        };
        self.server
            .notify(protocol::SET_SETTINGS_VALUES, Some(params))
            .await
    }

    /// Project owning the file at `path`, if any.
    pub async fn file_project(&self, path: &Path) -> Result<Option<String>, RequestError> {
        let uri = protocol::path_to_file_uri(path)?;
        let params = FileProjectParams {
            text_document: TextDocumentIdentifier {
                uri: uri.to_string(),
            },
        };
        let project: Option<String> = self
            .server
            .request(protocol::FILE_PROJECT, Some(params))
            .await?;
        Ok(project.filter(|name| !name.is_empty()))
    }

    /// Switch the workspace build configuration; returns the one now active.
    pub async fn change_configuration(
        &mut self,
        configuration: &str,
    ) -> Result<String, RequestError> {
        let reply: ConfigurationParams = self
            .server
            .request(
                protocol::CHANGE_CONFIGURATION,
                Some(ConfigurationParams {
                    configuration: configuration.to_string(),
                }),
            )
            .await?;
        if let ClientStatus::Running { configuration, .. } = &mut self.status {
            configuration.clone_from(&reply.configuration);
        }
        Ok(reply.configuration)
    }

    pub async fn build(&self, clean: bool) -> Result<BuildResult, RequestError> {
        self.server
            .request(protocol::BUILD, Some(BuildParams { clean }))
            .await
    }

    pub async fn run(&self, project: &str) -> Result<RunResult, RequestError> {
        self.server
            .request(protocol::RUN, Some(RunParams { project }))
            .await
    }

    /// Shut this server down and connect a fresh one with `config`. The
    /// new client starts in [`ClientStatus::Starting`].
    pub async fn restart(self, config: &ServerConfig, workspace_root: Option<&Path>) -> Result<Self> {
        tracing::info!(server = self.server.label(), "Restarting language server");
        self.shutdown().await;
        Self::connect(config, workspace_root).await
    }

    pub async fn shutdown(self) {
        tracing::info!(server = self.server.label(), "Shutting down language server");
        self.server.shutdown().await;
    }
}
