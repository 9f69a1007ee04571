//! Carries a settings coordinator's messages to the language server.
//!
//! The coordinator speaks [`OutboundMessage`]/[`InboundMessage`]; this module
//! turns those into `beef/*` calls for one settings view and turns replies
//! (or failures) back into [`BridgeEvent`]s. Nothing is retried.

use std::path::Path;

use tokio::sync::mpsc;
use trellis_settings::{InboundMessage, OutboundMessage};

use crate::client::LspClient;
use crate::types::RequestError;

/// One settings view: `workspace`, or `project` scoped to a named project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsView {
    pub id: String,
    pub project: Option<String>,
}

impl SettingsView {
    #[must_use]
    pub fn workspace() -> Self {
        Self {
            id: "workspace".to_string(),
            project: None,
        }
    }

    #[must_use]
    pub fn project(name: impl Into<String>) -> Self {
        Self {
            id: "project".to_string(),
            project: Some(name.into()),
        }
    }

    /// Window title, e.g. `Project Settings: Core`.
    #[must_use]
    pub fn title(&self) -> String {
        let mut chars = self.id.chars();
        let name: String = chars
            .next()
            .map(|first| first.to_uppercase().chain(chars).collect())
            .unwrap_or_default();
        match &self.project {
            Some(project) => format!("{name} Settings: {project}"),
            None => format!("{name} Settings"),
        }
    }
}

#[derive(Debug)]
pub enum BridgeEvent {
    /// Feed to the coordinator.
    Settings(InboundMessage),
    /// Show to the user; the coordinator's state is unaffected.
    Failed {
        operation: &'static str,
        message: String,
    },
}

impl BridgeEvent {
    fn failed(operation: &'static str, error: &RequestError) -> Self {
        tracing::warn!(operation, %error, "Settings request failed");
        Self::Failed {
            operation,
            message: error.to_string(),
        }
    }
}

pub struct SettingsBridge {
    view: SettingsView,
}

impl SettingsBridge {
    #[must_use]
    pub fn new(view: SettingsView) -> Self {
        Self { view }
    }

    #[must_use]
    pub fn view(&self) -> &SettingsView {
        &self.view
    }

    /// Fetch the view's schema.
    pub async fn open(&self, client: &LspClient) -> BridgeEvent {
        match client
            .settings_schema(&self.view.id, self.view.project.as_deref())
            .await
        {
            Ok(schema) => BridgeEvent::Settings(InboundMessage::Schema { schema }),
            Err(e) => BridgeEvent::failed("load settings schema", &e),
        }
    }

    /// Perform the server call for one coordinator message. Persisting
    /// produces no event unless it fails.
    pub async fn forward(&self, client: &LspClient, message: OutboundMessage) -> Option<BridgeEvent> {
        let project = self.view.project.as_deref();
        match message {
            OutboundMessage::RequestValues(load) => {
                let event = match client
                    .settings_values(&load.schema_id, &load.selection, project)
                    .await
                {
                    Ok(values) => BridgeEvent::Settings(InboundMessage::Values {
                        seq: load.seq,
                        values,
                    }),
                    Err(e) => BridgeEvent::failed("load settings values", &e),
                };
                Some(event)
            }
            OutboundMessage::SetValues(set) => client
                .set_settings_values(&set.schema_id, &set.selection, project, &set.groups)
                .await
                .err()
                .map(|e| BridgeEvent::failed("save settings", &e)),
        }
    }

    /// Open the view, then forward messages until either channel closes.
    pub async fn run(
        &self,
        client: &LspClient,
        mut outbound: mpsc::UnboundedReceiver<OutboundMessage>,
        events: mpsc::UnboundedSender<BridgeEvent>,
    ) {
        if events.send(self.open(client).await).is_err() {
            return;
        }
        while let Some(message) = outbound.recv().await {
            if let Some(event) = self.forward(client, message).await
                && events.send(event).is_err()
            {
                break;
            }
        }
        tracing::debug!(view = %self.view.id, "Settings bridge stopped");
    }
}

/// Pick the project for a project-scoped view: an explicit name wins, then
/// the project owning `manifest` (a `.toml` file). `None` leaves the choice
/// to the caller.
pub async fn resolve_project(
    client: &LspClient,
    explicit: Option<&str>,
    manifest: Option<&Path>,
) -> Result<Option<String>, RequestError> {
    if let Some(name) = explicit {
        return Ok(Some(name.to_string()));
    }
    match manifest {
        Some(path) if path.extension().is_some_and(|ext| ext == "toml") => {
            client.file_project(path).await
        }
        _ => Ok(None),
    }
}
