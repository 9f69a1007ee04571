//! Messages exchanged between the coordinator and whatever talks to the server.
//!
//! The coordinator never performs I/O itself. It posts [`OutboundMessage`]s
//! through a [`SettingsChannel`] and is fed [`InboundMessage`]s by its owner.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use trellis_types::{GroupValues, Schema, Selection, SettingsValues};

/// Ask for the values of `schema_id` under `selection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    /// Echoed back on the matching [`InboundMessage::Values`].
    pub seq: u64,
    #[serde(rename = "id")]
    pub schema_id: String,
    #[serde(flatten)]
    pub selection: Selection,
}

/// Persist pending edits for `schema_id` under `selection`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetValues {
    #[serde(rename = "id")]
    pub schema_id: String,
    #[serde(flatten)]
    pub selection: Selection,
    pub groups: Vec<GroupValues>,
}

impl SetValues {
    /// Number of settings carried across all groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.settings.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "values")]
    RequestValues(LoadRequest),
    #[serde(rename = "set-values")]
    SetValues(SetValues),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "message", rename_all = "lowercase")]
pub enum InboundMessage {
    /// A new schema replaces the current one wholesale.
    Schema { schema: Schema },
    /// Reply to the [`LoadRequest`] with the same `seq`.
    Values { seq: u64, values: SettingsValues },
}

/// Sink for outbound messages. Posting never blocks and never fails from the
/// coordinator's point of view.
pub trait SettingsChannel {
    fn post(&mut self, message: OutboundMessage);
}

/// Records messages in order; handy for headless use and tests.
impl SettingsChannel for Vec<OutboundMessage> {
    fn post(&mut self, message: OutboundMessage) {
        self.push(message);
    }
}

impl SettingsChannel for mpsc::UnboundedSender<OutboundMessage> {
    fn post(&mut self, message: OutboundMessage) {
        if self.send(message).is_err() {
            tracing::warn!("Settings channel closed; dropping outbound message");
        }
    }
}
