//! Schema ownership, selection switching, and the apply/reload cycle.
//!
//! The coordinator is a plain state machine driven by its owner: inbound
//! server messages go in through [`Coordinator::handle`], user intents through
//! the public methods, and every request to the server leaves through the
//! [`SettingsChannel`]. Observers subscribe to schema snapshots and store
//! status via `tokio::sync::watch`.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use trellis_types::{
    Group, GroupId, Schema, SelectionAxis, SelectionError, SettingValue, SettingsValues,
    ValueError,
};

use crate::message::{InboundMessage, LoadRequest, OutboundMessage, SetValues, SettingsChannel};
use crate::prompt::{ConfirmChoice, ConfirmPrompt, PendingSwitch, Prompter};
use crate::store::{StoreStatus, ValueStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("no settings schema has been received yet")]
    NoSchema,
    #[error(transparent)]
    NotAvailable(#[from] SelectionError),
    #[error("no switch is waiting for confirmation")]
    NoPendingSwitch,
    #[error("group {0} is not part of the current schema")]
    UnknownGroup(GroupId),
}

/// Result of asking to change the configuration or platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// Selection changed and values for it were requested.
    Switched,
    /// Target was already selected; nothing happened.
    Unchanged,
    /// Pending edits exist; answer the prompt with
    /// [`Coordinator::resolve_prompt`].
    AwaitingConfirmation(ConfirmPrompt),
    /// Another prompt is already open; this request was ignored.
    PromptOpen,
    /// A prompt was shown and answered with this choice.
    Resolved(ConfirmChoice),
}

/// Coarse lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// No schema yet.
    Empty,
    /// Schema present, no pending edits.
    Idle,
    /// Schema present with pending edits.
    Dirty,
    /// A switch is waiting on the confirmation prompt.
    Confirming,
}

/// What observers of the schema see.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    pub schema: Option<Arc<Schema>>,
    pub active_group: Option<GroupId>,
}

impl SchemaSnapshot {
    #[must_use]
    pub fn active_group(&self) -> Option<&Group> {
        let schema = self.schema.as_deref()?;
        schema.group(self.active_group?)
    }
}

pub struct Coordinator<C> {
    channel: C,
    schema: Option<Arc<Schema>>,
    active_group: Option<GroupId>,
    store: ValueStore,
    pending: Option<PendingSwitch>,
    load_seq: u64,
    snapshot_tx: watch::Sender<SchemaSnapshot>,
}

impl<C: SettingsChannel> Coordinator<C> {
    pub fn new(channel: C) -> Self {
        let (snapshot_tx, _) = watch::channel(SchemaSnapshot::default());
        Self {
            channel,
            schema: None,
            active_group: None,
            store: ValueStore::new(),
            pending: None,
            load_seq: 0,
            snapshot_tx,
        }
    }

    // ========================================================================
    // Observation
    // ========================================================================

    #[must_use]
    pub fn subscribe_schema(&self) -> watch::Receiver<SchemaSnapshot> {
        self.snapshot_tx.subscribe()
    }

    #[must_use]
    pub fn subscribe_store(&self) -> watch::Receiver<StoreStatus> {
        self.store.subscribe()
    }

    fn publish_schema(&self) {
        self.snapshot_tx.send_replace(SchemaSnapshot {
            schema: self.schema.clone(),
            active_group: self.active_group,
        });
    }

    #[must_use]
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_deref()
    }

    #[must_use]
    pub fn active_group(&self) -> Option<&Group> {
        self.schema()?.group(self.active_group?)
    }

    #[must_use]
    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    #[must_use]
    pub fn pending_switch(&self) -> Option<&PendingSwitch> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        if self.schema.is_none() {
            CoordinatorState::Empty
        } else if self.pending.is_some() {
            CoordinatorState::Confirming
        } else if self.store.has_changed() {
            CoordinatorState::Dirty
        } else {
            CoordinatorState::Idle
        }
    }

    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    // ========================================================================
    // Server input
    // ========================================================================

    pub fn handle(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::Schema { schema } => self.on_schema(schema),
            InboundMessage::Values { seq, values } => {
                self.on_values(seq, values);
            }
        }
    }

    /// Install a new schema: previous values and edits are dropped, the first
    /// group becomes active, and values for the schema's selection are
    /// requested.
    pub fn on_schema(&mut self, schema: Schema) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(axis = %pending.axis, to = %pending.target, "Schema replaced; dropping pending switch");
        }
        tracing::info!(
            schema = schema.id(),
            groups = schema.groups().len(),
            selection = %schema.selection(),
            "Settings schema received"
        );
        self.store.clear();
        self.active_group = schema.first_group().map(Group::id);
        self.schema = Some(Arc::new(schema));
        self.publish_schema();
        self.request_values();
    }

    /// Install values answering load `seq`. Returns `false` when the reply is
    /// stale, i.e. a newer load has been issued since.
    pub fn on_values(&mut self, seq: u64, values: SettingsValues) -> bool {
        if seq != self.load_seq || self.schema.is_none() {
            tracing::debug!(seq, current = self.load_seq, "Discarding stale settings values");
            return false;
        }
        self.store.load(values);
        true
    }

    fn request_values(&mut self) {
        let Some(schema) = self.schema.as_deref() else {
            return;
        };
        self.load_seq += 1;
        let request = LoadRequest {
            seq: self.load_seq,
            schema_id: schema.id().to_string(),
            selection: schema.selection(),
        };
        tracing::debug!(seq = request.seq, selection = %request.selection, "Requesting settings values");
        self.channel.post(OutboundMessage::RequestValues(request));
    }

    // ========================================================================
    // Editing
    // ========================================================================

    pub fn set(&mut self, group: GroupId, setting: &str, value: impl Into<SettingValue>) {
        self.store.set(group, setting, value);
    }

    pub fn set_json(
        &mut self,
        group: GroupId,
        setting: &str,
        value: serde_json::Value,
    ) -> Result<(), ValueError> {
        self.store.set_json(group, setting, value)
    }

    pub fn select_group(&mut self, id: GroupId) -> Result<(), SettingsError> {
        let schema = self.schema.as_deref().ok_or(SettingsError::NoSchema)?;
        if schema.group(id).is_none() {
            return Err(SettingsError::UnknownGroup(id));
        }
        if self.active_group != Some(id) {
            self.active_group = Some(id);
            self.publish_schema();
        }
        Ok(())
    }

    /// Drop every pending edit.
    pub fn reset(&mut self) {
        self.store.reset();
    }

    /// Persist pending edits and reload. Returns the number of settings sent;
    /// with nothing pending no message is posted at all.
    pub fn apply(&mut self) -> usize {
        let sent = self.post_changes();
        if sent > 0 {
            self.request_values();
        }
        sent
    }

    fn post_changes(&mut self) -> usize {
        if !self.store.has_changed() {
            return 0;
        }
        let Some(schema) = self.schema.as_deref() else {
            return 0;
        };
        let changes = self.store.drain_changes(schema);
        let message = SetValues {
            schema_id: schema.id().to_string(),
            selection: schema.selection(),
            groups: changes.groups,
        };
        let sent = message.len();
        tracing::info!(schema = %message.schema_id, selection = %message.selection, settings = sent, "Applying settings");
        self.channel.post(OutboundMessage::SetValues(message));
        sent
    }

    // ========================================================================
    // Selection switching
    // ========================================================================

    pub fn set_configuration(&mut self, target: &str) -> Result<SwitchOutcome, SettingsError> {
        self.request_switch(SelectionAxis::Configuration, target)
    }

    pub fn set_platform(&mut self, target: &str) -> Result<SwitchOutcome, SettingsError> {
        self.request_switch(SelectionAxis::Platform, target)
    }

    /// Ask to change one selection axis.
    ///
    /// With no pending edits the switch happens immediately. Otherwise the
    /// switch is parked and a prompt is returned; nothing changes until
    /// [`resolve_prompt`](Self::resolve_prompt) is called. While a prompt is
    /// open further requests are ignored and the schema is republished so
    /// selectors can snap back to the real selection.
    pub fn request_switch(
        &mut self,
        axis: SelectionAxis,
        target: &str,
    ) -> Result<SwitchOutcome, SettingsError> {
        if self.pending.is_some() {
            self.publish_schema();
            return Ok(SwitchOutcome::PromptOpen);
        }
        let schema = self.schema.as_deref().ok_or(SettingsError::NoSchema)?;
        if !schema.available(axis).iter().any(|v| v == target) {
            return Err(SelectionError {
                axis,
                target: target.to_string(),
            }
            .into());
        }
        if schema.selected(axis) == target {
            return Ok(SwitchOutcome::Unchanged);
        }

        let switch = PendingSwitch {
            axis,
            target: target.to_string(),
        };
        if self.store.has_changed() {
            let prompt = ConfirmPrompt::new(self.store.changed_count());
            tracing::debug!(%axis, to = target, changed = prompt.changed(), "Switch needs confirmation");
            self.pending = Some(switch);
            return Ok(SwitchOutcome::AwaitingConfirmation(prompt));
        }
        self.perform_switch(&switch)?;
        Ok(SwitchOutcome::Switched)
    }

    /// Answer the open prompt.
    ///
    /// `Apply` posts the pending edits under the old selection before
    /// switching. `Discard` drops them and switches. `Cancel` keeps them,
    /// stays put, and republishes the schema.
    pub fn resolve_prompt(&mut self, choice: ConfirmChoice) -> Result<(), SettingsError> {
        let switch = self.pending.take().ok_or(SettingsError::NoPendingSwitch)?;
        tracing::debug!(%choice, axis = %switch.axis, to = %switch.target, "Prompt resolved");
        match choice {
            ConfirmChoice::Apply => {
                self.post_changes();
                self.perform_switch(&switch)
            }
            ConfirmChoice::Discard => {
                self.store.reset();
                self.perform_switch(&switch)
            }
            ConfirmChoice::Cancel => {
                self.publish_schema();
                Ok(())
            }
        }
    }

    /// Request a switch and, if it needs confirmation, ask `prompter` and act
    /// on the answer before returning.
    pub async fn switch_guarded<P: Prompter>(
        &mut self,
        axis: SelectionAxis,
        target: &str,
        prompter: &mut P,
    ) -> Result<SwitchOutcome, SettingsError> {
        match self.request_switch(axis, target)? {
            SwitchOutcome::AwaitingConfirmation(prompt) => {
                let choice = prompter.confirm(&prompt).await;
                self.resolve_prompt(choice)?;
                Ok(SwitchOutcome::Resolved(choice))
            }
            outcome => Ok(outcome),
        }
    }

    fn perform_switch(&mut self, switch: &PendingSwitch) -> Result<(), SettingsError> {
        let schema = self.schema.as_mut().ok_or(SettingsError::NoSchema)?;
        Arc::make_mut(schema).select(switch.axis, &switch.target)?;
        tracing::info!(axis = %switch.axis, to = %switch.target, "Selection switched");
        self.publish_schema();
        self.request_values();
        Ok(())
    }
}
