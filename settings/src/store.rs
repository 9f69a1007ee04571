//! Last-loaded baseline plus a sparse overlay of pending edits.
//!
//! Invariant: a key is present in the overlay only while its value differs
//! structurally from the baseline entry. Setting a value back to its baseline
//! removes the overlay entry, so `changed_count()` is exactly the number of
//! real edits.

use std::collections::BTreeMap;

use tokio::sync::watch;
use trellis_types::{
    GroupId, Schema, SettingKey, SettingValue, SettingsValues, ValueError,
};

/// Published to observers after every mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStatus {
    /// Bumped on every load, edit, reset, or drain.
    pub revision: u64,
    /// Number of pending edits at that revision.
    pub changed: usize,
}

pub struct ValueStore {
    baseline: BTreeMap<SettingKey, SettingValue>,
    overlay: BTreeMap<SettingKey, SettingValue>,
    revision: u64,
    status_tx: watch::Sender<StoreStatus>,
}

impl Default for ValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueStore")
            .field("baseline", &self.baseline.len())
            .field("overlay", &self.overlay.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl ValueStore {
    #[must_use]
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(StoreStatus::default());
        Self {
            baseline: BTreeMap::new(),
            overlay: BTreeMap::new(),
            revision: 0,
            status_tx,
        }
    }

    /// Observe store mutations. The receiver starts at the current status.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StoreStatus> {
        self.status_tx.subscribe()
    }

    fn changed(&mut self) {
        self.revision += 1;
        self.status_tx.send_replace(StoreStatus {
            revision: self.revision,
            changed: self.overlay.len(),
        });
    }

    /// Replace the baseline wholesale and drop every pending edit.
    pub fn load(&mut self, values: SettingsValues) {
        self.baseline = values.into_entries().collect();
        self.overlay.clear();
        tracing::debug!(settings = self.baseline.len(), "Baseline loaded");
        self.changed();
    }

    /// Drop baseline and overlay, e.g. when the schema they belong to is replaced.
    pub fn clear(&mut self) {
        self.baseline.clear();
        self.overlay.clear();
        self.changed();
    }

    /// Effective value: the pending edit if any, else the baseline.
    #[must_use]
    pub fn get(&self, group: GroupId, setting: &str) -> Option<&SettingValue> {
        let key = SettingKey::new(group, setting);
        self.overlay.get(&key).or_else(|| self.baseline.get(&key))
    }

    /// Last loaded value, ignoring pending edits.
    #[must_use]
    pub fn baseline(&self, group: GroupId, setting: &str) -> Option<&SettingValue> {
        self.baseline.get(&SettingKey::new(group, setting))
    }

    fn typed<'a, T>(
        &'a self,
        group: GroupId,
        setting: &str,
        expected: &'static str,
        extract: impl FnOnce(&'a SettingValue) -> Option<T>,
    ) -> Option<T> {
        let value = self.get(group, setting)?;
        let typed = extract(value);
        if typed.is_none() {
            tracing::warn!(
                group = %group,
                setting,
                expected,
                actual = value.kind_name(),
                "Setting value has unexpected type; using default"
            );
        }
        typed
    }

    #[must_use]
    pub fn get_bool(&self, group: GroupId, setting: &str) -> bool {
        self.typed(group, setting, "bool", SettingValue::as_bool)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn get_string(&self, group: GroupId, setting: &str) -> String {
        self.typed(group, setting, "string", SettingValue::as_str)
            .map(str::to_string)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn get_int(&self, group: GroupId, setting: &str) -> i64 {
        self.typed(group, setting, "int", SettingValue::as_int)
            .unwrap_or(0)
    }

    /// Owned deep copy; mutating it never touches the store.
    #[must_use]
    pub fn get_list(&self, group: GroupId, setting: &str) -> Vec<SettingValue> {
        self.typed(group, setting, "list", SettingValue::as_list)
            .map(<[SettingValue]>::to_vec)
            .unwrap_or_default()
    }

    /// Owned deep copy; mutating it never touches the store.
    #[must_use]
    pub fn get_object(&self, group: GroupId, setting: &str) -> BTreeMap<String, SettingValue> {
        self.typed(group, setting, "object", SettingValue::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Record an edit. Equal-to-baseline values revert the edit instead.
    pub fn set(&mut self, group: GroupId, setting: &str, value: impl Into<SettingValue>) {
        let value = value.into();
        let key = SettingKey::new(group, setting);
        if self.baseline.get(&key) == Some(&value) {
            self.overlay.remove(&key);
        } else {
            self.overlay.insert(key, value);
        }
        self.changed();
    }

    /// Record an edit arriving as raw JSON from a UI surface.
    ///
    /// `null` is ignored without notifying observers; anything that is not a
    /// valid setting value is rejected and leaves the store untouched.
    pub fn set_json(
        &mut self,
        group: GroupId,
        setting: &str,
        value: serde_json::Value,
    ) -> Result<(), ValueError> {
        if value.is_null() {
            return Ok(());
        }
        let value = SettingValue::try_from(value)?;
        self.set(group, setting, value);
        Ok(())
    }

    #[must_use]
    pub fn is_changed(&self, group: GroupId, setting: &str) -> bool {
        self.overlay.contains_key(&SettingKey::new(group, setting))
    }

    #[must_use]
    pub fn changed_count(&self) -> usize {
        self.overlay.len()
    }

    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.changed_count() > 0
    }

    /// Pending edits in key order.
    pub fn changes(&self) -> impl Iterator<Item = (&SettingKey, &SettingValue)> {
        self.overlay.iter()
    }

    /// Discard every pending edit; the baseline is untouched.
    pub fn reset(&mut self) {
        self.overlay.clear();
        self.changed();
    }

    /// Move the overlay out, grouped by group id, leaving no pending edits.
    ///
    /// Every overlay key must belong to a group of `schema`: the overlay is
    /// cleared whenever the schema is replaced, so a stale id is a bug.
    pub fn drain_changes(&mut self, schema: &Schema) -> SettingsValues {
        let overlay = std::mem::take(&mut self.overlay);
        let entries = overlay.into_iter().filter(|(key, _)| {
            let known = schema.group(key.group()).is_some();
            debug_assert!(known, "pending edit {key} refers to a group outside the schema");
            if !known {
                tracing::error!(key = %key, schema = schema.id(), "Dropping edit for unknown group");
            }
            known
        });
        let drained = SettingsValues::from_entries(entries);
        self.changed();
        drained
    }
}
