//! Wire shape of settings values, grouped by group id.
//!
//! The same shape is used in both directions: the server's reply to a values
//! request, and the `groups` array of a set-values notification.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, SettingKey};
use crate::value::SettingValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupValues {
    pub id: GroupId,
    #[serde(default)]
    pub settings: BTreeMap<String, SettingValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsValues {
    #[serde(default)]
    pub groups: Vec<GroupValues>,
}

impl SettingsValues {
    /// Build the grouped form from flat keyed entries, one `GroupValues` per
    /// distinct group in ascending id order.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (SettingKey, SettingValue)>,
    {
        let mut grouped: BTreeMap<GroupId, BTreeMap<String, SettingValue>> = BTreeMap::new();
        for (key, value) in entries {
            grouped
                .entry(key.group())
                .or_default()
                .insert(key.setting().to_string(), value);
        }
        Self {
            groups: grouped
                .into_iter()
                .map(|(id, settings)| GroupValues { id, settings })
                .collect(),
        }
    }

    /// Flatten into keyed entries. A group id repeated in the payload
    /// overwrites earlier entries for the same setting.
    pub fn into_entries(self) -> impl Iterator<Item = (SettingKey, SettingValue)> {
        self.groups.into_iter().flat_map(|group| {
            let id = group.id;
            group
                .settings
                .into_iter()
                .map(move |(name, value)| (SettingKey::new(id, name), value))
        })
    }

    /// Total number of settings across all groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.settings.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A project known to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub directory: String,
}
