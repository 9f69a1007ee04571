use std::fmt;

/// Identity of a settings group within one schema.
///
/// Only meaningful against the schema that produced it; a replacement schema
/// may reuse the same number for a different group.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct GroupId(u32);

impl GroupId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite identity of one setting: the owning group plus the setting name.
///
/// Ordered by group first so that iterating a keyed map visits each group's
/// settings contiguously.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SettingKey {
    group: GroupId,
    setting: String,
}

impl SettingKey {
    #[must_use]
    pub fn new(group: GroupId, setting: impl Into<String>) -> Self {
        Self {
            group,
            setting: setting.into(),
        }
    }

    #[must_use]
    pub fn group(&self) -> GroupId {
        self.group
    }

    #[must_use]
    pub fn setting(&self) -> &str {
        &self.setting
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group, self.setting)
    }
}
