//! Server-declared settings schema.
//!
//! Raw wire structs (camelCase, optional metadata) stay private; the public
//! types are produced through `#[serde(try_from)]` so that holding a
//! [`Schema`] is proof its structural invariants hold:
//!
//! - group ids are unique within the schema
//! - setting names are unique within their owning group
//! - the selected configuration/platform is one of the listed ones, or empty
//!
//! Field definitions themselves are never second-guessed beyond that shape.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use thiserror::Error;

use crate::ids::GroupId;
use crate::selection::{Selection, SelectionAxis};
use crate::value::SettingValue;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("setting name must not be empty")]
    EmptySettingName,
    #[error("group setting '{setting}' has no child settings")]
    MissingChildren { setting: String },
    #[error("default values of '{setting}' must be {expected}, got {actual}")]
    DefaultValuesShape {
        setting: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("duplicate setting '{setting}' in '{owner}'")]
    DuplicateSetting { owner: String, setting: String },
    #[error("duplicate group id {0}")]
    DuplicateGroup(GroupId),
    #[error("selected {axis} '{value}' is not one of the available values")]
    UnknownSelection { axis: SelectionAxis, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{axis} '{target}' is not available in this schema")]
pub struct SelectionError {
    pub axis: SelectionAxis,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SettingType {
    #[serde(alias = "boolean")]
    Bool,
    String,
    #[serde(alias = "integer")]
    Int,
    #[serde(alias = "array")]
    List,
    Object,
    Group,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSetting {
    #[serde(rename = "type")]
    kind: SettingType,
    name: String,
    #[serde(default)]
    values: Option<Vec<SettingValue>>,
    #[serde(default)]
    negative_equals_not_set: Option<bool>,
    #[serde(default)]
    string_type: Option<String>,
    #[serde(default)]
    settings: Option<Vec<Setting>>,
    #[serde(default)]
    default_values: Option<SettingValue>,
}

/// Type tag plus the metadata that only makes sense for that type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingKind {
    Bool,
    String {
        /// Sub-kind hint for editors (e.g. a path or file picker).
        string_type: Option<String>,
    },
    Int {
        /// A negative value means "not set" rather than a literal number.
        negative_equals_not_set: bool,
    },
    List {
        default_values: Vec<SettingValue>,
    },
    Object {
        default_values: BTreeMap<String, SettingValue>,
    },
    Group {
        settings: Vec<Setting>,
    },
}

/// A single configurable field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSetting")]
pub struct Setting {
    name: String,
    kind: SettingKind,
    allowed_values: Option<Vec<SettingValue>>,
}

fn ensure_unique_names(owner: &str, settings: &[Setting]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for setting in settings {
        if !seen.insert(setting.name()) {
            return Err(SchemaError::DuplicateSetting {
                owner: owner.to_string(),
                setting: setting.name().to_string(),
            });
        }
    }
    Ok(())
}

impl TryFrom<RawSetting> for Setting {
    type Error = SchemaError;

    fn try_from(raw: RawSetting) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err(SchemaError::EmptySettingName);
        }

        let shape_error = |expected: &'static str, actual: &SettingValue| {
            SchemaError::DefaultValuesShape {
                setting: raw.name.clone(),
                expected,
                actual: actual.kind_name(),
            }
        };

        let kind = match raw.kind {
            SettingType::Bool => SettingKind::Bool,
            SettingType::String => SettingKind::String {
                string_type: raw.string_type,
            },
            SettingType::Int => SettingKind::Int {
                negative_equals_not_set: raw.negative_equals_not_set.unwrap_or(false),
            },
            SettingType::List => match raw.default_values {
                None => SettingKind::List {
                    default_values: Vec::new(),
                },
                Some(SettingValue::List(items)) => SettingKind::List {
                    default_values: items,
                },
                Some(other) => return Err(shape_error("a list", &other)),
            },
            SettingType::Object => match raw.default_values {
                None => SettingKind::Object {
                    default_values: BTreeMap::new(),
                },
                Some(SettingValue::Object(map)) => SettingKind::Object {
                    default_values: map,
                },
                Some(other) => return Err(shape_error("an object", &other)),
            },
            SettingType::Group => match raw.settings {
                Some(settings) if !settings.is_empty() => {
                    ensure_unique_names(&raw.name, &settings)?;
                    SettingKind::Group { settings }
                }
                _ => {
                    return Err(SchemaError::MissingChildren {
                        setting: raw.name,
                    });
                }
            },
        };

        Ok(Self {
            name: raw.name,
            kind,
            allowed_values: raw.values,
        })
    }
}

impl Setting {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> &SettingKind {
        &self.kind
    }

    /// Enum-like restriction on the accepted values, if the server sent one.
    #[must_use]
    pub fn allowed_values(&self) -> Option<&[SettingValue]> {
        self.allowed_values.as_deref()
    }
}

#[derive(Deserialize)]
struct RawGroup {
    id: GroupId,
    name: String,
    #[serde(default)]
    configuration: bool,
    #[serde(default)]
    platform: bool,
    #[serde(default)]
    settings: Vec<Setting>,
}

/// A named collection of settings with its own identity and variance flags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawGroup")]
pub struct Group {
    id: GroupId,
    name: String,
    varies_by_configuration: bool,
    varies_by_platform: bool,
    settings: Vec<Setting>,
}

impl TryFrom<RawGroup> for Group {
    type Error = SchemaError;

    fn try_from(raw: RawGroup) -> Result<Self, Self::Error> {
        ensure_unique_names(&raw.name, &raw.settings)?;
        Ok(Self {
            id: raw.id,
            name: raw.name,
            varies_by_configuration: raw.configuration,
            varies_by_platform: raw.platform,
            settings: raw.settings,
        })
    }
}

impl Group {
    #[must_use]
    pub fn id(&self) -> GroupId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn varies_by_configuration(&self) -> bool {
        self.varies_by_configuration
    }

    #[must_use]
    pub fn varies_by_platform(&self) -> bool {
        self.varies_by_platform
    }

    #[must_use]
    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }

    #[must_use]
    pub fn setting(&self, name: &str) -> Option<&Setting> {
        self.settings.iter().find(|s| s.name() == name)
    }
}

#[derive(Deserialize)]
struct RawSchema {
    id: String,
    #[serde(default)]
    configurations: Vec<String>,
    #[serde(default)]
    configuration: String,
    #[serde(default)]
    platforms: Vec<String>,
    #[serde(default)]
    platform: String,
    #[serde(default)]
    groups: Vec<Group>,
}

/// Complete description of one settings view (e.g. "workspace" or "project").
///
/// Replaced wholesale whenever the server sends a new one; only the
/// configuration/platform selection is mutable in place, and only to values
/// the schema lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSchema")]
pub struct Schema {
    id: String,
    configurations: Vec<String>,
    configuration: String,
    platforms: Vec<String>,
    platform: String,
    groups: Vec<Group>,
}

fn check_selected(
    axis: SelectionAxis,
    value: &str,
    available: &[String],
) -> Result<(), SchemaError> {
    if value.is_empty() || available.iter().any(|v| v == value) {
        Ok(())
    } else {
        Err(SchemaError::UnknownSelection {
            axis,
            value: value.to_string(),
        })
    }
}

impl TryFrom<RawSchema> for Schema {
    type Error = SchemaError;

    fn try_from(raw: RawSchema) -> Result<Self, Self::Error> {
        let mut ids = HashSet::new();
        for group in &raw.groups {
            if !ids.insert(group.id()) {
                return Err(SchemaError::DuplicateGroup(group.id()));
            }
        }
        check_selected(
            SelectionAxis::Configuration,
            &raw.configuration,
            &raw.configurations,
        )?;
        check_selected(SelectionAxis::Platform, &raw.platform, &raw.platforms)?;

        Ok(Self {
            id: raw.id,
            configurations: raw.configurations,
            configuration: raw.configuration,
            platforms: raw.platforms,
            platform: raw.platform,
            groups: raw.groups,
        })
    }
}

impl Schema {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn configurations(&self) -> &[String] {
        &self.configurations
    }

    #[must_use]
    pub fn configuration(&self) -> &str {
        &self.configuration
    }

    #[must_use]
    pub fn platforms(&self) -> &[String] {
        &self.platforms
    }

    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }

    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id() == id)
    }

    #[must_use]
    pub fn first_group(&self) -> Option<&Group> {
        self.groups.first()
    }

    #[must_use]
    pub fn available(&self, axis: SelectionAxis) -> &[String] {
        match axis {
            SelectionAxis::Configuration => &self.configurations,
            SelectionAxis::Platform => &self.platforms,
        }
    }

    #[must_use]
    pub fn selected(&self, axis: SelectionAxis) -> &str {
        match axis {
            SelectionAxis::Configuration => &self.configuration,
            SelectionAxis::Platform => &self.platform,
        }
    }

    #[must_use]
    pub fn selection(&self) -> Selection {
        Selection::new(self.configuration.clone(), self.platform.clone())
    }

    /// Change the selected value on one axis.
    ///
    /// Returns `Ok(false)` when `target` is already selected.
    pub fn select(&mut self, axis: SelectionAxis, target: &str) -> Result<bool, SelectionError> {
        if !self.available(axis).iter().any(|v| v == target) {
            return Err(SelectionError {
                axis,
                target: target.to_string(),
            });
        }
        let slot = match axis {
            SelectionAxis::Configuration => &mut self.configuration,
            SelectionAxis::Platform => &mut self.platform,
        };
        if slot == target {
            return Ok(false);
        }
        *slot = target.to_string();
        Ok(true)
    }
}
