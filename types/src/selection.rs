use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two independent selection axes a schema carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionAxis {
    Configuration,
    Platform,
}

impl SelectionAxis {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Platform => "platform",
        }
    }
}

impl fmt::Display for SelectionAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The active `(configuration, platform)` pair values are loaded for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub configuration: String,
    pub platform: String,
}

impl Selection {
    #[must_use]
    pub fn new(configuration: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            configuration: configuration.into(),
            platform: platform.into(),
        }
    }

    #[must_use]
    pub fn get(&self, axis: SelectionAxis) -> &str {
        match axis {
            SelectionAxis::Configuration => &self.configuration,
            SelectionAxis::Platform => &self.platform,
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.configuration, self.platform)
    }
}
