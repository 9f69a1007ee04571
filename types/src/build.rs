//! Build and run results reported by the server.

use serde::{Deserialize, Serialize};

/// Reply to a build request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<String>>,
}

impl BuildResult {
    /// Exit code to report; a missing code counts as success.
    #[must_use]
    pub fn exit_code_or_success(&self) -> i32 {
        self.exit_code.unwrap_or(0)
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        self.lines.as_deref().unwrap_or_default()
    }
}

/// Launch description for a project, as resolved by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub target: String,
    #[serde(default)]
    pub arguments: String,
    #[serde(default)]
    pub working_dir: String,
    /// Names of environment variables to define (each set to `TRUE`).
    #[serde(default)]
    pub env: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildLineKind {
    Error,
    Warning,
    Compile,
    Plain,
}

impl BuildLineKind {
    #[must_use]
    pub fn classify(line: &str) -> Self {
        if line.starts_with("ERROR") {
            Self::Error
        } else if line.starts_with("WARNING") {
            Self::Warning
        } else if line.starts_with("Compile ") {
            Self::Compile
        } else {
            Self::Plain
        }
    }

    /// ANSI SGR sequence that introduces a line of this kind.
    #[must_use]
    pub const fn ansi_prefix(self) -> &'static str {
        match self {
            Self::Error => "\x1b[31m",
            Self::Warning => "\x1b[93m",
            Self::Compile => "\x1b[1m",
            Self::Plain => "\x1b[0m",
        }
    }
}

/// Render one build output line for a terminal, with colour and CRLF.
#[must_use]
pub fn render_build_line(line: &str, color: bool) -> String {
    if color {
        format!("{}{line}\r\n", BuildLineKind::classify(line).ansi_prefix())
    } else {
        format!("{line}\r\n")
    }
}
