//! `~/.trellis/config.toml` loading.
//!
//! ```toml
//! [server]
//! command = "BeefLsp"        # or transport = "tcp", host, port
//! args = ["--logFile", "${HOME}/beef-lsp.log"]
//! request_timeout_secs = 30
//!
//! [build]
//! color = true
//! ```
//!
//! `${VAR}` in any string value is replaced by the environment variable's
//! value (empty when unset) before the file is interpreted.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use trellis_types::ServerConfig;

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrellisConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub build: BuildConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildConfig {
    /// Colour build output by severity.
    #[serde(default = "default_true")]
    pub color: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl TrellisConfig {
    /// Load the user config. `Ok(None)` when there is no home directory or
    /// no config file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!(path = %path.display(), error = %source, "Failed to read config");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::parse(&content)
            .map(Some)
            .map_err(|source| {
                tracing::warn!(path = %path.display(), error = %source, "Failed to parse config");
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })
    }

    /// Interpret config text, expanding `${VAR}` references first.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        let mut table: toml::Table = content.parse()?;
        expand_table(&mut table);
        toml::Value::Table(table).try_into()
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

fn expand_table(table: &mut toml::Table) {
    for (_, value) in table.iter_mut() {
        expand_value(value);
    }
}

fn expand_value(value: &mut toml::Value) {
    match value {
        toml::Value::String(s) => {
            if s.contains("${") {
                *s = expand_env_vars(s);
            }
        }
        toml::Value::Array(items) => items.iter_mut().for_each(expand_value),
        toml::Value::Table(table) => expand_table(table),
        _ => {}
    }
}

/// Replace each `${VAR}` with the variable's value; unset variables become
/// empty. An unterminated `${` is kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..start + 2 + len];
        if !name.is_empty() {
            out.push_str(&std::env::var(name).unwrap_or_default());
        }
        rest = &rest[start + 3 + len..];
    }
    out.push_str(rest);
    out
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".trellis").join("config.toml"))
}
