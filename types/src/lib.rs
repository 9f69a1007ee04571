//! Core domain types for trellis.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod build;
mod ids;
mod schema;
mod selection;
mod server;
mod value;
mod values;

pub use build::{BuildLineKind, BuildResult, RunResult, render_build_line};
pub use ids::{GroupId, SettingKey};
pub use schema::{Group, Schema, SchemaError, SelectionError, Setting, SettingKind};
pub use selection::{Selection, SelectionAxis};
pub use server::{
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SERVER_COMMAND, DEFAULT_TCP_HOST, DEFAULT_TCP_PORT,
    ServerConfig, ServerConfigError, Transport,
};
pub use value::{SettingValue, ValueError};
pub use values::{GroupValues, Project, SettingsValues};
