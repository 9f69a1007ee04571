//! Language-server client for the Beef settings, build, and run commands.

pub mod codec;
pub mod types;

mod bridge;
mod client;
pub(crate) mod protocol;
pub(crate) mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{BridgeEvent, SettingsBridge, SettingsView, resolve_project};
pub use client::LspClient;
pub use protocol::PathToUriError;
pub use types::{ClientStatus, LspEvent, RequestError, ServerStopReason};
