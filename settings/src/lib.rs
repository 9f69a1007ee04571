//! Settings synchronization for trellis.
//!
//! A [`Coordinator`] owns the server-declared [`Schema`](trellis_types::Schema)
//! and a [`ValueStore`] of loaded values plus pending edits. It decides when
//! values are requested, persisted, or discarded, and guards selection
//! switches that would lose edits behind a [`ConfirmPrompt`].

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod coordinator;
mod message;
mod prompt;
mod store;

pub use coordinator::{
    Coordinator, CoordinatorState, SchemaSnapshot, SettingsError, SwitchOutcome,
};
pub use message::{InboundMessage, LoadRequest, OutboundMessage, SetValues, SettingsChannel};
pub use prompt::{ConfirmChoice, ConfirmPrompt, PendingSwitch, Prompter};
pub use store::{StoreStatus, ValueStore};
