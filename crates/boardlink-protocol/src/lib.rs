//! Wire protocol for Boardlink.
//!
//! This crate defines the "language" host and remotes speak:
//!
//! - **Types** ([`Message`], [`MessageKind`], [`ParticipantId`]) — one
//!   discrete message and its closed set of kinds.
//! - **Framing** ([`frame`]) — a message as one line of text:
//!   `KIND|base64(payload)`.
//! - **Structured data** ([`value`]) — a small JSON value model with a
//!   strict recursive-descent parser, used for snapshots and dialog sync.
//! - **Flat fields** ([`kv`]) — the escaped `key=value` form used by lobby
//!   and dialog payloads.
//! - **Payloads** ([`PlayerAction`], [`SlotRequest`], [`LobbyStateView`],
//!   ...) — typed views implementing [`WirePayload`].
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (lines) → Protocol (Message, payloads) → Session (lifecycle)
//! ```
//!
//! Nothing here touches sockets or tasks; every function is pure.

pub mod frame;
pub mod kv;
pub mod value;

mod error;
mod payload;
mod types;

pub use error::ProtocolError;
pub use kv::KvMap;
pub use payload::{
    DialogAction, DialogChoice, DialogCommand, DialogKind, DialogResponse,
    DialogSync, DialogView, LobbyStateView, LogEntry, PlayerAction,
    ReadyStatus, SlotAssignment, SlotRequest, SlotStatus, SlotView,
};
pub use types::{Message, MessageKind, ParticipantId, WirePayload};
pub use value::{Object, Value};
