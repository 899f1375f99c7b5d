//! Connection lifecycle for Boardlink.
//!
//! This crate turns a raw line connection into a *link*: a handshaken,
//! heartbeat-monitored channel that reports exactly one close.
//!
//! 1. **Handshake** — [`accept`] (host) and [`connect`] (remote) run the
//!    HELLO / WELCOME / REJECT exchange under [`SyncConfig`] timeouts.
//! 2. **Liveness** — each link beats every `heartbeat_interval` and is
//!    torn down after `read_timeout` of silence.
//! 3. **Teardown** — the [`Teardown`] latch makes concurrent close triggers
//!    collapse into one [`LinkEvent::Closed`].
//!
//! # How it fits in the stack
//!
//! ```text
//! Orchestration (above)  ← consumes LinkEvents, sends through LinkHandle
//!     ↕
//! Session Layer (this crate)  ← handshake, heartbeat, teardown
//!     ↕
//! Protocol + Transport (below)  ← Message framing, line TCP
//! ```

mod config;
mod error;
mod handshake;
mod heartbeat;
mod link;
mod state;
mod teardown;

pub use config::{PROTOCOL_VERSION, SyncConfig};
pub use error::LinkError;
pub use handshake::{accept, connect};
pub use link::{EventSender, LinkEvent, LinkHandle};
pub use state::{LinkState, Side};
pub use teardown::Teardown;
