//! Full-state snapshot replication for Boardlink.
//!
//! - [`Snapshot`] — the immutable value the host broadcasts after every
//!   state change, and its JSON mapping (via the protocol crate's
//!   hand-rolled [`Value`](boardlink_protocol::Value) codec).
//! - [`SnapshotSource`] / [`MirrorTarget`] / [`apply`] — the seams to the
//!   rules engine on the host and the local model on a remote.
//! - [`DiceTracker`] / [`SnapshotMirror`] — turns the roll sequence counter
//!   into "animate" or "draw static" decisions.
//!
//! The snapshot is whole-state and idempotent, so a remote may skip any
//! number of intermediate snapshots and render only the latest.

mod dice;
mod mirror;
mod model;

pub use dice::{DiceRender, DiceTracker, SnapshotMirror};
pub use mirror::{MirrorTarget, MirroredBoard, SnapshotSource, apply};
pub use model::{
    ButtonStates, CitySnapshot, MAX_CITY_LEVEL, PlayerSnapshot, Snapshot,
    TouristSpotSnapshot,
};
