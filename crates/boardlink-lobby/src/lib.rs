//! Lobby seat allocation for Boardlink.
//!
//! Before the game proper starts, connected participants claim numbered
//! seats and flag themselves ready. The host starts the game once every
//! taken seat is ready.
//!
//! # Key types
//!
//! - [`Lobby`] — the seat table, one mutex around every operation
//! - [`LobbyConfig`] — seat count, name length, label prefix
//! - [`LobbyPhase`] — waiting for players vs. game in progress

mod config;
mod error;
mod lobby;

pub use config::{LobbyConfig, LobbyPhase};
pub use error::LobbyError;
pub use lobby::Lobby;
