//! Error types for the lobby layer.

use crate::LobbyPhase;

/// Reasons a lobby phase change can be refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// No seat is taken, so there is nobody to start a game with.
    #[error("no seats are taken")]
    NoPlayers,

    /// At least one seated participant has not readied up.
    #[error("{0} seated player(s) not ready")]
    NotAllReady(usize),

    /// The lobby is already in the requested phase.
    #[error("lobby is already {0}")]
    InvalidPhase(LobbyPhase),
}
