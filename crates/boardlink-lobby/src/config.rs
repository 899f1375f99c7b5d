//! Lobby configuration and phase machine.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Configuration for a lobby.
///
/// The seat count is fixed for the lobby's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Number of seats.
    pub max_players: usize,

    /// Display names longer than this many characters are truncated.
    pub name_max_chars: usize,

    /// Seat `i` is labelled `"{label_prefix} {i + 1}"`.
    pub label_prefix: String,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            max_players: 4,
            name_max_chars: 16,
            label_prefix: "Player".to_string(),
        }
    }
}

impl LobbyConfig {
    /// Default label of seat `index`.
    pub fn label_for(&self, index: usize) -> String {
        format!("{} {}", self.label_prefix, index + 1)
    }
}

// ---------------------------------------------------------------------------
// LobbyPhase
// ---------------------------------------------------------------------------

/// Whether the lobby is still seating players.
///
/// ```text
/// Waiting → InProgress → Waiting → ...
/// ```
///
/// - **Waiting**: seats can be claimed, released, and readied.
/// - **InProgress**: the game has started. Seat requests are denied;
///   disconnects still free seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyPhase {
    Waiting,
    InProgress,
}

impl LobbyPhase {
    /// Returns `true` if seat requests are accepted.
    pub fn accepts_requests(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    pub fn next(self) -> Self {
        match self {
            Self::Waiting => Self::InProgress,
            Self::InProgress => Self::Waiting,
        }
    }

    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == target
    }
}

impl std::fmt::Display for LobbyPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::InProgress => write!(f, "InProgress"),
        }
    }
}
