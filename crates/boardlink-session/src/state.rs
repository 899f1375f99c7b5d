//! Link lifecycle state machine.

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Which end of a link this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Host,
    Remote,
}

impl Side {
    /// The other end.
    pub fn peer(self) -> Self {
        match self {
            Self::Host => Self::Remote,
            Self::Remote => Self::Host,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// The lifecycle state of one link.
///
/// ```text
/// Connecting → Handshaking → Active → Closed
///       └───────────┴───────────────────↗
/// ```
///
/// - **Connecting**: remote only; the TCP connection is being opened.
/// - **Handshaking**: `HELLO` sent (remote) or awaited (host).
/// - **Active**: handshake done; messages flow and heartbeats run.
/// - **Closed**: terminal. Reached from any state on any teardown trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Handshaking,
    Active,
    Closed,
}

impl LinkState {
    /// Returns `true` while the link can still carry messages.
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    /// The next state on the success path, or `None` from `Closed`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Connecting => Some(Self::Handshaking),
            Self::Handshaking => Some(Self::Active),
            Self::Active => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Returns `true` if moving to `target` is valid: one step forward on
    /// the success path, or straight to `Closed` from any open state.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (self.is_open() && target == Self::Closed)
    }
}

/// The current [`LinkState`] of one link, moved only along valid edges.
#[derive(Debug)]
pub(crate) struct StateCell {
    state: Mutex<LinkState>,
}

impl StateCell {
    pub(crate) fn new(initial: LinkState) -> Self {
        Self {
            state: Mutex::new(initial),
        }
    }

    pub(crate) fn get(&self) -> LinkState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `target` if that is a valid transition. Returns `false`
    /// and leaves the state alone otherwise.
    pub(crate) fn advance(&self, target: LinkState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.can_transition_to(target) {
            tracing::debug!(from = %*state, to = %target, "invalid link transition");
            return false;
        }
        tracing::trace!(from = %*state, to = %target, "link transition");
        *state = target;
        true
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Active => write!(f, "Active"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
