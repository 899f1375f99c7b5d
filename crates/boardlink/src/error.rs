//! Unified error type for Boardlink.

use boardlink_lobby::LobbyError;
use boardlink_protocol::ProtocolError;
use boardlink_session::LinkError;
use boardlink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BoardlinkError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A wire-format error (framing, codec, payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A link-level error (handshake, liveness, teardown).
    #[error(transparent)]
    Link(#[from] LinkError),

    /// A lobby phase change was refused.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// The seat has nobody in it.
    #[error("seat {0} is empty")]
    EmptySeat(usize),

    /// The host's orchestration task has stopped.
    #[error("host is shut down")]
    HostStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::InvalidLine("gone".into());
        let err: BoardlinkError = err.into();
        assert!(matches!(err, BoardlinkError::Transport(_)));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: BoardlinkError =
            ProtocolError::MalformedMessage("bad".into()).into();
        assert!(matches!(err, BoardlinkError::Protocol(_)));
    }

    #[test]
    fn test_link_error_keeps_disconnect_reason() {
        let err: BoardlinkError = LinkError::HandshakeTimeout.into();
        assert_eq!(err.to_string(), "handshake timeout");
    }

    #[test]
    fn test_from_lobby_error() {
        let err: BoardlinkError = LobbyError::NoPlayers.into();
        assert!(matches!(err, BoardlinkError::Lobby(_)));
    }
}
