//! Error types for the link layer.
//!
//! Every variant's `Display` doubles as the human-readable disconnect
//! reason shown to users.

use boardlink_protocol::ProtocolError;
use boardlink_transport::TransportError;

use crate::Side;

/// Why a link failed to open, or why it closed.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The peer sent something the current state does not allow.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A line could not be decoded while handshaking.
    #[error("malformed handshake: {0}")]
    Malformed(#[from] ProtocolError),

    /// The host refused the handshake. Carries the host's reason verbatim.
    #[error("{0}")]
    HandshakeRejected(String),

    /// No handshake reply arrived in time.
    #[error("handshake timeout")]
    HandshakeTimeout,

    /// Nothing was received from the peer within the read timeout.
    #[error("no response from {0}")]
    LivenessTimeout(Side),

    /// The peer stopped reading: the outgoing queue overflowed or a write
    /// stalled past the read timeout.
    #[error("{0} stopped reading")]
    SendStalled(Side),

    /// The underlying stream failed.
    #[error("connection lost: {0}")]
    Transport(#[from] TransportError),

    /// The peer closed the stream.
    #[error("connection closed by peer")]
    PeerClosed,

    /// This side asked to disconnect.
    #[error("disconnected")]
    LocalClose,

    /// The link is already closed.
    #[error("link is closed")]
    Closed,
}
