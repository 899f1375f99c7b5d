//! Core protocol types: message kinds, the message value, and participant
//! identity.
//!
//! A [`Message`] is what travels on one wire line. Its payload is an opaque
//! string at this level; each kind has its own payload grammar, and the
//! typed views over those grammars implement [`WirePayload`].

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable, opaque identifier of a connected participant, derived by the
/// host from the peer's socket address.
///
/// It is only meaningful on the host. It never appears in a payload sent
/// to other participants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Derives the identifier for a peer address.
    pub fn from_addr(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }

    /// Wraps an arbitrary identifier (used by tests and in-process hosts).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The closed set of message kinds understood on the wire.
///
/// The wire name (`HELLO`, `STATE_SNAPSHOT`, ...) is the first segment of
/// every line; an unknown name makes the whole line malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    // -- Handshake --
    Hello,
    Welcome,
    Reject,

    // -- Liveness --
    Heartbeat,

    // -- State transport --
    StateSnapshot,
    LogEntry,

    // -- Remote input --
    PlayerAction,

    // -- Lobby --
    LobbyState,
    SlotRequest,
    SlotAssignment,
    ReadyStatus,

    // -- Modal dialog sync --
    DialogSync,
    DialogCommand,
    DialogResponse,
}

impl MessageKind {
    /// Every kind, in wire-table order.
    pub const ALL: [MessageKind; 14] = [
        Self::Hello,
        Self::Welcome,
        Self::Reject,
        Self::Heartbeat,
        Self::StateSnapshot,
        Self::LogEntry,
        Self::PlayerAction,
        Self::LobbyState,
        Self::SlotRequest,
        Self::SlotAssignment,
        Self::ReadyStatus,
        Self::DialogSync,
        Self::DialogCommand,
        Self::DialogResponse,
    ];

    /// The name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hello => "HELLO",
            Self::Welcome => "WELCOME",
            Self::Reject => "REJECT",
            Self::Heartbeat => "HEARTBEAT",
            Self::StateSnapshot => "STATE_SNAPSHOT",
            Self::LogEntry => "LOG_ENTRY",
            Self::PlayerAction => "PLAYER_ACTION",
            Self::LobbyState => "LOBBY_STATE",
            Self::SlotRequest => "SLOT_REQUEST",
            Self::SlotAssignment => "SLOT_ASSIGNMENT",
            Self::ReadyStatus => "READY_STATUS",
            Self::DialogSync => "DIALOG_SYNC",
            Self::DialogCommand => "DIALOG_COMMAND",
            Self::DialogResponse => "DIALOG_RESPONSE",
        }
    }

    /// Returns `true` for the handshake and liveness kinds, which are
    /// handled by the connection lifecycle rather than the orchestration
    /// layer.
    pub fn is_control(self) -> bool {
        matches!(
            self,
            Self::Hello | Self::Welcome | Self::Reject | Self::Heartbeat
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                ProtocolError::MalformedMessage(format!(
                    "unknown message kind `{s}`"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One discrete message: a kind plus an optional, kind-specific payload.
///
/// Constructed per send/receive event and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub payload: Option<String>,
}

impl Message {
    /// A message with no payload.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    /// A message carrying `payload`.
    pub fn with_payload(kind: MessageKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: Some(payload.into()),
        }
    }

    pub fn hello(version: &str) -> Self {
        Self::with_payload(MessageKind::Hello, version)
    }

    pub fn welcome(version: &str) -> Self {
        Self::with_payload(MessageKind::Welcome, version)
    }

    pub fn reject(reason: &str) -> Self {
        Self::with_payload(MessageKind::Reject, reason)
    }

    pub fn heartbeat() -> Self {
        Self::new(MessageKind::Heartbeat)
    }

    pub fn log_entry(text: &str) -> Self {
        Self::with_payload(MessageKind::LogEntry, text)
    }

    /// The payload text, or `""` when absent.
    pub fn payload_str(&self) -> &str {
        self.payload.as_deref().unwrap_or("")
    }

    /// Parses the payload as the typed view `P`.
    ///
    /// # Errors
    /// [`ProtocolError::UnexpectedKind`] if the message is not of kind
    /// `P::KIND`, or the payload's own decode error.
    pub fn decode_payload<P: WirePayload>(&self) -> Result<P, ProtocolError> {
        if self.kind != P::KIND {
            return Err(ProtocolError::UnexpectedKind {
                expected: P::KIND.as_str(),
                actual: self.kind.as_str(),
            });
        }
        P::decode_payload(self.payload_str())
    }
}

/// A typed payload bound to exactly one [`MessageKind`].
pub trait WirePayload: Sized {
    /// The kind this payload travels under.
    const KIND: MessageKind;

    /// Renders the payload string.
    fn encode_payload(&self) -> String;

    /// Parses the payload string.
    fn decode_payload(payload: &str) -> Result<Self, ProtocolError>;

    /// Wraps the encoded payload in a [`Message`] of kind [`Self::KIND`].
    fn to_message(&self) -> Message {
        Message::with_payload(Self::KIND, self.encode_payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in MessageKind::ALL {
            assert_eq!(kind.as_str().parse::<MessageKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let err = "TELEPORT".parse::<MessageKind>().unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage(_)));
    }

    #[test]
    fn test_kind_names_are_case_sensitive() {
        assert!("hello".parse::<MessageKind>().is_err());
    }

    #[test]
    fn test_control_kinds() {
        assert!(MessageKind::Hello.is_control());
        assert!(MessageKind::Heartbeat.is_control());
        assert!(!MessageKind::StateSnapshot.is_control());
        assert!(!MessageKind::SlotRequest.is_control());
    }

    #[test]
    fn test_participant_id_from_addr() {
        let addr: SocketAddr = "10.0.0.7:4100".parse().unwrap();
        let id = ParticipantId::from_addr(addr);
        assert_eq!(id.as_str(), "10.0.0.7:4100");
        assert_eq!(id.to_string(), "peer-10.0.0.7:4100");
        assert_eq!(id, ParticipantId::from_addr(addr));
    }

    #[test]
    fn test_decode_payload_checks_kind() {
        let msg = Message::heartbeat();
        let err = msg
            .decode_payload::<crate::ReadyStatus>()
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnexpectedKind {
                expected: "READY_STATUS",
                actual: "HEARTBEAT",
            }
        );
    }
}
