//! Error types for the protocol layer.
//!
//! Every variant here is a decode-side failure of some codec. The session
//! layer treats all of them as a malformed message: the offending line is
//! logged and dropped, and only becomes fatal while a handshake is pending.

/// Errors that can occur while framing or parsing messages and payloads.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// A wire line could not be split into a known kind and a payload.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The structured-data parser rejected its input.
    ///
    /// `offset` is the byte position where parsing stopped.
    #[error("parse error at byte {offset}: {reason}")]
    Parse { offset: usize, reason: String },

    /// The payload parsed, but a field is missing or has the wrong shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A typed payload was requested from a message of a different kind.
    #[error("expected {expected} payload, got {actual}")]
    UnexpectedKind {
        expected: &'static str,
        actual: &'static str,
    },
}

impl ProtocolError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::InvalidPayload(format!("missing field `{field}`"))
    }

    pub(crate) fn wrong_type(field: &str, expected: &str) -> Self {
        Self::InvalidPayload(format!("field `{field}` is not {expected}"))
    }
}
