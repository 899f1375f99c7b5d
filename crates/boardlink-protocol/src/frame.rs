//! Line framing: one [`Message`] per line of text.
//!
//! ```text
//! <KIND>|<base64(payload bytes) or empty>
//! ```
//!
//! Base64 keeps arbitrary payload text (newlines, pipes, non-ASCII) off the
//! line structure. Decoding accepts one legacy form: a payload segment that
//! is not valid base64, or does not decode to UTF-8, is taken verbatim.
//! Older peers sent payloads unencoded, and they still interoperate through
//! that path.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::{Message, MessageKind, ProtocolError};

/// Separates the kind name from the payload segment.
pub const SEPARATOR: char = '|';

/// Renders `message` as a single wire line (without terminator).
pub fn encode(message: &Message) -> String {
    let mut line = String::from(message.kind.as_str());
    line.push(SEPARATOR);
    if let Some(payload) = &message.payload {
        STANDARD.encode_string(payload.as_bytes(), &mut line);
    }
    line
}

/// Parses a wire line back into a [`Message`].
///
/// # Errors
/// [`ProtocolError::MalformedMessage`] when the separator is missing or the
/// kind name is unknown. A bad payload segment is never an error; see the
/// module docs.
pub fn decode(line: &str) -> Result<Message, ProtocolError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (name, segment) = line.split_once(SEPARATOR).ok_or_else(|| {
        ProtocolError::MalformedMessage(format!(
            "missing `{SEPARATOR}` separator"
        ))
    })?;
    let kind: MessageKind = name.parse()?;

    let payload = if segment.is_empty() {
        None
    } else {
        Some(decode_segment(segment))
    };
    Ok(Message { kind, payload })
}

fn decode_segment(segment: &str) -> String {
    match STANDARD.decode(segment) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => segment.to_string(),
        },
        Err(_) => segment.to_string(),
    }
}

impl Message {
    /// Shorthand for [`encode`].
    pub fn to_line(&self) -> String {
        encode(self)
    }

    /// Shorthand for [`decode`].
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        decode(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_encodes_version_as_base64() {
        assert_eq!(encode(&Message::hello("1")), "HELLO|MQ==");
    }

    #[test]
    fn test_raw_hello_line_decodes() {
        let msg = decode("HELLO|MQ==").unwrap();
        assert_eq!(msg.kind, MessageKind::Hello);
        assert_eq!(msg.payload.as_deref(), Some("1"));
    }

    #[test]
    fn test_absent_payload_has_empty_segment() {
        assert_eq!(encode(&Message::heartbeat()), "HEARTBEAT|");
        let msg = decode("HEARTBEAT|").unwrap();
        assert_eq!(msg, Message::heartbeat());
    }

    #[test]
    fn test_round_trip_awkward_payloads() {
        let payloads = [
            "plain",
            "line one\nline two\r\n",
            "pipes|inside|payload",
            "key=value\nname=\\e",
            "서울 → 부산 🎲",
            "",
        ];
        for kind in [MessageKind::LogEntry, MessageKind::SlotRequest] {
            for p in payloads {
                let msg = Message::with_payload(kind, p);
                let line = encode(&msg);
                assert!(!line.contains('\n'), "line must stay single: {line}");
                assert!(!line.contains('\r'));
                let back = decode(&line).unwrap();
                if p.is_empty() {
                    // An empty payload is indistinguishable from none.
                    assert_eq!(back.payload, None);
                } else {
                    assert_eq!(back, msg);
                }
            }
        }
    }

    #[test]
    fn test_every_kind_round_trips_without_payload() {
        for kind in MessageKind::ALL {
            let msg = Message::new(kind);
            assert_eq!(decode(&encode(&msg)).unwrap(), msg);
        }
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let err = decode("TELEPORT|MQ==").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage(_)));
    }

    #[test]
    fn test_missing_separator_is_malformed() {
        let err = decode("HEARTBEAT").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedMessage(_)));
    }

    #[test]
    fn test_split_happens_on_first_separator_only() {
        // Legacy raw payload containing a pipe.
        let msg = decode("LOG_ENTRY|a|b").unwrap();
        assert_eq!(msg.kind, MessageKind::LogEntry);
        assert_eq!(msg.payload.as_deref(), Some("a|b"));
    }

    // Compatibility with peers that predate base64 payloads: the raw
    // segment is kept when it is not decodable.
    #[test]
    fn test_legacy_unencoded_payload_falls_back_to_raw() {
        let msg = decode("PLAYER_ACTION|tile-selected:12").unwrap();
        assert_eq!(msg.payload.as_deref(), Some("tile-selected:12"));

        let msg = decode("READY_STATUS|ready=true").unwrap();
        assert_eq!(msg.payload.as_deref(), Some("ready=true"));
    }

    #[test]
    fn test_legacy_fallback_when_bytes_are_not_utf8() {
        // "////" is valid base64 for 0xFF 0xFF 0xFF, which is not UTF-8.
        let msg = decode("LOG_ENTRY|////").unwrap();
        assert_eq!(msg.payload.as_deref(), Some("////"));
    }

    #[test]
    fn test_trailing_terminator_is_ignored() {
        let msg = decode("HELLO|MQ==\r\n").unwrap();
        assert_eq!(msg.payload.as_deref(), Some("1"));
    }
}
