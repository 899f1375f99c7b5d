//! Opening a link: the HELLO / WELCOME / REJECT exchange.
//!
//! The remote speaks first. The host answers `WELCOME` only to an exactly
//! matching, non-empty version; anything else gets `REJECT` and the
//! connection is closed without a `WELCOME` ever being sent.

use std::time::Duration;

use boardlink_protocol::{Message, MessageKind, ParticipantId};
use boardlink_transport::{Connection, LineConnection};

use crate::state::StateCell;
use crate::{EventSender, LinkError, LinkHandle, LinkState, Side, SyncConfig};

/// Host side: runs the handshake on a freshly accepted connection.
///
/// On success the link is `Active` and its tasks are running; the caller
/// announces the new participant. On failure the connection is closed.
pub async fn accept(
    conn: LineConnection,
    config: &SyncConfig,
    events: EventSender,
) -> Result<LinkHandle, LinkError> {
    let peer = ParticipantId::from_addr(conn.peer_addr());
    let state = StateCell::new(LinkState::Handshaking);
    tracing::debug!(%peer, state = %state.get(), "awaiting HELLO");

    match host_handshake(&conn, config).await {
        Ok(()) => {
            tracing::info!(%peer, "handshake complete");
            Ok(LinkHandle::spawn(conn, Side::Host, config.clone(), state, events))
        }
        Err(e) => {
            state.advance(LinkState::Closed);
            tracing::warn!(%peer, reason = %e, "handshake failed");
            let _ = conn.close().await;
            Err(e)
        }
    }
}

/// Remote side: connects to `addr` and handshakes with the host.
pub async fn connect(
    addr: &str,
    config: &SyncConfig,
    events: EventSender,
) -> Result<LinkHandle, LinkError> {
    let state = StateCell::new(LinkState::Connecting);
    tracing::debug!(addr, state = %state.get(), "connecting");
    let conn = LineConnection::connect(addr, config.connect_timeout).await?;
    let host = ParticipantId::from_addr(conn.peer_addr());
    state.advance(LinkState::Handshaking);

    match remote_handshake(&conn, config).await {
        Ok(()) => {
            tracing::info!(%host, "connected to host");
            Ok(LinkHandle::spawn(conn, Side::Remote, config.clone(), state, events))
        }
        Err(e) => {
            state.advance(LinkState::Closed);
            tracing::warn!(%host, reason = %e, "handshake failed");
            let _ = conn.close().await;
            Err(e)
        }
    }
}

async fn host_handshake(
    conn: &LineConnection,
    config: &SyncConfig,
) -> Result<(), LinkError> {
    let hello = recv_handshake(conn, config.handshake_timeout).await?;
    if hello.kind != MessageKind::Hello {
        return Err(LinkError::ProtocolViolation(format!(
            "expected HELLO, got {}",
            hello.kind
        )));
    }

    let version = hello.payload_str();
    let rejection = if version.is_empty() {
        Some("missing protocol version".to_string())
    } else if version != config.protocol_version {
        Some(format!(
            "version mismatch: host speaks {}, remote sent {version}",
            config.protocol_version
        ))
    } else {
        None
    };
    if let Some(reason) = rejection {
        conn.send_line(&Message::reject(&reason).to_line()).await?;
        return Err(LinkError::HandshakeRejected(reason));
    }

    conn.send_line(&Message::welcome(&config.protocol_version).to_line())
        .await?;
    Ok(())
}

async fn remote_handshake(
    conn: &LineConnection,
    config: &SyncConfig,
) -> Result<(), LinkError> {
    conn.send_line(&Message::hello(&config.protocol_version).to_line())
        .await?;
    tracing::debug!("HELLO sent");

    let reply = recv_handshake(conn, config.handshake_timeout).await?;
    match reply.kind {
        MessageKind::Welcome if reply.payload_str() == config.protocol_version => {
            Ok(())
        }
        MessageKind::Welcome => Err(LinkError::ProtocolViolation(format!(
            "host welcomed with version `{}`",
            reply.payload_str()
        ))),
        MessageKind::Reject => {
            let reason = match reply.payload_str() {
                "" => "rejected by host",
                reason => reason,
            };
            Err(LinkError::HandshakeRejected(reason.to_string()))
        }
        other => Err(LinkError::ProtocolViolation(format!(
            "expected WELCOME, got {other}"
        ))),
    }
}

/// Reads one message within `timeout`. Cancelling the read is safe here:
/// on any failure the connection is dropped. Unlike an active link, an
/// unreadable line is fatal.
async fn recv_handshake(
    conn: &LineConnection,
    timeout: Duration,
) -> Result<Message, LinkError> {
    let line = tokio::time::timeout(timeout, conn.recv_line())
        .await
        .map_err(|_| LinkError::HandshakeTimeout)??
        .ok_or(LinkError::PeerClosed)?;
    Ok(Message::from_line(&line)?)
}
