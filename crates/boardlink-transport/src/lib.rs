//! Transport abstraction layer for Boardlink.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! a reliable, ordered byte stream carrying one message per line. The
//! framing above this layer guarantees that a line never contains an
//! embedded terminator; the transport only moves whole lines.
//!
//! # Feature Flags
//!
//! - `tcp` (default) — newline-delimited TCP via `tokio::net`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "tcp")]
mod tcp;

pub use error::TransportError;
#[cfg(feature = "tcp")]
pub use tcp::{LineConnection, LineTransport, MAX_LINE_LEN};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next incoming connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Returns the address this transport is listening on.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// A single connection that exchanges newline-terminated lines of text.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one line to the remote peer. The terminator is appended by
    /// the transport; `line` itself must not contain `\n` or `\r`.
    async fn send_line(&self, line: &str) -> Result<(), Self::Error>;

    /// Receives the next line from the remote peer, without its terminator.
    ///
    /// Returns `Ok(None)` when the peer closed the stream. A line that is
    /// not valid UTF-8 is consumed and reported as an error; the caller
    /// may keep reading after it (see [`TransportError::is_recoverable`]).
    async fn recv_line(&self) -> Result<Option<String>, Self::Error>;

    /// Closes the write side of the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the address of the remote peer.
    fn peer_addr(&self) -> SocketAddr;
}
