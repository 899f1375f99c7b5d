//! Newline-delimited TCP transport using `tokio::net`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Upper bound on a single incoming line (16 MB). A full snapshot of a
/// crowded board is a few kilobytes, so this only guards against a peer
/// that never sends a terminator.
pub const MAX_LINE_LEN: usize = 16 * 1024 * 1024;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// A TCP [`Transport`] that listens for incoming line connections.
pub struct LineTransport {
    listener: TcpListener,
}

impl LineTransport {
    /// Binds a new transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "line transport listening");
        Ok(Self { listener })
    }
}

impl Transport for LineTransport {
    type Connection = LineConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        let conn = LineConnection::from_stream(stream, addr);
        tracing::debug!(id = %conn.id, %addr, "accepted line connection");
        Ok(conn)
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single newline-delimited TCP connection.
///
/// The stream is split so a task blocked in [`recv_line`](Connection::recv_line)
/// never holds up writers (heartbeat timer, broadcasts).
pub struct LineConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
}

impl LineConnection {
    /// Opens an outbound connection, giving up after `timeout`.
    pub async fn connect(
        addr: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::ConnectTimeout(timeout))?
            .map_err(TransportError::ConnectFailed)?;
        let peer = stream.peer_addr().map_err(TransportError::ConnectFailed)?;
        let conn = Self::from_stream(stream, peer);
        tracing::debug!(id = %conn.id, %peer, "connected line connection");
        Ok(conn)
    }

    fn from_stream(stream: TcpStream, peer: SocketAddr) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }
        let (read, write) = stream.into_split();
        Self {
            id: ConnectionId::new(
                NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            ),
            peer,
            reader: Mutex::new(BufReader::new(read)),
            writer: Mutex::new(write),
        }
    }
}

impl Connection for LineConnection {
    type Error = TransportError;

    async fn send_line(&self, line: &str) -> Result<(), Self::Error> {
        if line.contains(['\n', '\r']) {
            return Err(TransportError::InvalidLine(
                "line contains an embedded terminator".into(),
            ));
        }
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&buf)
            .await
            .map_err(TransportError::SendFailed)?;
        writer.flush().await.map_err(TransportError::SendFailed)
    }

    async fn recv_line(&self) -> Result<Option<String>, Self::Error> {
        let mut reader = self.reader.lock().await;
        let mut buf = Vec::new();
        let n = (&mut *reader)
            .take(MAX_LINE_LEN as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            return Ok(None);
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        } else if buf.len() > MAX_LINE_LEN {
            return Err(TransportError::InvalidLine(format!(
                "line exceeds {MAX_LINE_LEN} bytes"
            )));
        }
        // A line without a terminator means the peer closed mid-line; hand
        // back what arrived. The terminator is consumed either way, so a
        // bad line never desyncs the next read.
        String::from_utf8(buf)
            .map(Some)
            .map_err(|e| TransportError::MalformedLine(e.utf8_error().to_string()))
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.writer
            .lock()
            .await
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
