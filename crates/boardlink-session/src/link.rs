//! An active link: a reader task, a writer task, a heartbeat task and a
//! cloneable handle.
//!
//! All three tasks and every [`LinkHandle`] clone share the same [`Shared`]
//! record. Whoever first fires its teardown latch closes the transport and
//! emits the single [`LinkEvent::Closed`].
//!
//! Outgoing lines go through a bounded queue drained by the writer task, so
//! a peer that stops reading never blocks a sender. It is torn down when its
//! queue overflows or a single write stalls past the read timeout.

use std::sync::Arc;

use boardlink_protocol::{Message, MessageKind, ParticipantId};
use boardlink_transport::{Connection, ConnectionId, LineConnection};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::heartbeat::{Liveness, heartbeat_ticker};
use crate::state::StateCell;
use crate::{LinkError, LinkState, Side, SyncConfig, Teardown};

/// What a link reports to its owner.
#[derive(Debug)]
pub enum LinkEvent {
    /// A non-control message arrived. Heartbeats never surface here.
    Message {
        peer: ParticipantId,
        message: Message,
    },
    /// The link closed. Sent exactly once per link.
    Closed {
        peer: ParticipantId,
        error: LinkError,
    },
}

/// Where links deliver their events. One channel can serve many links.
pub type EventSender = mpsc::UnboundedSender<LinkEvent>;

enum Outbound {
    Line(String),
    /// Acknowledged once every line queued before it has been written.
    Flush(oneshot::Sender<()>),
}

struct Shared {
    conn: LineConnection,
    peer: ParticipantId,
    side: Side,
    config: SyncConfig,
    state: StateCell,
    teardown: Teardown,
    liveness: Liveness,
    outbound: mpsc::Sender<Outbound>,
    events: EventSender,
}

impl Shared {
    /// Queues a line for the writer task without waiting on the socket.
    async fn enqueue(&self, item: Outbound) -> Result<(), LinkError> {
        if self.teardown.is_triggered() {
            return Err(LinkError::Closed);
        }
        match self.outbound.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    peer = %self.peer,
                    capacity = self.config.send_queue,
                    "send queue full"
                );
                self.shutdown(LinkError::SendStalled(self.side.peer())).await;
                Err(LinkError::Closed)
            }
            Err(TrySendError::Closed(_)) => Err(LinkError::Closed),
        }
    }

    /// Closes the link once. Later calls return immediately.
    async fn shutdown(&self, error: LinkError) {
        if !self.teardown.trigger() {
            return;
        }
        self.state.advance(LinkState::Closed);

        match &error {
            LinkError::LocalClose => {
                tracing::info!(peer = %self.peer, "link closed locally");
            }
            other => {
                tracing::info!(peer = %self.peer, reason = %other, "link closed");
            }
        }

        // A writer stuck on a peer that stopped reading must not hold
        // teardown forever.
        let close = self.conn.close();
        if let Ok(Err(e)) =
            tokio::time::timeout(self.config.heartbeat_interval, close).await
        {
            tracing::debug!(peer = %self.peer, error = %e, "close failed");
        }

        let _ = self.events.send(LinkEvent::Closed {
            peer: self.peer.clone(),
            error,
        });
    }
}

/// Cheap, cloneable handle to an active link.
#[derive(Clone)]
pub struct LinkHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkHandle")
            .field("peer", &self.shared.peer)
            .field("side", &self.shared.side)
            .field("state", &self.shared.state.get())
            .finish()
    }
}

impl LinkHandle {
    /// Starts the reader, writer and heartbeat tasks for a link whose
    /// handshake has completed.
    pub(crate) fn spawn(
        conn: LineConnection,
        side: Side,
        config: SyncConfig,
        state: StateCell,
        events: EventSender,
    ) -> Self {
        state.advance(LinkState::Active);
        let (outbound, queue) = mpsc::channel(config.send_queue.max(1));
        let shared = Arc::new(Shared {
            peer: ParticipantId::from_addr(conn.peer_addr()),
            liveness: Liveness::new(config.read_timeout),
            conn,
            side,
            config,
            state,
            teardown: Teardown::new(),
            outbound,
            events,
        });
        tokio::spawn(read_loop(Arc::clone(&shared)));
        tokio::spawn(write_loop(Arc::clone(&shared), queue));
        tokio::spawn(heartbeat_loop(Arc::clone(&shared)));
        Self { shared }
    }

    /// Queues one message for sending. Never waits on the peer.
    ///
    /// # Errors
    /// [`LinkError::Closed`] if the link is closed or its send queue is
    /// full; a full queue also tears the link down.
    pub async fn send(&self, message: &Message) -> Result<(), LinkError> {
        tracing::trace!(peer = %self.shared.peer, kind = %message.kind, "send");
        self.shared.enqueue(Outbound::Line(message.to_line())).await
    }

    /// Disconnects. Safe to call any number of times from any task.
    ///
    /// Messages already queued get up to one heartbeat interval to go out
    /// before the connection is closed.
    pub async fn close(&self) {
        let (done, flushed) = oneshot::channel();
        if self.shared.outbound.try_send(Outbound::Flush(done)).is_ok() {
            let _ = tokio::time::timeout(self.shared.config.heartbeat_interval, flushed)
                .await;
        }
        self.shared.shutdown(LinkError::LocalClose).await;
    }

    /// Completes once the link has closed, for whatever reason.
    pub async fn closed(&self) {
        self.shared.teardown.cancelled().await;
    }

    pub fn is_open(&self) -> bool {
        !self.shared.teardown.is_triggered()
    }

    pub fn state(&self) -> LinkState {
        self.shared.state.get()
    }

    pub fn peer(&self) -> &ParticipantId {
        &self.shared.peer
    }

    pub fn side(&self) -> Side {
        self.shared.side
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.shared.conn.id()
    }
}

/// Reads lines until EOF, a read error, or teardown.
async fn read_loop(shared: Arc<Shared>) {
    loop {
        let line = tokio::select! {
            _ = shared.teardown.cancelled() => return,
            line = shared.conn.recv_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                shared.shutdown(LinkError::PeerClosed).await;
                return;
            }
            Err(e) if e.is_recoverable() => {
                shared.liveness.touch();
                tracing::debug!(
                    peer = %shared.peer,
                    error = %e,
                    "dropping unreadable line"
                );
                continue;
            }
            Err(e) => {
                shared.shutdown(LinkError::Transport(e)).await;
                return;
            }
        };
        shared.liveness.touch();

        let message = match Message::from_line(&line) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(
                    peer = %shared.peer,
                    error = %e,
                    "dropping malformed line"
                );
                continue;
            }
        };

        match message.kind {
            MessageKind::Heartbeat => {
                tracing::trace!(peer = %shared.peer, "heartbeat");
            }
            kind if kind.is_control() => {
                tracing::debug!(
                    peer = %shared.peer,
                    kind = %message.kind,
                    "ignoring handshake message on active link"
                );
            }
            _ => {
                let event = LinkEvent::Message {
                    peer: shared.peer.clone(),
                    message,
                };
                if shared.events.send(event).is_err() {
                    // Nobody is listening any more.
                    shared.shutdown(LinkError::LocalClose).await;
                    return;
                }
            }
        }
    }
}

/// Drains the send queue onto the socket, one line at a time.
async fn write_loop(shared: Arc<Shared>, mut queue: mpsc::Receiver<Outbound>) {
    loop {
        let item = tokio::select! {
            _ = shared.teardown.cancelled() => return,
            item = queue.recv() => item,
        };
        let line = match item {
            Some(Outbound::Line(line)) => line,
            Some(Outbound::Flush(done)) => {
                let _ = done.send(());
                continue;
            }
            None => return,
        };

        let write = tokio::time::timeout(
            shared.config.read_timeout,
            shared.conn.send_line(&line),
        );
        let written = tokio::select! {
            _ = shared.teardown.cancelled() => return,
            written = write => written,
        };
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                shared.shutdown(LinkError::Transport(e)).await;
                return;
            }
            Err(_) => {
                shared.shutdown(LinkError::SendStalled(shared.side.peer())).await;
                return;
            }
        }
    }
}

/// Queues heartbeats and enforces the read timeout.
async fn heartbeat_loop(shared: Arc<Shared>) {
    let beat = Message::heartbeat().to_line();
    let mut ticker = heartbeat_ticker(&shared.config);
    loop {
        let deadline = shared.liveness.deadline();
        tokio::select! {
            _ = shared.teardown.cancelled() => return,
            _ = tokio::time::sleep_until(deadline) => {
                if shared.liveness.is_expired() {
                    let error = LinkError::LivenessTimeout(shared.side.peer());
                    shared.shutdown(error).await;
                    return;
                }
            }
            _ = ticker.tick() => {
                if shared.enqueue(Outbound::Line(beat.clone())).await.is_err() {
                    return;
                }
            }
        }
    }
}
