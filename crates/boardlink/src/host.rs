//! `Host` builder, accept loop and control handle.
//!
//! This is the entry point for running the authoritative side of a game.
//! It ties the layers together: transport → session → orchestration.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use boardlink_lobby::{Lobby, LobbyConfig};
use boardlink_protocol::{DialogCommand, LobbyStateView};
use boardlink_session::{EventSender, LinkEvent, SyncConfig, Teardown};
use boardlink_transport::{LineTransport, Transport};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::handler::{HostActor, HostCommand, HostEvent};
use crate::{BoardlinkError, HostConfig, RulesEngine};

/// Capacity of the host event broadcast channel.
const EVENT_CAPACITY: usize = 256;

/// Builder for configuring and starting a host.
///
/// # Example
///
/// ```rust,ignore
/// use boardlink::prelude::*;
///
/// let host = HostBuilder::new()
///     .bind("0.0.0.0:5555")
///     .build(MyRules::default())
///     .await?;
/// let handle = host.handle();
/// tokio::spawn(host.run());
/// ```
pub struct HostBuilder {
    config: HostConfig,
}

impl HostBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: HostConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to listen on.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the handshake, heartbeat and timeout settings.
    pub fn sync_config(mut self, sync: SyncConfig) -> Self {
        self.config.sync = sync;
        self
    }

    /// Sets the lobby settings.
    pub fn lobby_config(mut self, lobby: LobbyConfig) -> Self {
        self.config.lobby = lobby;
        self
    }

    /// Binds the listener and starts the orchestration task.
    ///
    /// Connections are not accepted until [`Host::run`] is awaited.
    pub async fn build<R: RulesEngine>(self, rules: R) -> Result<Host<R>, BoardlinkError> {
        let HostConfig {
            bind_addr,
            sync,
            lobby,
            command_buffer,
        } = self.config;
        let sync = sync.validated();
        let transport = LineTransport::bind(&bind_addr).await?;

        let lobby = Arc::new(Lobby::new(lobby));
        let (cmd_tx, cmd_rx) = mpsc::channel(command_buffer.max(1));
        let (link_tx, link_rx) = mpsc::unbounded_channel::<LinkEvent>();
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = HostActor {
            rules,
            lobby: Arc::clone(&lobby),
            links: HashMap::new(),
            open_dialog: None,
            pending: HashMap::new(),
            commands: cmd_rx,
            link_events: link_rx,
            events: event_tx.clone(),
        };
        tokio::spawn(actor.run());

        let handle = HostHandle {
            commands: cmd_tx,
            lobby,
            events: event_tx,
            stop: Arc::new(Teardown::new()),
        };
        Ok(Host {
            transport,
            sync,
            link_events: link_tx,
            handle,
        })
    }
}

impl Default for HostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound host, ready to accept remotes.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct Host<R: RulesEngine> {
    transport: LineTransport,
    sync: SyncConfig,
    link_events: EventSender,
    handle: HostHandle<R>,
}

impl<R: RulesEngine> Host<R> {
    /// Returns the local address the host is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle for driving the host from game code.
    pub fn handle(&self) -> HostHandle<R> {
        self.handle.clone()
    }

    /// Runs the accept loop until [`HostHandle::shutdown`] is called.
    ///
    /// Each accepted connection is handshaken on its own task, so a slow
    /// or silent remote never blocks the next accept.
    pub async fn run(mut self) -> Result<(), BoardlinkError> {
        tracing::info!("host running");
        let stop = Arc::clone(&self.handle.stop);

        loop {
            let accepted = tokio::select! {
                _ = stop.cancelled() => break,
                accepted = self.transport.accept() => accepted,
            };
            match accepted {
                Ok(conn) => {
                    let sync = self.sync.clone();
                    let events = self.link_events.clone();
                    let commands = self.handle.commands.clone();
                    tokio::spawn(async move {
                        match boardlink_session::accept(conn, &sync, events).await {
                            Ok(link) => {
                                if commands.send(HostCommand::Joined(link.clone())).await.is_err() {
                                    link.close().await;
                                }
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }

        tracing::info!("host accept loop stopped");
        Ok(())
    }
}

/// Cloneable control surface for a running host.
///
/// Every call is forwarded to the orchestration task, so calls from
/// several tasks are applied one at a time in arrival order.
pub struct HostHandle<R: RulesEngine> {
    commands: mpsc::Sender<HostCommand<R>>,
    lobby: Arc<Lobby>,
    events: broadcast::Sender<HostEvent>,
    stop: Arc<Teardown>,
}

impl<R: RulesEngine> Clone for HostHandle<R> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            lobby: Arc::clone(&self.lobby),
            events: self.events.clone(),
            stop: Arc::clone(&self.stop),
        }
    }
}

impl<R: RulesEngine> HostHandle<R> {
    async fn send(&self, cmd: HostCommand<R>) -> Result<(), BoardlinkError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| BoardlinkError::HostStopped)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> HostCommand<R>,
    ) -> Result<T, BoardlinkError> {
        let (tx, rx) = oneshot::channel();
        self.send(make(tx)).await?;
        rx.await.map_err(|_| BoardlinkError::HostStopped)
    }

    /// Receives host events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    /// Captures the engine's state and sends it to every remote.
    pub async fn broadcast_snapshot(&self) -> Result<(), BoardlinkError> {
        self.send(HostCommand::BroadcastSnapshot).await
    }

    /// Sends a free-text log line to every remote.
    pub async fn broadcast_log(&self, text: impl Into<String>) -> Result<(), BoardlinkError> {
        self.send(HostCommand::BroadcastLog(text.into())).await
    }

    /// Runs `update` against the engine on the orchestration task.
    ///
    /// If it returns `true` a fresh snapshot goes out before this returns.
    pub async fn update<F>(&self, update: F) -> Result<bool, BoardlinkError>
    where
        F: FnOnce(&mut R) -> bool + Send + 'static,
    {
        self.request(|reply| HostCommand::Update {
            update: Box::new(update),
            reply,
        })
        .await
    }

    /// Sends a dialog command to the participant in `seat`.
    ///
    /// Everyone else learns about it through a dialog sync.
    pub async fn open_dialog(
        &self,
        seat: usize,
        command: DialogCommand,
    ) -> Result<(), BoardlinkError> {
        self.request(|reply| HostCommand::OpenDialog {
            seat,
            command,
            reply,
        })
        .await?
    }

    /// Closes whatever dialog is open.
    pub async fn close_dialog(&self) -> Result<(), BoardlinkError> {
        self.send(HostCommand::CloseDialog).await
    }

    /// Moves the lobby to in-progress and broadcasts the opening state.
    pub async fn start_game(&self) -> Result<(), BoardlinkError> {
        self.request(|reply| HostCommand::StartGame { reply })
            .await?
            .map_err(BoardlinkError::from)
    }

    /// Returns the lobby to waiting.
    pub async fn end_game(&self) -> Result<(), BoardlinkError> {
        self.request(|reply| HostCommand::EndGame { reply })
            .await?
            .map_err(BoardlinkError::from)
    }

    /// Frees a seat without closing its occupant's link.
    pub async fn evict(&self, seat: usize) -> Result<bool, BoardlinkError> {
        self.request(|reply| HostCommand::Evict { seat, reply }).await
    }

    /// Number of handshaken remotes.
    pub async fn participant_count(&self) -> Result<usize, BoardlinkError> {
        self.request(|reply| HostCommand::ParticipantCount { reply })
            .await
    }

    /// What the lobby looks like right now.
    pub fn lobby_view(&self) -> LobbyStateView {
        self.lobby.to_view()
    }

    /// Stops accepting, closes every link and stops orchestration.
    pub async fn shutdown(&self) {
        if self.stop.trigger() {
            tracing::info!("host shutting down");
        }
        let _ = self.commands.send(HostCommand::Shutdown).await;
    }
}
