//! The host's orchestration actor.
//!
//! One task owns the rules engine and the set of live links. Connection
//! tasks and [`HostHandle`](crate::HostHandle)s talk to it through a
//! channel, so every route, lobby update and broadcast happens in one
//! order and the engine never needs a lock.

use std::collections::HashMap;
use std::sync::Arc;

use boardlink_lobby::{Lobby, LobbyError};
use boardlink_protocol::{
    DialogAction, DialogCommand, DialogResponse, DialogSync, DialogView,
    Message, MessageKind, ParticipantId, PlayerAction, ReadyStatus,
    SlotRequest, SlotStatus, WirePayload,
};
use boardlink_session::{LinkError, LinkEvent, LinkHandle};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::{BoardlinkError, RulesEngine};

/// Something that happened on the host, for the host's own UI.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// A participant finished the handshake.
    Joined { participant: ParticipantId },
    /// A participant's link closed. `seat` is the seat it held.
    Left {
        participant: ParticipantId,
        seat: Option<usize>,
        reason: String,
    },
    /// A seated participant's action reached the rules engine.
    Action {
        participant: ParticipantId,
        seat: usize,
        action: PlayerAction,
        changed: bool,
    },
    /// A seated participant answered a dialog.
    DialogAnswered {
        participant: ParticipantId,
        seat: usize,
        response: DialogResponse,
    },
    /// The lobby changed (seat claimed, released, readied).
    LobbyChanged,
    /// The game started with these seats.
    GameStarted { seats: Vec<usize> },
}

/// Mutation of the engine run on the actor task.
pub(crate) type RulesUpdate<R> = Box<dyn FnOnce(&mut R) -> bool + Send>;

/// Commands sent to the actor.
pub(crate) enum HostCommand<R: RulesEngine> {
    /// A link finished its handshake.
    Joined(LinkHandle),
    /// Capture and broadcast the current state.
    BroadcastSnapshot,
    BroadcastLog(String),
    /// Run a closure against the engine; broadcast if it reports a change.
    Update {
        update: RulesUpdate<R>,
        reply: oneshot::Sender<bool>,
    },
    OpenDialog {
        seat: usize,
        command: DialogCommand,
        reply: oneshot::Sender<Result<(), BoardlinkError>>,
    },
    CloseDialog,
    StartGame {
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },
    EndGame {
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },
    Evict {
        seat: usize,
        reply: oneshot::Sender<bool>,
    },
    ParticipantCount {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

pub(crate) struct HostActor<R: RulesEngine> {
    pub(crate) rules: R,
    pub(crate) lobby: Arc<Lobby>,
    pub(crate) links: HashMap<ParticipantId, LinkHandle>,
    pub(crate) open_dialog: Option<(DialogView, ParticipantId)>,
    /// Messages that beat their link's registration to the actor.
    pub(crate) pending: HashMap<ParticipantId, Vec<Message>>,
    pub(crate) commands: mpsc::Receiver<HostCommand<R>>,
    pub(crate) link_events: mpsc::UnboundedReceiver<LinkEvent>,
    pub(crate) events: broadcast::Sender<HostEvent>,
}

impl<R: RulesEngine> HostActor<R> {
    /// Runs until shutdown or until every handle is gone.
    pub(crate) async fn run(mut self) {
        tracing::info!("host orchestration started");
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(HostCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                Some(event) = self.link_events.recv() => {
                    self.handle_link_event(event).await;
                }
            }
        }
        let mut closing = tokio::task::JoinSet::new();
        for link in self.links.values().cloned() {
            closing.spawn(async move { link.close().await });
        }
        while closing.join_next().await.is_some() {}
        tracing::info!("host orchestration stopped");
    }

    async fn handle_command(&mut self, cmd: HostCommand<R>) {
        match cmd {
            HostCommand::Joined(link) => self.handle_join(link).await,
            HostCommand::BroadcastSnapshot => self.broadcast_snapshot().await,
            HostCommand::BroadcastLog(text) => {
                self.broadcast(&Message::log_entry(&text)).await;
            }
            HostCommand::Update { update, reply } => {
                let changed = update(&mut self.rules);
                if changed {
                    self.broadcast_snapshot().await;
                }
                let _ = reply.send(changed);
            }
            HostCommand::OpenDialog {
                seat,
                command,
                reply,
            } => {
                let result = self.open_dialog(seat, command).await;
                let _ = reply.send(result);
            }
            HostCommand::CloseDialog => self.close_dialog().await,
            HostCommand::StartGame { reply } => {
                let result = self.start_game().await;
                let _ = reply.send(result);
            }
            HostCommand::EndGame { reply } => {
                let result = self.lobby.end_game();
                if result.is_ok() {
                    self.broadcast_lobby().await;
                }
                let _ = reply.send(result);
            }
            HostCommand::Evict { seat, reply } => {
                let evicted = self.lobby.release_slot_at(seat);
                if evicted {
                    tracing::info!(seat, "seat evicted by host");
                    self.broadcast_lobby().await;
                }
                let _ = reply.send(evicted);
            }
            HostCommand::ParticipantCount { reply } => {
                let _ = reply.send(self.links.len());
            }
            HostCommand::Shutdown => {}
        }
    }

    // -- Membership -------------------------------------------------------

    async fn handle_join(&mut self, link: LinkHandle) {
        let participant = link.peer().clone();
        let early = self.pending.remove(&participant).unwrap_or_default();
        if !link.is_open() {
            tracing::debug!(%participant, "link closed before registration");
            return;
        }
        self.lobby.connect(participant.clone());
        self.links.insert(participant.clone(), link.clone());
        tracing::info!(
            %participant,
            participants = self.links.len(),
            "participant joined"
        );
        // Announced as soon as it is registered, so the `Left` that follows
        // a failed catch-up always has a matching `Joined`.
        let _ = self.events.send(HostEvent::Joined {
            participant: participant.clone(),
        });

        // Bring the newcomer up to date, then tell everyone about the
        // changed spectator count.
        let snapshot = self.rules.capture().to_message();
        let dialog = self.dialog_sync().to_message();
        for msg in [&snapshot, &dialog] {
            if link.send(msg).await.is_err() {
                return;
            }
        }
        self.broadcast_lobby().await;
        for message in early {
            self.route(participant.clone(), message).await;
        }
    }

    async fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Message { peer, message } => {
                if self.links.contains_key(&peer) {
                    self.route(peer, message).await;
                } else {
                    self.pending.entry(peer).or_default().push(message);
                }
            }
            LinkEvent::Closed { peer, error } => {
                self.handle_leave(peer, error).await;
            }
        }
    }

    async fn handle_leave(&mut self, participant: ParticipantId, error: LinkError) {
        // Links that failed before registration were never announced.
        if self.links.remove(&participant).is_none() {
            self.pending.remove(&participant);
            return;
        }
        let seat = self.lobby.disconnect(&participant);
        tracing::info!(%participant, ?seat, reason = %error, "participant left");

        let mut changed = false;
        if let Some(seat) = seat {
            changed = self.rules.on_seat_vacated(seat);
        }
        if self
            .open_dialog
            .as_ref()
            .is_some_and(|(_, owner)| *owner == participant)
        {
            self.open_dialog = None;
            self.broadcast_dialog().await;
        }
        self.broadcast_lobby().await;
        if changed {
            self.broadcast_snapshot().await;
        }
        let _ = self.events.send(HostEvent::Left {
            participant,
            seat,
            reason: error.to_string(),
        });
    }

    // -- Routing ----------------------------------------------------------

    async fn route(&mut self, participant: ParticipantId, message: Message) {
        match message.kind {
            MessageKind::SlotRequest => {
                let Some(request) = decode::<SlotRequest>(&participant, &message)
                else {
                    return;
                };
                self.handle_slot_request(participant, request).await;
            }
            MessageKind::ReadyStatus => {
                let Some(status) = decode::<ReadyStatus>(&participant, &message)
                else {
                    return;
                };
                if self.lobby.set_ready(&participant, status.ready) {
                    tracing::debug!(%participant, ready = status.ready, "ready toggled");
                    self.broadcast_lobby().await;
                }
            }
            MessageKind::PlayerAction => {
                let Some(action) = decode::<PlayerAction>(&participant, &message)
                else {
                    return;
                };
                self.handle_action(participant, action).await;
            }
            MessageKind::DialogResponse => {
                let Some(response) =
                    decode::<DialogResponse>(&participant, &message)
                else {
                    return;
                };
                self.handle_dialog_response(participant, response).await;
            }
            other => {
                tracing::debug!(
                    %participant,
                    kind = %other,
                    "ignoring host-bound message of unexpected kind"
                );
            }
        }
    }

    async fn handle_slot_request(
        &mut self,
        participant: ParticipantId,
        request: SlotRequest,
    ) {
        let assignment = self.lobby.handle_request(&participant, &request);
        let status = assignment.status;
        if let Some(link) = self.links.get(&participant) {
            let _ = link.send(&assignment.to_message()).await;
        }
        if status != SlotStatus::Denied {
            self.broadcast_lobby().await;
        }
    }

    async fn handle_action(&mut self, participant: ParticipantId, action: PlayerAction) {
        let Some(seat) = self.lobby.slot_of(&participant) else {
            tracing::debug!(%participant, %action, "action from unseated participant dropped");
            return;
        };
        let changed = self.rules.on_action(seat, action);
        tracing::debug!(%participant, seat, %action, changed, "action applied");
        if changed {
            self.broadcast_snapshot().await;
        }
        let _ = self.events.send(HostEvent::Action {
            participant,
            seat,
            action,
            changed,
        });
    }

    async fn handle_dialog_response(
        &mut self,
        participant: ParticipantId,
        response: DialogResponse,
    ) {
        let Some(seat) = self.lobby.slot_of(&participant) else {
            tracing::debug!(%participant, "dialog response from unseated participant dropped");
            return;
        };
        if self
            .open_dialog
            .as_ref()
            .is_some_and(|(view, owner)| view.id == response.id && *owner == participant)
        {
            self.open_dialog = None;
            self.broadcast_dialog().await;
        }
        let changed = self.rules.on_dialog_response(seat, &response);
        if changed {
            self.broadcast_snapshot().await;
        }
        let _ = self.events.send(HostEvent::DialogAnswered {
            participant,
            seat,
            response,
        });
    }

    // -- Dialogs ----------------------------------------------------------

    fn dialog_sync(&self) -> DialogSync {
        DialogSync {
            dialog: self.open_dialog.as_ref().map(|(view, _)| view.clone()),
        }
    }

    async fn broadcast_dialog(&mut self) {
        let message = self.dialog_sync().to_message();
        self.broadcast(&message).await;
    }

    async fn open_dialog(
        &mut self,
        seat: usize,
        command: DialogCommand,
    ) -> Result<(), BoardlinkError> {
        let owner = self
            .lobby
            .occupant(seat)
            .ok_or(BoardlinkError::EmptySeat(seat))?;
        let link = self
            .links
            .get(&owner)
            .ok_or(BoardlinkError::EmptySeat(seat))?;
        link.send(&command.to_message()).await?;

        match command.action {
            DialogAction::Open => {
                let view = DialogView {
                    id: command.id,
                    kind: command.kind,
                    title: command.title,
                    body: command.body,
                    owner: Some(seat),
                };
                self.open_dialog = Some((view, owner));
            }
            DialogAction::Close => self.open_dialog = None,
        }
        self.broadcast_dialog().await;
        Ok(())
    }

    async fn close_dialog(&mut self) {
        let Some((view, owner)) = self.open_dialog.take() else {
            return;
        };
        if let Some(link) = self.links.get(&owner) {
            let close = DialogCommand {
                id: view.id,
                kind: view.kind,
                action: DialogAction::Close,
                title: String::new(),
                body: String::new(),
                tile: None,
            };
            let _ = link.send(&close.to_message()).await;
        }
        self.broadcast_dialog().await;
    }

    // -- Lobby ------------------------------------------------------------

    async fn start_game(&mut self) -> Result<(), LobbyError> {
        self.lobby.start_game()?;
        let seats: Vec<usize> = (0..self.lobby.config().max_players)
            .filter(|&i| self.lobby.occupant(i).is_some())
            .collect();
        self.broadcast_lobby().await;
        self.rules.on_game_started(&seats);
        // The opening state goes out whether or not the engine changed.
        self.broadcast_snapshot().await;
        let _ = self.events.send(HostEvent::GameStarted { seats });
        Ok(())
    }

    // -- Broadcast --------------------------------------------------------

    async fn broadcast_lobby(&mut self) {
        let message = self.lobby.to_view().to_message();
        self.broadcast(&message).await;
        let _ = self.events.send(HostEvent::LobbyChanged);
    }

    async fn broadcast_snapshot(&mut self) {
        let snapshot = self.rules.capture();
        tracing::debug!(
            turn = snapshot.turn_number,
            dice_seq = snapshot.dice_roll_sequence,
            "broadcasting snapshot"
        );
        self.broadcast(&snapshot.to_message()).await;
    }

    /// Sends to every live link. A failed send tears that link down; its
    /// close event arrives through the normal path.
    /// `&mut self` keeps the actor future `Send` without `R: Sync`.
    async fn broadcast(&mut self, message: &Message) {
        for (participant, link) in &self.links {
            if let Err(e) = link.send(message).await {
                tracing::debug!(%participant, error = %e, "broadcast send failed");
            }
        }
    }
}

/// Decodes a typed payload, logging and dropping malformed ones.
fn decode<P: WirePayload>(participant: &ParticipantId, message: &Message) -> Option<P> {
    match message.decode_payload::<P>() {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::debug!(
                %participant,
                kind = %message.kind,
                error = %e,
                "dropping malformed payload"
            );
            None
        }
    }
}
