//! The remote side: one link to the host, decoded into typed events.

use std::collections::VecDeque;

use boardlink_protocol::{
    DialogChoice, DialogCommand, DialogKind, DialogResponse, DialogSync,
    LobbyStateView, Message, MessageKind, PlayerAction, ReadyStatus,
    SlotAssignment, SlotRequest, WirePayload,
};
use boardlink_session::{LinkEvent, LinkHandle, SyncConfig};
use boardlink_snapshot::Snapshot;
use tokio::sync::mpsc;

use crate::BoardlinkError;

/// Something the host told this remote.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    Snapshot(Snapshot),
    Log(String),
    Lobby(LobbyStateView),
    /// The host's answer to this remote's last slot request.
    SlotAssignment(SlotAssignment),
    /// A dialog addressed to this remote.
    DialogCommand(DialogCommand),
    /// The dialog everyone should see, if any.
    DialogSync(DialogSync),
    /// The link closed. Always the last event.
    Disconnected { reason: String },
}

/// A handshaken connection to a host.
pub struct RemoteClient {
    link: LinkHandle,
    events: mpsc::UnboundedReceiver<LinkEvent>,
    backlog: VecDeque<RemoteEvent>,
    finished: bool,
}

impl RemoteClient {
    /// Connects and handshakes with the host at `addr`.
    pub async fn connect(addr: &str, config: &SyncConfig) -> Result<Self, BoardlinkError> {
        let config = config.clone().validated();
        let (tx, rx) = mpsc::unbounded_channel();
        let link = boardlink_session::connect(addr, &config, tx).await?;
        Ok(Self {
            link,
            events: rx,
            backlog: VecDeque::new(),
            finished: false,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    /// Waits for the next event. Returns `None` after
    /// [`RemoteEvent::Disconnected`] has been handed out.
    pub async fn next_event(&mut self) -> Option<RemoteEvent> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }
        while !self.finished {
            let event = self.events.recv().await?;
            if let Some(event) = self.translate(event) {
                return Some(event);
            }
        }
        None
    }

    /// Like [`next_event`](Self::next_event) but never waits.
    pub fn try_next_event(&mut self) -> Option<RemoteEvent> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }
        while !self.finished {
            let event = self.events.try_recv().ok()?;
            if let Some(event) = self.translate(event) {
                return Some(event);
            }
        }
        None
    }

    /// Drains everything already received and returns the newest snapshot.
    ///
    /// Older snapshots are discarded; other events stay queued in order for
    /// [`next_event`](Self::next_event).
    pub fn latest_snapshot(&mut self) -> Option<Snapshot> {
        let mut latest = None;
        let mut kept = VecDeque::with_capacity(self.backlog.len());
        for event in self.backlog.drain(..) {
            match event {
                RemoteEvent::Snapshot(snapshot) => latest = Some(snapshot),
                other => kept.push_back(other),
            }
        }
        self.backlog = kept;

        while !self.finished {
            let Ok(event) = self.events.try_recv() else {
                break;
            };
            match self.translate(event) {
                Some(RemoteEvent::Snapshot(snapshot)) => latest = Some(snapshot),
                Some(other) => self.backlog.push_back(other),
                None => {}
            }
        }
        latest
    }

    /// Sends a button press or tile pick.
    pub async fn send_action(&self, action: PlayerAction) -> Result<(), BoardlinkError> {
        self.send(action.to_message()).await
    }

    /// Asks for a seat under a display name.
    pub async fn request_slot(
        &self,
        slot: usize,
        name: impl Into<String>,
    ) -> Result<(), BoardlinkError> {
        self.send(SlotRequest::claim(slot, name).to_message()).await
    }

    /// Gives up whatever seat this remote holds.
    pub async fn release_slot(&self) -> Result<(), BoardlinkError> {
        self.send(SlotRequest::release().to_message()).await
    }

    pub async fn set_ready(&self, ready: bool) -> Result<(), BoardlinkError> {
        self.send(ReadyStatus { ready }.to_message()).await
    }

    /// Answers the dialog with `id`.
    pub async fn respond_dialog(
        &self,
        id: u64,
        kind: DialogKind,
        choice: DialogChoice,
        value: Option<i64>,
    ) -> Result<(), BoardlinkError> {
        let response = DialogResponse {
            id,
            kind,
            choice,
            value,
        };
        self.send(response.to_message()).await
    }

    /// Closes the link. The host sees an orderly disconnect.
    pub async fn disconnect(&self) {
        self.link.close().await;
    }

    async fn send(&self, message: Message) -> Result<(), BoardlinkError> {
        self.link.send(&message).await.map_err(BoardlinkError::from)
    }

    fn translate(&mut self, event: LinkEvent) -> Option<RemoteEvent> {
        match event {
            LinkEvent::Closed { error, .. } => {
                self.finished = true;
                Some(RemoteEvent::Disconnected {
                    reason: error.to_string(),
                })
            }
            LinkEvent::Message { message, .. } => decode_event(&message),
        }
    }
}

impl Drop for RemoteClient {
    fn drop(&mut self) {
        if !self.link.is_open() {
            return;
        }
        // Without a runtime the link tasks are already gone.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            let link = self.link.clone();
            runtime.spawn(async move { link.close().await });
        }
    }
}

fn decode_event(message: &Message) -> Option<RemoteEvent> {
    let event = match message.kind {
        MessageKind::StateSnapshot => match message.decode_payload::<Snapshot>() {
            Ok(snapshot) => RemoteEvent::Snapshot(snapshot),
            Err(e) => {
                tracing::warn!(error = %e, "skipping invalid snapshot");
                return None;
            }
        },
        MessageKind::LogEntry => RemoteEvent::Log(message.payload_str().to_string()),
        MessageKind::LobbyState => RemoteEvent::Lobby(decode(message)?),
        MessageKind::SlotAssignment => RemoteEvent::SlotAssignment(decode(message)?),
        MessageKind::DialogCommand => RemoteEvent::DialogCommand(decode(message)?),
        MessageKind::DialogSync => RemoteEvent::DialogSync(decode(message)?),
        other => {
            tracing::debug!(kind = %other, "ignoring remote-bound message of unexpected kind");
            return None;
        }
    };
    Some(event)
}

fn decode<P: WirePayload>(message: &Message) -> Option<P> {
    message
        .decode_payload::<P>()
        .inspect_err(|e| {
            tracing::debug!(kind = %message.kind, error = %e, "dropping malformed payload");
        })
        .ok()
}
