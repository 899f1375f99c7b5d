//! Typed views over the kind-specific payload grammars.
//!
//! | Kind              | Grammar                                   |
//! |-------------------|-------------------------------------------|
//! | `PLAYER_ACTION`   | `action-name[:int]`                       |
//! | `LOG_ENTRY`       | raw text                                  |
//! | `SLOT_REQUEST`    | flat `key=value` ([`crate::kv`])          |
//! | `SLOT_ASSIGNMENT` | flat `key=value`                          |
//! | `READY_STATUS`    | flat `key=value`                          |
//! | `LOBBY_STATE`     | flat `key=value`, `slot<i>.` prefixed     |
//! | `DIALOG_COMMAND`  | flat `key=value`                          |
//! | `DIALOG_RESPONSE` | flat `key=value`                          |
//! | `DIALOG_SYNC`     | JSON object or `null` ([`crate::value`])  |
//!
//! `STATE_SNAPSHOT` lives in the snapshot crate.

use std::fmt;
use std::str::FromStr;

use crate::kv::KvMap;
use crate::value::{Object, Value};
use crate::{MessageKind, ProtocolError, WirePayload};

// ---------------------------------------------------------------------------
// PlayerAction
// ---------------------------------------------------------------------------

/// Remote input forwarded by the host to the rules engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    RollPress,
    RollRelease,
    Purchase,
    Upgrade,
    Takeover,
    Skip,
    PayBail,
    ToggleOdd,
    ToggleEven,
    /// A board tile was picked while tile selection was enabled.
    TileSelected(i32),
}

impl PlayerAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RollPress => "roll-press",
            Self::RollRelease => "roll-release",
            Self::Purchase => "purchase",
            Self::Upgrade => "upgrade",
            Self::Takeover => "takeover",
            Self::Skip => "skip",
            Self::PayBail => "pay-bail",
            Self::ToggleOdd => "toggle-odd",
            Self::ToggleEven => "toggle-even",
            Self::TileSelected(_) => "tile-selected",
        }
    }
}

impl fmt::Display for PlayerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TileSelected(tile) => write!(f, "{}:{tile}", self.name()),
            other => f.write_str(other.name()),
        }
    }
}

impl FromStr for PlayerAction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, arg) = match s.trim().split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s.trim(), None),
        };
        let action = match (name, arg) {
            ("roll-press", None) => Self::RollPress,
            ("roll-release", None) => Self::RollRelease,
            ("purchase", None) => Self::Purchase,
            ("upgrade", None) => Self::Upgrade,
            ("takeover", None) => Self::Takeover,
            ("skip", None) => Self::Skip,
            ("pay-bail", None) => Self::PayBail,
            ("toggle-odd", None) => Self::ToggleOdd,
            ("toggle-even", None) => Self::ToggleEven,
            ("tile-selected", Some(arg)) => {
                let tile = arg.trim().parse().map_err(|_| {
                    ProtocolError::InvalidPayload(format!(
                        "tile-selected argument `{arg}` is not an integer"
                    ))
                })?;
                Self::TileSelected(tile)
            }
            ("tile-selected", None) => {
                return Err(ProtocolError::InvalidPayload(
                    "tile-selected requires a tile argument".into(),
                ));
            }
            (name, Some(_)) if !name.is_empty() => {
                return Err(ProtocolError::InvalidPayload(format!(
                    "action `{name}` takes no argument"
                )));
            }
            (name, _) => {
                return Err(ProtocolError::InvalidPayload(format!(
                    "unknown action `{name}`"
                )));
            }
        };
        Ok(action)
    }
}

impl WirePayload for PlayerAction {
    const KIND: MessageKind = MessageKind::PlayerAction;

    fn encode_payload(&self) -> String {
        self.to_string()
    }

    fn decode_payload(payload: &str) -> Result<Self, ProtocolError> {
        payload.parse()
    }
}

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// One line of the host's game log, mirrored to remotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry(pub String);

impl WirePayload for LogEntry {
    const KIND: MessageKind = MessageKind::LogEntry;

    fn encode_payload(&self) -> String {
        self.0.clone()
    }

    fn decode_payload(payload: &str) -> Result<Self, ProtocolError> {
        Ok(Self(payload.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Lobby payloads
// ---------------------------------------------------------------------------

/// Remote → host: claim a seat, or release the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRequest {
    /// `None` means "release my seat" (`slot=-1` on the wire).
    pub slot: Option<usize>,
    pub name: String,
}

impl SlotRequest {
    pub fn claim(slot: usize, name: impl Into<String>) -> Self {
        Self {
            slot: Some(slot),
            name: name.into(),
        }
    }

    pub fn release() -> Self {
        Self {
            slot: None,
            name: String::new(),
        }
    }
}

impl WirePayload for SlotRequest {
    const KIND: MessageKind = MessageKind::SlotRequest;

    fn encode_payload(&self) -> String {
        KvMap::new()
            .with("slot", encode_slot(self.slot))
            .with("name", &self.name)
            .encode()
    }

    fn decode_payload(payload: &str) -> Result<Self, ProtocolError> {
        let map = KvMap::decode(payload)?;
        Ok(Self {
            slot: decode_slot(map.parse_field("slot")?)?,
            name: map.get("name").unwrap_or_default().to_string(),
        })
    }
}

/// Outcome of a [`SlotRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Assigned,
    Released,
    Denied,
}

impl SlotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "ASSIGNED",
            Self::Released => "RELEASED",
            Self::Denied => "DENIED",
        }
    }
}

impl FromStr for SlotStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASSIGNED" => Ok(Self::Assigned),
            "RELEASED" => Ok(Self::Released),
            "DENIED" => Ok(Self::Denied),
            other => Err(ProtocolError::InvalidPayload(format!(
                "unknown slot status `{other}`"
            ))),
        }
    }
}

/// Host → remote: the answer to that remote's [`SlotRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    pub slot: Option<usize>,
    pub name: String,
    pub status: SlotStatus,
    pub note: Option<String>,
}

impl WirePayload for SlotAssignment {
    const KIND: MessageKind = MessageKind::SlotAssignment;

    fn encode_payload(&self) -> String {
        let mut map = KvMap::new()
            .with("slot", encode_slot(self.slot))
            .with("name", &self.name)
            .with("status", self.status.as_str());
        if let Some(note) = &self.note {
            map.insert("note", note);
        }
        map.encode()
    }

    fn decode_payload(payload: &str) -> Result<Self, ProtocolError> {
        let map = KvMap::decode(payload)?;
        Ok(Self {
            slot: decode_slot(map.parse_field("slot")?)?,
            name: map.get("name").unwrap_or_default().to_string(),
            status: map.require("status")?.parse()?,
            note: map.get("note").map(str::to_string),
        })
    }
}

/// Remote → host: toggle the sender's ready flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyStatus {
    pub ready: bool,
}

impl WirePayload for ReadyStatus {
    const KIND: MessageKind = MessageKind::ReadyStatus;

    fn encode_payload(&self) -> String {
        KvMap::new().with("ready", self.ready).encode()
    }

    fn decode_payload(payload: &str) -> Result<Self, ProtocolError> {
        let map = KvMap::decode(payload)?;
        Ok(Self {
            ready: map.parse_field("ready")?,
        })
    }
}

/// One seat as shown to every participant. Carries no participant id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotView {
    pub label: String,
    pub occupied: bool,
    pub ready: bool,
    pub occupant_name: Option<String>,
}

/// Host → all: read-only projection of the lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyStateView {
    pub max_players: usize,
    pub spectators: usize,
    pub game_in_progress: bool,
    pub slots: Vec<SlotView>,
}

impl WirePayload for LobbyStateView {
    const KIND: MessageKind = MessageKind::LobbyState;

    fn encode_payload(&self) -> String {
        let mut map = KvMap::new()
            .with("maxPlayers", self.max_players)
            .with("spectators", self.spectators)
            .with("gameInProgress", self.game_in_progress);
        for (i, slot) in self.slots.iter().enumerate() {
            map.insert(format!("slot{i}.label"), &slot.label);
            map.insert(format!("slot{i}.occupied"), slot.occupied);
            map.insert(format!("slot{i}.ready"), slot.ready);
            map.insert(
                format!("slot{i}.name"),
                slot.occupant_name.as_deref().unwrap_or_default(),
            );
        }
        map.encode()
    }

    fn decode_payload(payload: &str) -> Result<Self, ProtocolError> {
        let map = KvMap::decode(payload)?;
        let max_players: usize = map.parse_field("maxPlayers")?;
        let mut slots = Vec::new();
        // Seats are listed densely from 0; stop at the first gap.
        for i in 0..max_players {
            let Some(label) = map.get(&format!("slot{i}.label")) else {
                break;
            };
            let occupied: bool = map.parse_field(&format!("slot{i}.occupied"))?;
            let name = map.get(&format!("slot{i}.name")).unwrap_or_default();
            slots.push(SlotView {
                label: label.to_string(),
                occupied,
                ready: map.parse_field(&format!("slot{i}.ready"))?,
                occupant_name: (occupied && !name.is_empty())
                    .then(|| name.to_string()),
            });
        }
        Ok(Self {
            max_players,
            spectators: map.parse_field("spectators")?,
            game_in_progress: map
                .parse_optional("gameInProgress")?
                .unwrap_or(false),
            slots,
        })
    }
}

fn encode_slot(slot: Option<usize>) -> i64 {
    slot.map_or(-1, |s| s as i64)
}

/// `-1` is the only negative slot on the wire and means "no seat".
fn decode_slot(raw: i64) -> Result<Option<usize>, ProtocolError> {
    match raw {
        -1 => Ok(None),
        raw => usize::try_from(raw)
            .map(Some)
            .map_err(|_| ProtocolError::wrong_type("slot", "a seat index or -1")),
    }
}

// ---------------------------------------------------------------------------
// Dialog payloads
// ---------------------------------------------------------------------------

/// The closed set of modal dialogs the host can put in front of a remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Purchase,
    Upgrade,
    Takeover,
    TouristSpotLock,
    Bail,
    Notice,
}

impl DialogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "PURCHASE",
            Self::Upgrade => "UPGRADE",
            Self::Takeover => "TAKEOVER",
            Self::TouristSpotLock => "TOURIST_SPOT_LOCK",
            Self::Bail => "BAIL",
            Self::Notice => "NOTICE",
        }
    }
}

impl FromStr for DialogKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PURCHASE" => Ok(Self::Purchase),
            "UPGRADE" => Ok(Self::Upgrade),
            "TAKEOVER" => Ok(Self::Takeover),
            "TOURIST_SPOT_LOCK" => Ok(Self::TouristSpotLock),
            "BAIL" => Ok(Self::Bail),
            "NOTICE" => Ok(Self::Notice),
            other => Err(ProtocolError::InvalidPayload(format!(
                "unknown dialog type `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogAction {
    Open,
    Close,
}

impl DialogAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
        }
    }
}

impl FromStr for DialogAction {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(Self::Open),
            "CLOSE" => Ok(Self::Close),
            other => Err(ProtocolError::InvalidPayload(format!(
                "unknown dialog action `{other}`"
            ))),
        }
    }
}

/// Host → one remote: open or close a modal dialog that remote must answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogCommand {
    pub id: u64,
    pub kind: DialogKind,
    pub action: DialogAction,
    pub title: String,
    pub body: String,
    /// Board tile the dialog is about, if any.
    pub tile: Option<i32>,
}

impl WirePayload for DialogCommand {
    const KIND: MessageKind = MessageKind::DialogCommand;

    fn encode_payload(&self) -> String {
        let mut map = KvMap::new()
            .with("id", self.id)
            .with("type", self.kind.as_str())
            .with("action", self.action.as_str())
            .with("title", &self.title)
            .with("body", &self.body);
        if let Some(tile) = self.tile {
            map.insert("tile", tile);
        }
        map.encode()
    }

    fn decode_payload(payload: &str) -> Result<Self, ProtocolError> {
        let map = KvMap::decode(payload)?;
        Ok(Self {
            id: map.parse_field("id")?,
            kind: map.require("type")?.parse()?,
            action: map.require("action")?.parse()?,
            title: map.get("title").unwrap_or_default().to_string(),
            body: map.get("body").unwrap_or_default().to_string(),
            tile: map.parse_optional("tile")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogChoice {
    Accept,
    Decline,
}

impl DialogChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Decline => "DECLINE",
        }
    }
}

impl FromStr for DialogChoice {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCEPT" => Ok(Self::Accept),
            "DECLINE" => Ok(Self::Decline),
            other => Err(ProtocolError::InvalidPayload(format!(
                "unknown dialog choice `{other}`"
            ))),
        }
    }
}

/// Remote → host: the answer to a [`DialogCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogResponse {
    pub id: u64,
    pub kind: DialogKind,
    pub choice: DialogChoice,
    /// Extra numeric answer (e.g. the tile picked in a lock dialog).
    pub value: Option<i64>,
}

impl WirePayload for DialogResponse {
    const KIND: MessageKind = MessageKind::DialogResponse;

    fn encode_payload(&self) -> String {
        let mut map = KvMap::new()
            .with("id", self.id)
            .with("type", self.kind.as_str())
            .with("choice", self.choice.as_str());
        if let Some(value) = self.value {
            map.insert("value", value);
        }
        map.encode()
    }

    fn decode_payload(payload: &str) -> Result<Self, ProtocolError> {
        let map = KvMap::decode(payload)?;
        Ok(Self {
            id: map.parse_field("id")?,
            kind: map.require("type")?.parse()?,
            choice: map.require("choice")?.parse()?,
            value: map.parse_optional("value")?,
        })
    }
}

/// The dialog currently in front of the acting participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogView {
    pub id: u64,
    pub kind: DialogKind,
    pub title: String,
    pub body: String,
    /// Participant index the dialog belongs to.
    pub owner: Option<usize>,
}

/// Host → all: mirror of the open dialog so every screen shows the same
/// modal state. `None` means no dialog is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogSync {
    pub dialog: Option<DialogView>,
}

impl WirePayload for DialogSync {
    const KIND: MessageKind = MessageKind::DialogSync;

    fn encode_payload(&self) -> String {
        let Some(d) = &self.dialog else {
            return Value::Null.to_json();
        };
        let owner = d.owner.and_then(|o| i64::try_from(o).ok());
        Value::from(
            Object::new()
                .with("id", d.id as i64)
                .with("type", d.kind.as_str())
                .with("title", d.title.as_str())
                .with("body", d.body.as_str())
                .with("owner", owner),
        )
        .to_json()
    }

    fn decode_payload(payload: &str) -> Result<Self, ProtocolError> {
        let value = Value::parse(payload)?;
        if value.is_null() {
            return Ok(Self { dialog: None });
        }
        let obj = value
            .as_object()
            .ok_or_else(|| ProtocolError::InvalidPayload("dialog sync is not an object".into()))?;
        let str_field = |key: &str| -> Result<String, ProtocolError> {
            obj.get(key)
                .ok_or_else(|| ProtocolError::missing(key))?
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ProtocolError::wrong_type(key, "a string"))
        };
        let id = obj
            .get("id")
            .and_then(Value::as_i64)
            .and_then(|id| u64::try_from(id).ok())
            .ok_or_else(|| ProtocolError::wrong_type("id", "a non-negative integer"))?;
        let owner = match obj.get("owner") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                v.as_i64()
                    .and_then(|o| usize::try_from(o).ok())
                    .ok_or_else(|| ProtocolError::wrong_type("owner", "an index"))?,
            ),
        };
        Ok(Self {
            dialog: Some(DialogView {
                id,
                kind: str_field("type")?.parse()?,
                title: str_field("title")?,
                body: str_field("body")?,
                owner,
            }),
        })
    }
}
