//! The snapshot value and its JSON mapping.
//!
//! A [`Snapshot`] is the whole mirrored game state. The host builds a new
//! one after every state-mutating action; it is never edited afterwards.
//! There are no deltas: each broadcast carries everything.
//!
//! List order is positional. Index `i` in `players` is the same participant
//! in every snapshot of a session. Cities and tourist spots are keyed by
//! `tile_id` and need not cover every board tile.

use boardlink_protocol::value::{Object, Value};
use boardlink_protocol::{MessageKind, ProtocolError, WirePayload};

/// Highest upgrade level a city can reach.
pub const MAX_CITY_LEVEL: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub turn_number: u32,
    pub current_player_index: usize,
    /// Bumped by the host once per dice roll. `0` means no roll yet.
    pub dice_roll_sequence: u64,
    pub dice1: u8,
    pub dice2: u8,
    pub odd_mode_selected: bool,
    pub even_mode_selected: bool,
    pub tile_selection_enabled: bool,
    pub buttons: ButtonStates,
    pub players: Vec<PlayerSnapshot>,
    pub cities: Vec<CitySnapshot>,
    pub tourist_spots: Vec<TouristSpotSnapshot>,
}

/// Which action buttons the rules engine currently allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonStates {
    pub roll: bool,
    pub purchase: bool,
    pub upgrade: bool,
    pub takeover: bool,
    pub skip: bool,
    pub escape: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerSnapshot {
    pub name: String,
    pub cash: i64,
    pub position: u32,
    pub jail_turns: u32,
    pub bankrupt: bool,
    pub has_railroad_ticket: bool,
    pub has_extra_chance: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CitySnapshot {
    pub tile_id: u32,
    pub owner: Option<usize>,
    /// `0..=MAX_CITY_LEVEL`.
    pub level: u8,
    pub has_olympic_boost: bool,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TouristSpotSnapshot {
    pub tile_id: u32,
    pub owner: Option<usize>,
    pub locked: bool,
    pub locked_by: Option<usize>,
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

impl Snapshot {
    /// Builds the JSON object carried by `STATE_SNAPSHOT`.
    pub fn to_value(&self) -> Value {
        let b = &self.buttons;
        let buttons = Object::new()
            .with("roll", b.roll)
            .with("purchase", b.purchase)
            .with("upgrade", b.upgrade)
            .with("takeover", b.takeover)
            .with("skip", b.skip)
            .with("escape", b.escape);

        let players: Vec<Value> = self
            .players
            .iter()
            .map(|p| {
                Object::new()
                    .with("name", p.name.as_str())
                    .with("cash", p.cash)
                    .with("position", p.position)
                    .with("jailTurns", p.jail_turns)
                    .with("bankrupt", p.bankrupt)
                    .with("hasRailroadTicket", p.has_railroad_ticket)
                    .with("hasExtraChance", p.has_extra_chance)
                    .into()
            })
            .collect();

        let cities: Vec<Value> = self
            .cities
            .iter()
            .map(|c| {
                Object::new()
                    .with("tileId", c.tile_id)
                    .with("owner", index_value(c.owner))
                    .with("level", u32::from(c.level))
                    .with("hasOlympicBoost", c.has_olympic_boost)
                    .with("deleted", c.deleted)
                    .into()
            })
            .collect();

        let spots: Vec<Value> = self
            .tourist_spots
            .iter()
            .map(|t| {
                Object::new()
                    .with("tileId", t.tile_id)
                    .with("owner", index_value(t.owner))
                    .with("locked", t.locked)
                    .with("lockedBy", index_value(t.locked_by))
                    .into()
            })
            .collect();

        Object::new()
            .with("turnNumber", self.turn_number)
            .with("currentPlayerIndex", index_value(Some(self.current_player_index)))
            .with("diceRollSequence", seq_value(self.dice_roll_sequence))
            .with("dice1", u32::from(self.dice1))
            .with("dice2", u32::from(self.dice2))
            .with("oddModeSelected", self.odd_mode_selected)
            .with("evenModeSelected", self.even_mode_selected)
            .with("tileSelectionEnabled", self.tile_selection_enabled)
            .with("buttons", buttons)
            .with("players", players)
            .with("cities", cities)
            .with("touristSpots", spots)
            .into()
    }

    /// Parses the JSON object carried by `STATE_SNAPSHOT`.
    ///
    /// All-or-nothing: any missing or mistyped field rejects the whole
    /// snapshot, so a caller never applies half of one.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let root = Fields::of(value, "snapshot")?;

        let buttons = Fields::of(root.value("buttons")?, "buttons")?;
        let buttons = ButtonStates {
            roll: buttons.bool("roll")?,
            purchase: buttons.bool("purchase")?,
            upgrade: buttons.bool("upgrade")?,
            takeover: buttons.bool("takeover")?,
            skip: buttons.bool("skip")?,
            escape: buttons.bool("escape")?,
        };

        let players = root
            .array("players")?
            .iter()
            .map(|v| {
                let p = Fields::of(v, "players[]")?;
                Ok(PlayerSnapshot {
                    name: p.string("name")?,
                    cash: p.int("cash")?,
                    position: p.uint("position")?,
                    jail_turns: p.uint("jailTurns")?,
                    bankrupt: p.bool("bankrupt")?,
                    has_railroad_ticket: p.bool("hasRailroadTicket")?,
                    has_extra_chance: p.bool("hasExtraChance")?,
                })
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;

        let cities = root
            .array("cities")?
            .iter()
            .map(|v| {
                let c = Fields::of(v, "cities[]")?;
                let level: u8 = c.uint("level")?;
                if level > MAX_CITY_LEVEL {
                    return Err(ProtocolError::InvalidPayload(format!(
                        "cities[].level {level} exceeds {MAX_CITY_LEVEL}"
                    )));
                }
                Ok(CitySnapshot {
                    tile_id: c.uint("tileId")?,
                    owner: c.opt_index("owner")?,
                    level,
                    has_olympic_boost: c.bool("hasOlympicBoost")?,
                    deleted: c.bool("deleted")?,
                })
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;

        let tourist_spots = root
            .array("touristSpots")?
            .iter()
            .map(|v| {
                let t = Fields::of(v, "touristSpots[]")?;
                Ok(TouristSpotSnapshot {
                    tile_id: t.uint("tileId")?,
                    owner: t.opt_index("owner")?,
                    locked: t.bool("locked")?,
                    locked_by: t.opt_index("lockedBy")?,
                })
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;

        Ok(Self {
            turn_number: root.uint("turnNumber")?,
            current_player_index: root.uint("currentPlayerIndex")?,
            dice_roll_sequence: root.opt_uint("diceRollSequence")?.unwrap_or(0),
            dice1: root.uint("dice1")?,
            dice2: root.uint("dice2")?,
            odd_mode_selected: root.bool("oddModeSelected")?,
            even_mode_selected: root.bool("evenModeSelected")?,
            tile_selection_enabled: root.bool("tileSelectionEnabled")?,
            buttons,
            players,
            cities,
            tourist_spots,
        })
    }

    /// Looks up a city entry by tile id.
    pub fn city(&self, tile_id: u32) -> Option<&CitySnapshot> {
        self.cities.iter().find(|c| c.tile_id == tile_id)
    }

    /// Looks up a tourist spot entry by tile id.
    pub fn tourist_spot(&self, tile_id: u32) -> Option<&TouristSpotSnapshot> {
        self.tourist_spots.iter().find(|t| t.tile_id == tile_id)
    }
}

impl WirePayload for Snapshot {
    const KIND: MessageKind = MessageKind::StateSnapshot;

    fn encode_payload(&self) -> String {
        self.to_value().to_json()
    }

    fn decode_payload(payload: &str) -> Result<Self, ProtocolError> {
        Self::from_value(&Value::parse(payload)?)
    }
}

fn index_value(index: Option<usize>) -> Value {
    index
        .and_then(|i| i64::try_from(i).ok())
        .map_or(Value::Null, Value::Int)
}

fn seq_value(seq: u64) -> Value {
    // Sequences past i64::MAX would take centuries of rolling; saturate.
    Value::Int(i64::try_from(seq).unwrap_or(i64::MAX))
}

/// Typed, path-aware field access over one JSON object.
struct Fields<'a> {
    obj: &'a Object,
    path: &'static str,
}

impl<'a> Fields<'a> {
    fn of(value: &'a Value, path: &'static str) -> Result<Self, ProtocolError> {
        value
            .as_object()
            .map(|obj| Self { obj, path })
            .ok_or_else(|| ProtocolError::InvalidPayload(format!("{path} is not an object")))
    }

    fn invalid(&self, key: &str, expected: &str) -> ProtocolError {
        ProtocolError::InvalidPayload(format!("{}.{key} is not {expected}", self.path))
    }

    fn value(&self, key: &str) -> Result<&'a Value, ProtocolError> {
        self.obj.get(key).ok_or_else(|| {
            ProtocolError::InvalidPayload(format!("{} is missing `{key}`", self.path))
        })
    }

    fn bool(&self, key: &str) -> Result<bool, ProtocolError> {
        self.value(key)?
            .as_bool()
            .ok_or_else(|| self.invalid(key, "a boolean"))
    }

    fn int(&self, key: &str) -> Result<i64, ProtocolError> {
        self.value(key)?
            .as_i64()
            .ok_or_else(|| self.invalid(key, "an integer"))
    }

    fn uint<T: TryFrom<i64>>(&self, key: &str) -> Result<T, ProtocolError> {
        T::try_from(self.int(key)?).map_err(|_| self.invalid(key, "in range"))
    }

    fn opt_uint<T: TryFrom<i64>>(&self, key: &str) -> Result<Option<T>, ProtocolError> {
        match self.obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.uint(key).map(Some),
        }
    }

    fn opt_index(&self, key: &str) -> Result<Option<usize>, ProtocolError> {
        match self.value(key)? {
            Value::Null => Ok(None),
            _ => self.uint(key).map(Some),
        }
    }

    fn string(&self, key: &str) -> Result<String, ProtocolError> {
        self.value(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.invalid(key, "a string"))
    }

    fn array(&self, key: &str) -> Result<&'a [Value], ProtocolError> {
        self.value(key)?
            .as_array()
            .ok_or_else(|| self.invalid(key, "an array"))
    }
}
