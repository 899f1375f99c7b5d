//! Capture on the host, apply on the remote.
//!
//! The rules engine owns the authoritative state and exposes it through
//! [`SnapshotSource`]. A remote's local state implements [`MirrorTarget`];
//! [`apply`] overwrites every mirrored field on it. Apply never merges:
//! whatever the snapshot says wins, so applying the same snapshot twice, or
//! an older one after a newer one, leaves exactly that snapshot's state.

use std::collections::BTreeMap;

use crate::{
    ButtonStates, CitySnapshot, PlayerSnapshot, Snapshot, TouristSpotSnapshot,
};

/// Authoritative state that can be captured as a [`Snapshot`].
///
/// Implemented by the host's game state. `capture` must be pure: the same
/// state always produces the same snapshot, and nothing is mutated.
pub trait SnapshotSource {
    fn capture(&self) -> Snapshot;
}

/// Local state a remote mirrors the host onto.
///
/// Each setter replaces one mirrored field. Players are addressed by their
/// stable position in the snapshot list; cities and tourist spots by tile id.
pub trait MirrorTarget {
    fn set_turn(&mut self, turn_number: u32, current_player_index: usize);
    fn set_dice(&mut self, dice1: u8, dice2: u8);
    fn set_modes(&mut self, odd_selected: bool, even_selected: bool);
    fn set_tile_selection(&mut self, enabled: bool);
    fn set_buttons(&mut self, buttons: ButtonStates);
    /// Called once per snapshot with the participant count, before any
    /// [`set_player`](Self::set_player).
    fn set_player_count(&mut self, count: usize);
    fn set_player(&mut self, index: usize, player: &PlayerSnapshot);
    fn set_city(&mut self, city: &CitySnapshot);
    fn set_tourist_spot(&mut self, spot: &TouristSpotSnapshot);
}

/// Overwrites every mirrored field of `target` with `snapshot`.
pub fn apply(snapshot: &Snapshot, target: &mut impl MirrorTarget) {
    target.set_turn(snapshot.turn_number, snapshot.current_player_index);
    target.set_dice(snapshot.dice1, snapshot.dice2);
    target.set_modes(snapshot.odd_mode_selected, snapshot.even_mode_selected);
    target.set_tile_selection(snapshot.tile_selection_enabled);
    target.set_buttons(snapshot.buttons);

    target.set_player_count(snapshot.players.len());
    for (index, player) in snapshot.players.iter().enumerate() {
        target.set_player(index, player);
    }
    for city in &snapshot.cities {
        target.set_city(city);
    }
    for spot in &snapshot.tourist_spots {
        target.set_tourist_spot(spot);
    }

    tracing::trace!(
        turn = snapshot.turn_number,
        players = snapshot.players.len(),
        cities = snapshot.cities.len(),
        "snapshot applied"
    );
}

// ---------------------------------------------------------------------------
// MirroredBoard
// ---------------------------------------------------------------------------

/// A plain in-memory [`MirrorTarget`].
///
/// Useful as the remote's model when the UI reads from a struct, and as
/// the reference target in tests. Tiles the host never mentioned keep
/// whatever state they had.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MirroredBoard {
    pub turn_number: u32,
    pub current_player_index: usize,
    pub dice: (u8, u8),
    pub odd_mode_selected: bool,
    pub even_mode_selected: bool,
    pub tile_selection_enabled: bool,
    pub buttons: ButtonStates,
    pub players: Vec<PlayerSnapshot>,
    pub cities: BTreeMap<u32, CitySnapshot>,
    pub tourist_spots: BTreeMap<u32, TouristSpotSnapshot>,
}

impl MirrorTarget for MirroredBoard {
    fn set_turn(&mut self, turn_number: u32, current_player_index: usize) {
        self.turn_number = turn_number;
        self.current_player_index = current_player_index;
    }

    fn set_dice(&mut self, dice1: u8, dice2: u8) {
        self.dice = (dice1, dice2);
    }

    fn set_modes(&mut self, odd_selected: bool, even_selected: bool) {
        self.odd_mode_selected = odd_selected;
        self.even_mode_selected = even_selected;
    }

    fn set_tile_selection(&mut self, enabled: bool) {
        self.tile_selection_enabled = enabled;
    }

    fn set_buttons(&mut self, buttons: ButtonStates) {
        self.buttons = buttons;
    }

    fn set_player_count(&mut self, count: usize) {
        self.players.resize_with(count, PlayerSnapshot::default);
    }

    fn set_player(&mut self, index: usize, player: &PlayerSnapshot) {
        if index >= self.players.len() {
            self.players.resize_with(index + 1, PlayerSnapshot::default);
        }
        self.players[index] = player.clone();
    }

    fn set_city(&mut self, city: &CitySnapshot) {
        self.cities.insert(city.tile_id, city.clone());
    }

    fn set_tourist_spot(&mut self, spot: &TouristSpotSnapshot) {
        self.tourist_spots.insert(spot.tile_id, spot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(turn: u32, cash: i64, city_owner: Option<usize>) -> Snapshot {
        Snapshot {
            turn_number: turn,
            current_player_index: 0,
            dice_roll_sequence: u64::from(turn),
            dice1: 2,
            dice2: 5,
            players: vec![
                PlayerSnapshot {
                    name: "A".into(),
                    cash,
                    ..PlayerSnapshot::default()
                },
                PlayerSnapshot {
                    name: "B".into(),
                    cash: 900,
                    position: 4,
                    ..PlayerSnapshot::default()
                },
            ],
            cities: vec![CitySnapshot {
                tile_id: 8,
                owner: city_owner,
                level: 1,
                ..CitySnapshot::default()
            }],
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_apply_mirrors_every_field() {
        let s = snapshot(3, 1_500_000, Some(1));
        let mut board = MirroredBoard::default();
        apply(&s, &mut board);

        assert_eq!(board.turn_number, 3);
        assert_eq!(board.dice, (2, 5));
        assert_eq!(board.players, s.players);
        assert_eq!(board.cities[&8].owner, Some(1));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let s = snapshot(3, 100, Some(0));
        let mut once = MirroredBoard::default();
        apply(&s, &mut once);
        let mut twice = once.clone();
        apply(&s, &mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_older_snapshot_after_newer_wins() {
        let newer = snapshot(9, 50, None);
        let older = snapshot(2, 700, Some(1));
        let mut board = MirroredBoard::default();
        apply(&newer, &mut board);
        apply(&older, &mut board);

        let mut expected = MirroredBoard::default();
        apply(&older, &mut expected);
        assert_eq!(board, expected);
    }

    #[test]
    fn test_null_owner_clears_previous_owner() {
        let mut board = MirroredBoard::default();
        apply(&snapshot(1, 0, Some(1)), &mut board);
        apply(&snapshot(2, 0, None), &mut board);
        assert_eq!(board.cities[&8].owner, None);
    }

    #[test]
    fn test_unmentioned_tiles_are_left_alone() {
        let mut board = MirroredBoard::default();
        board.cities.insert(
            30,
            CitySnapshot {
                tile_id: 30,
                level: 2,
                ..CitySnapshot::default()
            },
        );
        apply(&snapshot(1, 0, None), &mut board);
        assert_eq!(board.cities[&30].level, 2);
        assert!(board.cities.contains_key(&8));
    }

    #[test]
    fn test_player_list_shrinks_to_snapshot() {
        let mut board = MirroredBoard::default();
        board.players = vec![PlayerSnapshot::default(); 4];
        apply(&snapshot(1, 0, None), &mut board);
        assert_eq!(board.players.len(), 2);
    }
}
