//! The seat table.
//!
//! Every public operation takes the one lock, does its work, and releases
//! it before returning, so each is atomic with respect to every other.
//! Nothing here awaits; callers on async tasks hold the lock only for the
//! duration of a single call.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use boardlink_protocol::{
    LobbyStateView, ParticipantId, SlotAssignment, SlotRequest, SlotStatus,
    SlotView,
};

use crate::{LobbyConfig, LobbyError, LobbyPhase};

/// One seat. The occupant, display name and ready flag change together.
#[derive(Debug, Clone)]
struct Slot {
    label: String,
    occupant: Option<ParticipantId>,
    display_name: Option<String>,
    ready: bool,
}

impl Slot {
    fn clear(&mut self) {
        self.occupant = None;
        self.display_name = None;
        self.ready = false;
    }

    fn is_held_by(&self, participant: &ParticipantId) -> bool {
        self.occupant.as_ref() == Some(participant)
    }
}

#[derive(Debug)]
struct Inner {
    slots: Vec<Slot>,
    connected: BTreeSet<ParticipantId>,
    phase: LobbyPhase,
}

impl Inner {
    fn slot_of(&self, participant: &ParticipantId) -> Option<usize> {
        self.slots.iter().position(|s| s.is_held_by(participant))
    }

    fn assigned(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.occupant.is_some())
    }
}

/// A fixed-size table of seats plus the set of connected participants.
///
/// Shared between the host's per-connection tasks behind an `Arc`.
#[derive(Debug)]
pub struct Lobby {
    config: LobbyConfig,
    inner: Mutex<Inner>,
}

impl Lobby {
    pub fn new(config: LobbyConfig) -> Self {
        let slots = (0..config.max_players)
            .map(|i| Slot {
                label: config.label_for(i),
                occupant: None,
                display_name: None,
                ready: false,
            })
            .collect();
        Self {
            inner: Mutex::new(Inner {
                slots,
                connected: BTreeSet::new(),
                phase: LobbyPhase::Waiting,
            }),
            config,
        }
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Trims and truncates `name`; an empty result falls back to `label`.
    fn display_name(&self, name: &str, label: &str) -> String {
        let trimmed: String = name
            .trim()
            .chars()
            .take(self.config.name_max_chars)
            .collect();
        // Truncation can expose trailing whitespace.
        let trimmed = trimmed.trim_end();
        if trimmed.is_empty() {
            label.to_string()
        } else {
            trimmed.to_string()
        }
    }

    // -- Presence ---------------------------------------------------------

    /// Records a newly connected participant. Returns `false` if it was
    /// already known.
    pub fn connect(&self, participant: ParticipantId) -> bool {
        self.lock().connected.insert(participant)
    }

    /// Forgets a participant and frees its seat. Returns the freed seat.
    pub fn disconnect(&self, participant: &ParticipantId) -> Option<usize> {
        let mut inner = self.lock();
        inner.connected.remove(participant);
        let index = inner.slot_of(participant)?;
        inner.slots[index].clear();
        tracing::info!(%participant, slot = index, "seat freed on disconnect");
        Some(index)
    }

    pub fn connected_count(&self) -> usize {
        self.lock().connected.len()
    }

    // -- Seats ------------------------------------------------------------

    /// Seats `participant` at `index` under `name`.
    ///
    /// Fails without mutating if the seat does not exist or is held by
    /// someone else. Re-claiming one's own seat succeeds and clears the
    /// ready flag; claiming a different seat releases the old one first.
    pub fn assign_slot(
        &self,
        participant: &ParticipantId,
        index: usize,
        name: &str,
    ) -> bool {
        self.assign_locked(&mut self.lock(), participant, index, name)
            .is_some()
    }

    /// Seats under an already-held lock; returns the display name used.
    fn assign_locked(
        &self,
        inner: &mut Inner,
        participant: &ParticipantId,
        index: usize,
        name: &str,
    ) -> Option<String> {
        let target = inner.slots.get(index)?;
        if target.occupant.as_ref().is_some_and(|o| o != participant) {
            return None;
        }
        let display = self.display_name(name, &target.label);

        if let Some(previous) = inner.slot_of(participant) {
            if previous != index {
                inner.slots[previous].clear();
            }
        }
        let slot = &mut inner.slots[index];
        slot.occupant = Some(participant.clone());
        slot.display_name = Some(display.clone());
        slot.ready = false;
        Some(display)
    }

    /// Frees whatever seat `participant` holds.
    pub fn release_slot(&self, participant: &ParticipantId) -> bool {
        let mut inner = self.lock();
        match inner.slot_of(participant) {
            Some(index) => {
                inner.slots[index].clear();
                true
            }
            None => false,
        }
    }

    /// Frees seat `index` regardless of who holds it.
    pub fn release_slot_at(&self, index: usize) -> bool {
        let mut inner = self.lock();
        match inner.slots.get_mut(index) {
            Some(slot) if slot.occupant.is_some() => {
                slot.clear();
                true
            }
            _ => false,
        }
    }

    /// Sets the ready flag of `participant`'s seat. Returns `true` only if
    /// the flag actually changed.
    pub fn set_ready(&self, participant: &ParticipantId, ready: bool) -> bool {
        let mut inner = self.lock();
        let Some(index) = inner.slot_of(participant) else {
            return false;
        };
        let slot = &mut inner.slots[index];
        if slot.ready == ready {
            return false;
        }
        slot.ready = ready;
        true
    }

    /// `true` iff every taken seat is ready. Vacuously true when empty.
    pub fn all_assigned_ready(&self) -> bool {
        self.lock().assigned().all(|s| s.ready)
    }

    pub fn slot_of(&self, participant: &ParticipantId) -> Option<usize> {
        self.lock().slot_of(participant)
    }

    pub fn occupant(&self, index: usize) -> Option<ParticipantId> {
        self.lock().slots.get(index)?.occupant.clone()
    }

    pub fn assigned_count(&self) -> usize {
        self.lock().assigned().count()
    }

    /// The broadcastable projection. Participant ids stay on the host.
    pub fn to_view(&self) -> LobbyStateView {
        let inner = self.lock();
        let spectators = inner
            .connected
            .iter()
            .filter(|p| inner.slot_of(p).is_none())
            .count();
        LobbyStateView {
            max_players: inner.slots.len(),
            spectators,
            game_in_progress: inner.phase == LobbyPhase::InProgress,
            slots: inner
                .slots
                .iter()
                .map(|s| SlotView {
                    label: s.label.clone(),
                    occupied: s.occupant.is_some(),
                    ready: s.ready,
                    occupant_name: s.display_name.clone(),
                })
                .collect(),
        }
    }

    // -- Requests ---------------------------------------------------------

    /// Answers a remote's `SLOT_REQUEST`.
    pub fn handle_request(
        &self,
        participant: &ParticipantId,
        request: &SlotRequest,
    ) -> SlotAssignment {
        let denied = |note: &str| SlotAssignment {
            slot: request.slot,
            name: request.name.clone(),
            status: SlotStatus::Denied,
            note: Some(note.to_string()),
        };

        let mut inner = self.lock();
        if !inner.phase.accepts_requests() {
            return denied("game already in progress");
        }

        let Some(index) = request.slot else {
            let Some(index) = inner.slot_of(participant) else {
                return denied("no seat held");
            };
            let slot = &mut inner.slots[index];
            let name = slot.display_name.take().unwrap_or_default();
            slot.clear();
            tracing::info!(%participant, slot = index, "seat released");
            return SlotAssignment {
                slot: Some(index),
                name,
                status: SlotStatus::Released,
                note: None,
            };
        };

        if index >= inner.slots.len() {
            return denied("no such seat");
        }
        let Some(name) =
            self.assign_locked(&mut inner, participant, index, &request.name)
        else {
            tracing::debug!(%participant, slot = index, "seat request denied");
            return denied("seat already taken");
        };

        tracing::info!(%participant, slot = index, %name, "seat assigned");
        SlotAssignment {
            slot: Some(index),
            name,
            status: SlotStatus::Assigned,
            note: None,
        }
    }

    // -- Phase ------------------------------------------------------------

    pub fn phase(&self) -> LobbyPhase {
        self.lock().phase
    }

    /// Moves to [`LobbyPhase::InProgress`] once every taken seat is ready.
    pub fn start_game(&self) -> Result<(), LobbyError> {
        let mut inner = self.lock();
        if !inner.phase.can_transition_to(LobbyPhase::InProgress) {
            return Err(LobbyError::InvalidPhase(inner.phase));
        }
        let seated = inner.assigned().count();
        if seated == 0 {
            return Err(LobbyError::NoPlayers);
        }
        let not_ready = inner.assigned().filter(|s| !s.ready).count();
        if not_ready > 0 {
            return Err(LobbyError::NotAllReady(not_ready));
        }
        inner.phase = LobbyPhase::InProgress;
        tracing::info!(players = seated, "game started");
        Ok(())
    }

    /// Returns to seating. Seats are kept; ready flags are cleared.
    pub fn end_game(&self) -> Result<(), LobbyError> {
        let mut inner = self.lock();
        if !inner.phase.can_transition_to(LobbyPhase::Waiting) {
            return Err(LobbyError::InvalidPhase(inner.phase));
        }
        inner.phase = LobbyPhase::Waiting;
        for slot in &mut inner.slots {
            slot.ready = false;
        }
        tracing::info!("game ended, lobby reopened");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u16) -> ParticipantId {
        ParticipantId::new(format!("10.0.0.{n}:4000"))
    }

    fn lobby() -> Lobby {
        Lobby::new(LobbyConfig::default())
    }

    #[test]
    fn test_assign_empty_slot() {
        let lobby = lobby();
        assert!(lobby.assign_slot(&pid(1), 1, "Kim"));
        assert_eq!(lobby.slot_of(&pid(1)), Some(1));
        assert_eq!(lobby.occupant(1), Some(pid(1)));
    }

    #[test]
    fn test_assign_taken_slot_fails_without_mutation() {
        let lobby = lobby();
        assert!(lobby.assign_slot(&pid(1), 0, "Kim"));
        assert!(lobby.set_ready(&pid(1), true));
        let before = lobby.to_view();

        assert!(!lobby.assign_slot(&pid(2), 0, "Lee"));
        assert_eq!(lobby.to_view(), before);
        assert_eq!(lobby.slot_of(&pid(2)), None);
    }

    #[test]
    fn test_reassign_same_slot_clears_ready_and_renames() {
        let lobby = lobby();
        lobby.assign_slot(&pid(1), 2, "Kim");
        lobby.set_ready(&pid(1), true);
        assert!(lobby.assign_slot(&pid(1), 2, "Kimberly"));

        let view = lobby.to_view();
        assert!(!view.slots[2].ready);
        assert_eq!(view.slots[2].occupant_name.as_deref(), Some("Kimberly"));
    }

    #[test]
    fn test_move_to_other_slot_releases_previous() {
        let lobby = lobby();
        lobby.assign_slot(&pid(1), 0, "Kim");
        lobby.set_ready(&pid(1), true);
        assert!(lobby.assign_slot(&pid(1), 3, "Kim"));

        let view = lobby.to_view();
        assert!(!view.slots[0].occupied);
        assert!(!view.slots[0].ready);
        assert_eq!(view.slots[0].occupant_name, None);
        assert!(view.slots[3].occupied);
        assert_eq!(lobby.assigned_count(), 1);
    }

    #[test]
    fn test_out_of_range_slot_fails() {
        assert!(!lobby().assign_slot(&pid(1), 4, "Kim"));
    }

    #[test]
    fn test_name_trimmed_and_truncated() {
        let lobby = lobby();
        lobby.assign_slot(&pid(1), 0, "   abcdefghijklmnopqrstuvwxyz  ");
        let view = lobby.to_view();
        assert_eq!(
            view.slots[0].occupant_name.as_deref(),
            Some("abcdefghijklmnop")
        );
    }

    #[test]
    fn test_name_truncation_counts_characters() {
        let lobby = lobby();
        let name = "가".repeat(20);
        lobby.assign_slot(&pid(1), 0, &name);
        let shown = lobby.to_view().slots[0].occupant_name.clone().unwrap();
        assert_eq!(shown.chars().count(), 16);
    }

    #[test]
    fn test_empty_name_falls_back_to_label() {
        let lobby = lobby();
        lobby.assign_slot(&pid(1), 1, "   ");
        let view = lobby.to_view();
        assert_eq!(view.slots[1].occupant_name.as_deref(), Some("Player 2"));
    }

    #[test]
    fn test_release_resets_all_fields_together() {
        let lobby = lobby();
        lobby.assign_slot(&pid(1), 1, "Kim");
        lobby.set_ready(&pid(1), true);
        assert!(lobby.release_slot(&pid(1)));

        let slot = &lobby.to_view().slots[1];
        assert!(!slot.occupied);
        assert!(!slot.ready);
        assert_eq!(slot.occupant_name, None);
        assert_eq!(lobby.occupant(1), None);
    }

    #[test]
    fn test_release_when_nothing_assigned() {
        let lobby = lobby();
        assert!(!lobby.release_slot(&pid(1)));
        assert!(!lobby.release_slot_at(0));
        assert!(!lobby.release_slot_at(99));
    }

    #[test]
    fn test_release_slot_at_evicts() {
        let lobby = lobby();
        lobby.assign_slot(&pid(1), 0, "Kim");
        assert!(lobby.release_slot_at(0));
        assert_eq!(lobby.slot_of(&pid(1)), None);
    }

    #[test]
    fn test_set_ready_reports_change() {
        let lobby = lobby();
        assert!(!lobby.set_ready(&pid(1), true));
        lobby.assign_slot(&pid(1), 0, "Kim");
        assert!(!lobby.set_ready(&pid(1), false));
        assert!(lobby.set_ready(&pid(1), true));
        assert!(!lobby.set_ready(&pid(1), true));
        assert!(lobby.set_ready(&pid(1), false));
    }

    #[test]
    fn test_all_assigned_ready() {
        let lobby = lobby();
        assert!(lobby.all_assigned_ready());
        lobby.assign_slot(&pid(1), 0, "A");
        lobby.assign_slot(&pid(2), 1, "B");
        assert!(!lobby.all_assigned_ready());
        lobby.set_ready(&pid(1), true);
        assert!(!lobby.all_assigned_ready());
        lobby.set_ready(&pid(2), true);
        assert!(lobby.all_assigned_ready());
    }

    #[test]
    fn test_view_counts_spectators() {
        let lobby = lobby();
        for n in 1..=3 {
            lobby.connect(pid(n));
        }
        lobby.assign_slot(&pid(1), 0, "A");
        let view = lobby.to_view();
        assert_eq!(view.max_players, 4);
        assert_eq!(view.spectators, 2);
        assert!(!view.game_in_progress);
    }

    #[test]
    fn test_disconnect_frees_seat() {
        let lobby = lobby();
        lobby.connect(pid(1));
        lobby.assign_slot(&pid(1), 2, "Kim");
        assert_eq!(lobby.disconnect(&pid(1)), Some(2));
        assert_eq!(lobby.connected_count(), 0);
        assert!(!lobby.to_view().slots[2].occupied);
        assert_eq!(lobby.disconnect(&pid(1)), None);
    }

    #[test]
    fn test_start_game_gates() {
        let lobby = lobby();
        assert_eq!(lobby.start_game(), Err(LobbyError::NoPlayers));
        lobby.assign_slot(&pid(1), 0, "A");
        lobby.assign_slot(&pid(2), 1, "B");
        lobby.set_ready(&pid(1), true);
        assert_eq!(lobby.start_game(), Err(LobbyError::NotAllReady(1)));
        lobby.set_ready(&pid(2), true);
        assert_eq!(lobby.start_game(), Ok(()));
        assert_eq!(lobby.phase(), LobbyPhase::InProgress);
        assert_eq!(
            lobby.start_game(),
            Err(LobbyError::InvalidPhase(LobbyPhase::InProgress))
        );
    }

    #[test]
    fn test_end_game_clears_ready() {
        let lobby = lobby();
        lobby.assign_slot(&pid(1), 0, "A");
        lobby.set_ready(&pid(1), true);
        lobby.start_game().unwrap();
        lobby.end_game().unwrap();
        assert_eq!(lobby.phase(), LobbyPhase::Waiting);
        assert!(!lobby.to_view().slots[0].ready);
        assert_eq!(lobby.slot_of(&pid(1)), Some(0));
    }
}
