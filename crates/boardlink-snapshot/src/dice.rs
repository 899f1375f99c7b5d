//! Dice-roll presentation, decoupled from state transport.
//!
//! Snapshots arrive whenever anything changes, so "a snapshot arrived" is
//! not "the dice were rolled". The host bumps `dice_roll_sequence` once per
//! roll; the remote compares it with the last sequence it rendered and
//! animates only when it moved.

use boardlink_protocol::WirePayload;

use crate::mirror::{MirrorTarget, apply};
use crate::Snapshot;

/// How the remote should draw the dice for one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceRender {
    /// No roll has happened yet in this session.
    Idle,
    /// Same roll as before: draw the faces without animating.
    Static { dice1: u8, dice2: u8 },
    /// A new roll: play the animation, landing on these faces.
    Animate { dice1: u8, dice2: u8 },
}

/// Remembers the last rendered roll sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiceTracker {
    last_sequence: u64,
}

impl DiceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Decides how to draw `snapshot`'s dice and records its sequence.
    pub fn observe(&mut self, snapshot: &Snapshot) -> DiceRender {
        let seq = snapshot.dice_roll_sequence;
        let (dice1, dice2) = (snapshot.dice1, snapshot.dice2);
        if seq == 0 {
            return DiceRender::Idle;
        }
        if seq == self.last_sequence {
            return DiceRender::Static { dice1, dice2 };
        }
        self.last_sequence = seq;
        DiceRender::Animate { dice1, dice2 }
    }
}

/// The remote's snapshot consumer: applies state and tracks dice.
#[derive(Debug, Default)]
pub struct SnapshotMirror {
    dice: DiceTracker,
    applied: u64,
}

impl SnapshotMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `snapshot` to `target` and says how to draw the dice.
    pub fn apply(
        &mut self,
        snapshot: &Snapshot,
        target: &mut impl MirrorTarget,
    ) -> DiceRender {
        apply(snapshot, target);
        self.applied += 1;
        self.dice.observe(snapshot)
    }

    /// Decodes a `STATE_SNAPSHOT` payload and applies it.
    ///
    /// A payload that fails to decode leaves `target` untouched.
    pub fn apply_payload(
        &mut self,
        payload: &str,
        target: &mut impl MirrorTarget,
    ) -> Result<DiceRender, boardlink_protocol::ProtocolError> {
        let snapshot = Snapshot::decode_payload(payload)?;
        Ok(self.apply(&snapshot, target))
    }

    /// Number of snapshots applied so far.
    pub fn applied_count(&self) -> u64 {
        self.applied
    }

    pub fn dice(&self) -> &DiceTracker {
        &self.dice
    }
}
