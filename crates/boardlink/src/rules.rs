//! The seam between the sync core and the game's rules engine.

use boardlink_protocol::{DialogResponse, PlayerAction};
use boardlink_snapshot::SnapshotSource;

/// The authoritative game the host runs.
///
/// The host calls these from its single orchestration task, so
/// implementations need no locking. Each input method returns `true` when
/// authoritative state changed; the host then captures and broadcasts a
/// fresh snapshot. Which actions are legal is entirely the engine's call.
pub trait RulesEngine: SnapshotSource + Send + 'static {
    /// A seated participant pressed something.
    fn on_action(&mut self, seat: usize, action: PlayerAction) -> bool;

    /// A seated participant answered a dialog.
    fn on_dialog_response(
        &mut self,
        _seat: usize,
        _response: &DialogResponse,
    ) -> bool {
        false
    }

    /// The lobby moved to in-progress with these seats taken.
    fn on_game_started(&mut self, _seats: &[usize]) -> bool {
        false
    }

    /// A seated participant disconnected.
    fn on_seat_vacated(&mut self, _seat: usize) -> bool {
        false
    }
}
