use std::time::Duration;

use boardlink::prelude::*;
use rand::Rng;

const BOARD_TILES: u32 = 32;
const START_CASH: i64 = 1_500_000;
const SALARY: i64 = 200_000;
const LAST_TURN: u32 = 8;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Roll and move. Passing the start tile pays a salary.
#[derive(Default)]
struct DiceRace {
    state: Snapshot,
    /// Seat of each entry in `state.players`.
    seats: Vec<usize>,
}

impl DiceRace {
    fn current_seat(&self) -> Option<usize> {
        self.seats.get(self.state.current_player_index).copied()
    }

    fn advance_turn(&mut self) {
        let count = self.state.players.len();
        if count == 0 {
            return;
        }
        for step in 1..=count {
            let next = (self.state.current_player_index + step) % count;
            if !self.state.players[next].bankrupt {
                self.state.current_player_index = next;
                break;
            }
        }
        self.state.turn_number += 1;
        self.state.buttons.roll = self.state.turn_number <= LAST_TURN;
    }
}

impl SnapshotSource for DiceRace {
    fn capture(&self) -> Snapshot {
        self.state.clone()
    }
}

impl RulesEngine for DiceRace {
    fn on_action(&mut self, seat: usize, action: PlayerAction) -> bool {
        if self.current_seat() != Some(seat) || !self.state.buttons.roll {
            return false;
        }
        if action != PlayerAction::RollPress {
            return false;
        }
        let mut rng = rand::rng();
        let (d1, d2) = (rng.random_range(1..=6u8), rng.random_range(1..=6u8));
        self.state.dice1 = d1;
        self.state.dice2 = d2;
        self.state.dice_roll_sequence += 1;

        let player = &mut self.state.players[self.state.current_player_index];
        let target = player.position + u32::from(d1 + d2);
        if target >= BOARD_TILES {
            player.cash += SALARY;
        }
        player.position = target % BOARD_TILES;
        tracing::info!(seat, d1, d2, position = player.position, "rolled");

        self.advance_turn();
        true
    }

    fn on_game_started(&mut self, seats: &[usize]) -> bool {
        self.seats = seats.to_vec();
        self.state = Snapshot {
            turn_number: 1,
            players: seats
                .iter()
                .map(|seat| PlayerSnapshot {
                    name: format!("Player {}", seat + 1),
                    cash: START_CASH,
                    ..PlayerSnapshot::default()
                })
                .collect(),
            ..Snapshot::default()
        };
        self.state.buttons.roll = true;
        true
    }

    fn on_seat_vacated(&mut self, seat: usize) -> bool {
        let Some(index) = self.seats.iter().position(|&s| s == seat) else {
            return false;
        };
        self.state.players[index].bankrupt = true;
        if self.state.current_player_index == index {
            self.advance_turn();
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Remote player
// ---------------------------------------------------------------------------

async fn play(addr: String, seat: usize, name: &'static str) -> Result<(), BoardlinkError> {
    let mut remote = RemoteClient::connect(&addr, &SyncConfig::default()).await?;
    remote.request_slot(seat, name).await?;

    let mut mirror = SnapshotMirror::new();
    let mut board = MirroredBoard::default();
    while let Some(event) = remote.next_event().await {
        match event {
            RemoteEvent::SlotAssignment(assignment) => {
                tracing::info!(name, status = ?assignment.status, "seat answer");
                if assignment.status == SlotStatus::Assigned {
                    remote.set_ready(true).await?;
                }
            }
            RemoteEvent::Snapshot(snapshot) => {
                if let DiceRender::Animate { dice1, dice2 } = mirror.apply(&snapshot, &mut board) {
                    tracing::info!(name, dice1, dice2, "dice animation");
                }
                if board.turn_number > LAST_TURN {
                    break;
                }
                let my_turn = board.current_player_index == seat;
                if my_turn && board.buttons.roll {
                    remote.send_action(PlayerAction::RollPress).await?;
                }
            }
            RemoteEvent::Log(line) => tracing::info!(name, %line, "host log"),
            RemoteEvent::Disconnected { reason } => {
                tracing::warn!(name, %reason, "disconnected");
                return Ok(());
            }
            _ => {}
        }
    }

    for player in &board.players {
        tracing::info!(
            viewer = name,
            player = %player.name,
            cash = player.cash,
            position = player.position,
            "final board"
        );
    }
    remote.disconnect().await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let host = HostBuilder::new()
        .bind("127.0.0.1:0")
        .lobby_config(LobbyConfig {
            max_players: 2,
            ..LobbyConfig::default()
        })
        .build(DiceRace::default())
        .await?;
    let addr = host.local_addr()?.to_string();
    let handle = host.handle();
    tokio::spawn(host.run());

    let players = [
        tokio::spawn(play(addr.clone(), 0, "Ana")),
        tokio::spawn(play(addr.clone(), 1, "Bo")),
    ];

    // Wait for a full table before starting.
    while !handle
        .lobby_view()
        .slots
        .iter()
        .all(|slot| slot.occupied && slot.ready)
    {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    handle.start_game().await?;
    handle.broadcast_log("game on").await?;

    for player in players {
        player.await??;
    }
    handle.shutdown().await;
    Ok(())
}
