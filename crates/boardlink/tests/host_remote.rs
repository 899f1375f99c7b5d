//! Integration tests for a host and its remotes over real sockets.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use boardlink::prelude::*;
use boardlink::protocol::Message;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast;

// =========================================================================
// Test rules engine
// =========================================================================

/// Rolls a fixed 3+4 and records every action it is handed.
struct TestRules {
    snapshot: Snapshot,
    seen: Arc<Mutex<Vec<(usize, PlayerAction)>>>,
    vacated: Arc<Mutex<Vec<usize>>>,
}

impl SnapshotSource for TestRules {
    fn capture(&self) -> Snapshot {
        self.snapshot.clone()
    }
}

impl RulesEngine for TestRules {
    fn on_action(&mut self, seat: usize, action: PlayerAction) -> bool {
        self.seen.lock().unwrap().push((seat, action));
        match action {
            PlayerAction::RollPress => {
                self.snapshot.dice_roll_sequence += 1;
                self.snapshot.dice1 = 3;
                self.snapshot.dice2 = 4;
                true
            }
            _ => false,
        }
    }

    fn on_seat_vacated(&mut self, seat: usize) -> bool {
        self.vacated.lock().unwrap().push(seat);
        false
    }
}

struct Harness {
    handle: HostHandle<TestRules>,
    addr: String,
    seen: Arc<Mutex<Vec<(usize, PlayerAction)>>>,
    vacated: Arc<Mutex<Vec<usize>>>,
}

async fn start_host() -> Harness {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let vacated = Arc::new(Mutex::new(Vec::new()));
    let rules = TestRules {
        snapshot: Snapshot {
            turn_number: 1,
            players: vec![PlayerSnapshot {
                name: "A".into(),
                cash: 1_500_000,
                position: 0,
                ..PlayerSnapshot::default()
            }],
            ..Snapshot::default()
        },
        seen: Arc::clone(&seen),
        vacated: Arc::clone(&vacated),
    };
    let host = HostBuilder::new()
        .bind("127.0.0.1:0")
        .sync_config(SyncConfig::fast())
        .build(rules)
        .await
        .unwrap();
    let addr = host.local_addr().unwrap().to_string();
    let handle = host.handle();
    tokio::spawn(async move {
        let _ = host.run().await;
    });
    Harness {
        handle,
        addr,
        seen,
        vacated,
    }
}

async fn join(addr: &str) -> RemoteClient {
    let mut remote = RemoteClient::connect(addr, &SyncConfig::fast())
        .await
        .unwrap();
    // The host finishes registration with a lobby broadcast.
    wait_for(&mut remote, |e| matches!(e, RemoteEvent::Lobby(_))).await;
    remote
}

/// Reads events until one matches, failing after two seconds.
async fn wait_for(
    remote: &mut RemoteClient,
    mut pred: impl FnMut(&RemoteEvent) -> bool,
) -> RemoteEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = remote.next_event().await.expect("link ended");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Reads host events until one matches, failing after two seconds.
async fn wait_for_host(
    events: &mut broadcast::Receiver<HostEvent>,
    mut pred: impl FnMut(&HostEvent) -> bool,
) -> HostEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("host stopped"),
            }
        }
    })
    .await
    .expect("timed out waiting for host event")
}

async fn claim(remote: &mut RemoteClient, slot: usize, name: &str) -> SlotAssignment {
    remote.request_slot(slot, name).await.unwrap();
    match wait_for(remote, |e| matches!(e, RemoteEvent::SlotAssignment(_))).await {
        RemoteEvent::SlotAssignment(a) => a,
        _ => unreachable!(),
    }
}

// =========================================================================
// Lobby
// =========================================================================

#[tokio::test]
async fn test_remote_claims_seat_end_to_end() {
    let h = start_host().await;
    let mut kim = join(&h.addr).await;

    let assignment = claim(&mut kim, 1, "Kim").await;
    assert_eq!(assignment.slot, Some(1));
    assert_eq!(assignment.name, "Kim");
    assert_eq!(assignment.status, SlotStatus::Assigned);

    let event = wait_for(&mut kim, |e| {
        matches!(e, RemoteEvent::Lobby(v) if v.slots[1].occupied)
    })
    .await;
    let RemoteEvent::Lobby(view) = event else {
        unreachable!()
    };
    assert_eq!(view.slots[1].occupant_name.as_deref(), Some("Kim"));
    assert_eq!(view.spectators, 0);

    let view = h.handle.lobby_view();
    assert_eq!(view.slots[1].label, "Player 2");
    assert!(view.slots[1].occupied);
}

#[tokio::test]
async fn test_taken_seat_is_denied_to_second_remote() {
    let h = start_host().await;
    let mut a = join(&h.addr).await;
    let mut b = join(&h.addr).await;

    assert_eq!(claim(&mut a, 0, "Ana").await.status, SlotStatus::Assigned);
    let denied = claim(&mut b, 0, "Bo").await;
    assert_eq!(denied.status, SlotStatus::Denied);
    assert_eq!(denied.note.as_deref(), Some("seat already taken"));
}

#[tokio::test]
async fn test_start_game_requires_ready_seats() {
    let h = start_host().await;
    let err = h.handle.start_game().await.unwrap_err();
    assert!(matches!(err, BoardlinkError::Lobby(LobbyError::NoPlayers)));

    let mut a = join(&h.addr).await;
    claim(&mut a, 0, "Ana").await;
    let err = h.handle.start_game().await.unwrap_err();
    assert!(matches!(err, BoardlinkError::Lobby(LobbyError::NotAllReady(1))));

    a.set_ready(true).await.unwrap();
    wait_for(&mut a, |e| matches!(e, RemoteEvent::Lobby(v) if v.slots[0].ready)).await;
    h.handle.start_game().await.unwrap();
    wait_for(&mut a, |e| matches!(e, RemoteEvent::Lobby(v) if v.game_in_progress)).await;

    let mut late = join(&h.addr).await;
    let denied = claim(&mut late, 1, "Cy").await;
    assert_eq!(denied.status, SlotStatus::Denied);
    assert_eq!(denied.note.as_deref(), Some("game already in progress"));
}

#[tokio::test]
async fn test_disconnect_frees_seat() {
    let h = start_host().await;
    let mut events = h.handle.subscribe();
    let mut a = join(&h.addr).await;
    let mut watcher = join(&h.addr).await;
    claim(&mut a, 0, "Ana").await;
    wait_for(&mut watcher, |e| matches!(e, RemoteEvent::Lobby(v) if v.slots[0].occupied)).await;

    a.disconnect().await;
    wait_for(&mut watcher, |e| {
        matches!(e, RemoteEvent::Lobby(v) if !v.slots[0].occupied)
    })
    .await;

    let left = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(HostEvent::Left { seat, .. }) = events.recv().await {
                return seat;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(left, Some(0));
    assert_eq!(*h.vacated.lock().unwrap(), vec![0]);
}

// =========================================================================
// Actions and snapshots
// =========================================================================

#[tokio::test]
async fn test_snapshot_mirrors_with_first_roll_animation() {
    let h = start_host().await;
    let mut remote = RemoteClient::connect(&h.addr, &SyncConfig::fast())
        .await
        .unwrap();
    let mut mirror = SnapshotMirror::new();
    let mut board = MirroredBoard::default();

    let RemoteEvent::Snapshot(initial) =
        wait_for(&mut remote, |e| matches!(e, RemoteEvent::Snapshot(_))).await
    else {
        unreachable!()
    };
    assert_eq!(mirror.apply(&initial, &mut board), DiceRender::Idle);

    claim(&mut remote, 0, "Ana").await;
    remote.send_action(PlayerAction::RollPress).await.unwrap();
    let RemoteEvent::Snapshot(rolled) =
        wait_for(&mut remote, |e| matches!(e, RemoteEvent::Snapshot(_))).await
    else {
        unreachable!()
    };
    assert_eq!(rolled.dice_roll_sequence, 1);
    assert_eq!(
        mirror.apply(&rolled, &mut board),
        DiceRender::Animate { dice1: 3, dice2: 4 }
    );
    assert_eq!(board.players[0].cash, 1_500_000);
    assert_eq!(board.players[0].position, 0);
    assert_eq!(*h.seen.lock().unwrap(), vec![(0, PlayerAction::RollPress)]);
}

#[tokio::test]
async fn test_unseated_action_is_dropped() {
    let h = start_host().await;
    let mut remote = join(&h.addr).await;

    remote.send_action(PlayerAction::RollPress).await.unwrap();
    // Messages on one link are handled in order, so the reply to this
    // request means the action has already been routed.
    claim(&mut remote, 0, "Ana").await;
    assert!(h.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_latest_snapshot_coalesces() {
    let h = start_host().await;
    let mut remote = join(&h.addr).await;

    for turn in 2..=4 {
        let changed = h
            .handle
            .update(move |rules| {
                rules.snapshot.turn_number = turn;
                true
            })
            .await
            .unwrap();
        assert!(changed);
    }
    h.handle.broadcast_log("done").await.unwrap();

    let mut latest = None;
    for _ in 0..100 {
        if let Some(snapshot) = remote.latest_snapshot() {
            latest = Some(snapshot);
        }
        if latest.as_ref().is_some_and(|s| s.turn_number == 4) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(latest.map(|s| s.turn_number), Some(4));

    // Non-snapshot events stay queued.
    let event = wait_for(&mut remote, |e| matches!(e, RemoteEvent::Log(_))).await;
    assert_eq!(event, RemoteEvent::Log("done".into()));
}

// =========================================================================
// Dialogs and logs
// =========================================================================

#[tokio::test]
async fn test_dialog_goes_to_seat_owner_and_syncs_everyone() {
    let h = start_host().await;
    let mut events = h.handle.subscribe();
    let mut owner = join(&h.addr).await;
    let mut watcher = join(&h.addr).await;
    claim(&mut owner, 0, "Ana").await;

    let command = DialogCommand {
        id: 7,
        kind: DialogKind::Purchase,
        action: DialogAction::Open,
        title: "Buy Seoul?".into(),
        body: "200,000".into(),
        tile: Some(39),
    };
    let err = h.handle.open_dialog(2, command.clone()).await.unwrap_err();
    assert!(matches!(err, BoardlinkError::EmptySeat(2)));

    h.handle.open_dialog(0, command.clone()).await.unwrap();
    let event = wait_for(&mut owner, |e| matches!(e, RemoteEvent::DialogCommand(_))).await;
    assert_eq!(event, RemoteEvent::DialogCommand(command));

    let RemoteEvent::DialogSync(sync) = wait_for(&mut watcher, |e| {
        matches!(e, RemoteEvent::DialogSync(s) if s.dialog.is_some())
    })
    .await
    else {
        unreachable!()
    };
    let view = sync.dialog.unwrap();
    assert_eq!(view.id, 7);
    assert_eq!(view.owner, Some(0));

    owner
        .respond_dialog(7, DialogKind::Purchase, DialogChoice::Accept, None)
        .await
        .unwrap();
    wait_for(&mut watcher, |e| {
        matches!(e, RemoteEvent::DialogSync(s) if s.dialog.is_none())
    })
    .await;

    let answered = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(HostEvent::DialogAnswered { seat, response, .. }) = events.recv().await {
                return (seat, response.choice);
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(answered, (0, DialogChoice::Accept));
}

#[tokio::test]
async fn test_log_entry_reaches_every_remote() {
    let h = start_host().await;
    let mut a = join(&h.addr).await;
    let mut b = join(&h.addr).await;

    h.handle.broadcast_log("Ana rolled 7").await.unwrap();
    for remote in [&mut a, &mut b] {
        let event = wait_for(remote, |e| matches!(e, RemoteEvent::Log(_))).await;
        assert_eq!(event, RemoteEvent::Log("Ana rolled 7".into()));
    }
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_host_shutdown_disconnects_remote() {
    let h = start_host().await;
    let mut remote = join(&h.addr).await;
    assert_eq!(h.handle.participant_count().await.unwrap(), 1);

    h.handle.shutdown().await;
    let event = wait_for(&mut remote, |e| matches!(e, RemoteEvent::Disconnected { .. })).await;
    let RemoteEvent::Disconnected { reason } = event else {
        unreachable!()
    };
    assert!(!reason.is_empty());
    assert!(remote.next_event().await.is_none());
    assert!(!remote.is_connected());
}

#[tokio::test]
async fn test_remote_that_stops_reading_does_not_stall_host() {
    let h = start_host().await;
    let mut events = h.handle.subscribe();

    // Handshakes and keeps heartbeating, but never reads.
    let mut raw = TcpStream::connect(&h.addr).await.unwrap();
    let hello = format!("{}\n", Message::hello("1").to_line());
    raw.write_all(hello.as_bytes()).await.unwrap();
    let beats = tokio::spawn(async move {
        let beat = format!("{}\n", Message::heartbeat().to_line());
        while raw.write_all(beat.as_bytes()).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });
    wait_for_host(&mut events, |e| matches!(e, HostEvent::Joined { .. })).await;

    let chunk = "x".repeat(64 * 1024);
    for _ in 0..1_000 {
        h.handle.broadcast_log(chunk.clone()).await.unwrap();
    }
    tokio::time::timeout(Duration::from_secs(2), h.handle.participant_count())
        .await
        .expect("host should keep answering")
        .unwrap();

    let left = wait_for_host(&mut events, |e| matches!(e, HostEvent::Left { .. })).await;
    let HostEvent::Left { reason, .. } = left else {
        unreachable!()
    };
    assert_eq!(reason, "remote stopped reading");
    assert_eq!(h.handle.participant_count().await.unwrap(), 0);
    beats.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_left_follows_a_joined() {
    let h = start_host().await;
    let mut events = h.handle.subscribe();

    // Remotes that leave as soon as the handshake is done race their own
    // registration.
    let mut tasks = Vec::new();
    for _ in 0..16 {
        let addr = h.addr.clone();
        tasks.push(tokio::spawn(async move {
            if let Ok(remote) = RemoteClient::connect(&addr, &SyncConfig::fast()).await {
                remote.disconnect().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    tokio::time::timeout(Duration::from_secs(2), async {
        while h.handle.participant_count().await.unwrap() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("every remote should be gone");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut joined = HashSet::new();
    let mut left = HashSet::new();
    while let Ok(event) = events.try_recv() {
        match event {
            HostEvent::Joined { participant } => {
                joined.insert(participant);
            }
            HostEvent::Left { participant, .. } => {
                assert!(
                    joined.contains(&participant),
                    "{participant} left without joining"
                );
                left.insert(participant);
            }
            _ => {}
        }
    }
    assert_eq!(joined, left);
}

#[tokio::test]
async fn test_version_mismatch_is_rejected() {
    let h = start_host().await;
    let config = SyncConfig {
        protocol_version: "2".into(),
        ..SyncConfig::fast()
    };
    let err = RemoteClient::connect(&h.addr, &config).await.err().unwrap();
    assert!(
        err.to_string().contains("version mismatch"),
        "unexpected error: {err}"
    );
}
