//! End-to-end checks of the wire format: typed payload → message → line
//! and back, exactly as a peer would see it.

use boardlink_protocol::{
    LobbyStateView, Message, MessageKind, PlayerAction, ReadyStatus,
    SlotAssignment, SlotRequest, SlotStatus, SlotView, WirePayload, frame,
};

fn through_the_wire(msg: &Message) -> Message {
    let line = frame::encode(msg);
    assert!(!line.contains('\n'));
    frame::decode(&line).expect("line should decode")
}

#[test]
fn test_handshake_lines_match_documented_form() {
    assert_eq!(Message::hello("1").to_line(), "HELLO|MQ==");
    assert_eq!(Message::welcome("1").to_line(), "WELCOME|MQ==");
    assert_eq!(Message::heartbeat().to_line(), "HEARTBEAT|");

    let reject = Message::reject("version mismatch");
    let back = through_the_wire(&reject);
    assert_eq!(back.kind, MessageKind::Reject);
    assert_eq!(back.payload_str(), "version mismatch");
}

#[test]
fn test_slot_request_survives_framing_with_awkward_name() {
    let req = SlotRequest::claim(1, "K=im\nbreak|pipe\\");
    let back = through_the_wire(&req.to_message());
    assert_eq!(back.decode_payload::<SlotRequest>(), Ok(req));
}

#[test]
fn test_slot_assignment_and_lobby_view_over_the_wire() {
    let assignment = SlotAssignment {
        slot: Some(0),
        name: "Park".into(),
        status: SlotStatus::Assigned,
        note: None,
    };
    let back = through_the_wire(&assignment.to_message());
    assert_eq!(back.decode_payload::<SlotAssignment>(), Ok(assignment));

    let view = LobbyStateView {
        max_players: 1,
        spectators: 0,
        game_in_progress: true,
        slots: vec![SlotView {
            label: "Seat = one".into(),
            occupied: true,
            ready: false,
            occupant_name: Some("Park".into()),
        }],
    };
    let back = through_the_wire(&view.to_message());
    assert_eq!(back.decode_payload::<LobbyStateView>(), Ok(view));
}

#[test]
fn test_ready_and_action_over_the_wire() {
    let back = through_the_wire(&ReadyStatus { ready: true }.to_message());
    assert_eq!(back.decode_payload::<ReadyStatus>(), Ok(ReadyStatus { ready: true }));

    let back = through_the_wire(&PlayerAction::ToggleOdd.to_message());
    assert_eq!(back.decode_payload::<PlayerAction>(), Ok(PlayerAction::ToggleOdd));
}

#[test]
fn test_wrong_kind_is_rejected_by_typed_decode() {
    let msg = ReadyStatus { ready: true }.to_message();
    assert!(msg.decode_payload::<SlotRequest>().is_err());
}
