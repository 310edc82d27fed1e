//! Dispatcher behaviour for unknown routes, unauthenticated access and
//! failing handlers. None of these may cost the client its connection, so
//! each scenario follows up with an ordinary request on the same session.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use blaze_protocol::core::label::Label;
use blaze_protocol::core::packet::{Packet, PacketHeader, PacketType};
use blaze_protocol::core::tdf::Tdf;
use blaze_protocol::protocol::components::{game_manager, util, BlazeErrorCode};
use blaze_protocol::protocol::handlers;
use blaze_protocol::protocol::{Dispatcher, HandlerError};
use blaze_protocol::session::Session;
use blaze_protocol::state::ServerState;
use blaze_protocol::store::Player;

const PANIC_COMPONENT: u16 = 0x7F;

fn dispatcher_with_faulty_routes() -> Dispatcher {
    handlers::register(Dispatcher::builder())
        .route(PANIC_COMPONENT, 1, |_, _, _| panic!("handler blew up"))
        .route(PANIC_COMPONENT, 2, |_, _, _| {
            Err(HandlerError::Internal("collaborator timed out".into()))
        })
        .route(PANIC_COMPONENT, 3, |_, _, packet| {
            Ok(vec![
                Packet::response(packet, vec![Tdf::varint(Label::from_static("SEQ"), 1)]),
                Packet::notify(PANIC_COMPONENT, 0x30, vec![]),
            ])
        })
        .build()
}

fn ping(id: u16) -> Packet {
    Packet::request(util::COMPONENT, util::PING, id, vec![])
}

fn assert_ping_reply(replies: &[Packet], id: u16) {
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].header.ty, PacketType::Response);
    assert_eq!(replies[0].header.id, id);
    assert!(!replies[0].contents().is_empty());
}

fn session(state: &ServerState) -> Arc<Session> {
    let (session, _rx) = state.sessions.create(None);
    session
}

#[test]
fn unknown_component_gets_one_empty_response() {
    let state = ServerState::in_memory();
    let dispatcher = Dispatcher::with_default_routes();
    let session = session(&state);

    let replies = dispatcher.dispatch(
        &state,
        &session,
        &Packet::request(0x9999, 0x1, 0x42, vec![Tdf::varint(Label::from_static("X"), 5)]),
    );
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].header.ty, PacketType::Response);
    assert_eq!(replies[0].header.id, 0x42);
    assert_eq!(replies[0].header.component, 0x9999);
    assert!(replies[0].contents().is_empty());
    assert_eq!(state.metrics.snapshot().unknown_commands, 1);

    assert_ping_reply(&dispatcher.dispatch(&state, &session, &ping(0x43)), 0x43);
}

#[test]
fn unknown_command_on_known_component_is_empty_response() {
    let state = ServerState::in_memory();
    let dispatcher = Dispatcher::with_default_routes();
    let session = session(&state);

    let replies = dispatcher.dispatch(&state, &session, &Packet::request(util::COMPONENT, 0x7FFF, 9, vec![]));
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].header.ty, PacketType::Response);
    assert!(replies[0].contents().is_empty());
}

#[test]
fn unauthenticated_request_gets_invalid_account() {
    let state = ServerState::in_memory();
    let dispatcher = Dispatcher::with_default_routes();
    let session = session(&state);

    let request = Packet::request(game_manager::COMPONENT, game_manager::START_MATCHMAKING, 0x10, vec![]);
    let replies = dispatcher.dispatch(&state, &session, &request);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].header.ty, PacketType::Error);
    assert_eq!(replies[0].header.error, BlazeErrorCode::InvalidAccount.as_u16());
    assert_eq!(replies[0].header.id, 0x10);
    assert_eq!(state.metrics.snapshot().auth_rejections, 1);
    assert_eq!(state.matchmaking.queue_len(), 0);

    assert_ping_reply(&dispatcher.dispatch(&state, &session, &ping(0x11)), 0x11);
}

#[test]
fn panicking_handler_is_contained() {
    let state = ServerState::in_memory();
    let dispatcher = dispatcher_with_faulty_routes();
    let session = session(&state);

    let replies = dispatcher.dispatch(&state, &session, &Packet::request(PANIC_COMPONENT, 1, 0x20, vec![]));
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].header.ty, PacketType::Response);
    assert_eq!(replies[0].header.id, 0x20);
    assert!(replies[0].contents().is_empty());
    assert_eq!(state.metrics.snapshot().handler_failures, 1);

    assert_ping_reply(&dispatcher.dispatch(&state, &session, &ping(0x21)), 0x21);
}

#[test]
fn failing_handler_gets_empty_response() {
    let state = ServerState::in_memory();
    let dispatcher = dispatcher_with_faulty_routes();
    let session = session(&state);

    let replies = dispatcher.dispatch(&state, &session, &Packet::request(PANIC_COMPONENT, 2, 0x30, vec![]));
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].header.ty, PacketType::Response);
    assert!(replies[0].contents().is_empty());
}

#[test]
fn handler_may_return_several_packets() {
    let state = ServerState::in_memory();
    let dispatcher = dispatcher_with_faulty_routes();
    let session = session(&state);

    let replies = dispatcher.dispatch(&state, &session, &Packet::request(PANIC_COMPONENT, 3, 0x31, vec![]));
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].header.id, 0x31);
    assert_eq!(replies[1].header.ty, PacketType::Unique);
}

#[test]
fn malformed_content_keeps_session_usable() {
    let state = ServerState::in_memory();
    let dispatcher = Dispatcher::with_default_routes();
    let session = session(&state);
    session.set_player(Some(Player {
        id: 7,
        display_name: "Garrus".into(),
    }));

    // Valid tag followed by an unknown type code
    let garbage = bytes::Bytes::from_static(&[0xA6, 0xED, 0x00, 0x1F, 0x00]);
    let request = Packet::raw(
        PacketHeader::request(game_manager::COMPONENT, game_manager::CREATE_GAME, 0x40),
        garbage,
    );
    let replies = dispatcher.dispatch(&state, &session, &request);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].header.ty, PacketType::Response);
    assert!(replies[0].contents().is_empty());
    assert!(state.games.is_empty());

    assert_ping_reply(&dispatcher.dispatch(&state, &session, &ping(0x41)), 0x41);
}

#[test]
fn default_routes_cover_every_component() {
    let dispatcher = Dispatcher::with_default_routes();
    for (component, command) in [
        (0x1, 0x28),
        (0x1, 0x32),
        (0x4, 0x1),
        (0x4, 0xF),
        (0x4, 0x1D),
        (0x9, 0x7),
        (0x9, 0x2),
        (0x7802, 0x14),
    ] {
        assert!(
            dispatcher.has_route(component, command),
            "missing route {component:#x}/{command:#x}"
        );
    }
}
