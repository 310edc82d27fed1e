//! GameManager component: game lifecycle and matchmaking.

use std::sync::Arc;

use tracing::debug;

use crate::core::label::Label;
use crate::core::packet::Packet;
use crate::core::tdf::{FieldLookup, Tdf, TdfList};
use crate::error::BlazeError;
use crate::game::notify as game_notify;
use crate::game::{Game, JoinContext, RemoveOutcome, RuleSet};
use crate::protocol::components::game_manager;
use crate::protocol::dispatcher::{DispatcherBuilder, HandlerError, HandlerResult};
use crate::protocol::handlers::{require_player, required_u16, required_u32};
use crate::session::Session;
use crate::state::{ServerState, REMOVE_REASON_LEFT};

const ATTR: Label = Label::from_static("ATTR");
const CRIT: Label = Label::from_static("CRIT");
const GID: Label = Label::from_static("GID");
const GSET: Label = Label::from_static("GSET");
const GSTA: Label = Label::from_static("GSTA");
const MSID: Label = Label::from_static("MSID");
const PID: Label = Label::from_static("PID");
const REAS: Label = Label::from_static("REAS");
const STAT: Label = Label::from_static("STAT");
const TARG: Label = Label::from_static("TARG");

/// Mesh status reported once a peer connection is up.
const MESH_CONNECTED: i64 = 0x2;

pub fn register(builder: DispatcherBuilder) -> DispatcherBuilder {
    builder
        .route(game_manager::COMPONENT, game_manager::CREATE_GAME, create_game)
        .route(
            game_manager::COMPONENT,
            game_manager::SET_GAME_ATTRIBUTES,
            set_game_attributes,
        )
        .route(
            game_manager::COMPONENT,
            game_manager::ADVANCE_GAME_STATE,
            advance_game_state,
        )
        .route(
            game_manager::COMPONENT,
            game_manager::SET_GAME_SETTINGS,
            set_game_settings,
        )
        .route(game_manager::COMPONENT, game_manager::REMOVE_PLAYER, remove_player)
        .route(
            game_manager::COMPONENT,
            game_manager::START_MATCHMAKING,
            start_matchmaking,
        )
        .route(
            game_manager::COMPONENT,
            game_manager::CANCEL_MATCHMAKING,
            cancel_matchmaking,
        )
        .route(
            game_manager::COMPONENT,
            game_manager::UPDATE_MESH_CONNECTION,
            update_mesh_connection,
        )
}

fn lookup_game(state: &ServerState, packet: &Packet) -> Result<Arc<Game>, HandlerError> {
    let records = packet.records()?;
    let game_id = required_u32(records, GID)?;
    state
        .games
        .get_game_by_id(game_id)
        .ok_or(HandlerError::Game(BlazeError::GameNotFound(game_id)))
}

/// Create a game hosted by the caller, then offer it to queued sessions.
pub fn create_game(state: &ServerState, session: &Arc<Session>, packet: &Packet) -> HandlerResult {
    require_player(session)?;
    let records = packet.records()?;
    let attributes = records.string_map_field(ATTR).unwrap_or_default();
    let setting = match records.varint_field(GSET) {
        Some(_) => required_u16(records, GSET)?,
        None => 0,
    };

    state.leave_activities(session, REMOVE_REASON_LEFT);
    let game = match state.games.create_game(session, attributes.clone(), setting) {
        // A queued join landed after we left the queue; leave that game too
        Err(BlazeError::AlreadyInGame { game, .. }) => {
            debug!(session_id = session.id(), game_id = game, "Leaving game placed during create");
            state.leave_activities(session, REMOVE_REASON_LEFT);
            state.games.create_game(session, attributes, setting)?
        }
        created => created?,
    };
    state.metrics.game_created();

    let placed = state.matchmaking.on_new_game_created(&game);
    state.metrics.matchmaking_matched(placed.len() as u64);

    Ok(vec![Packet::response(packet, vec![Tdf::varint(GID, game.id())])])
}

pub fn set_game_attributes(
    state: &ServerState,
    session: &Arc<Session>,
    packet: &Packet,
) -> HandlerResult {
    require_player(session)?;
    let game = lookup_game(state, packet)?;
    let attributes = packet
        .records()?
        .string_map_field(ATTR)
        .ok_or(HandlerError::MissingField(ATTR))?;
    game.set_attributes(attributes);
    game.broadcast_attribute_update();
    Ok(vec![Packet::response_empty(packet)])
}

pub fn advance_game_state(
    state: &ServerState,
    session: &Arc<Session>,
    packet: &Packet,
) -> HandlerResult {
    require_player(session)?;
    let game = lookup_game(state, packet)?;
    game.set_state(required_u16(packet.records()?, GSTA)?);
    Ok(vec![Packet::response_empty(packet)])
}

pub fn set_game_settings(
    state: &ServerState,
    session: &Arc<Session>,
    packet: &Packet,
) -> HandlerResult {
    require_player(session)?;
    let game = lookup_game(state, packet)?;
    game.set_setting(required_u16(packet.records()?, GSET)?);
    Ok(vec![Packet::response_empty(packet)])
}

pub fn remove_player(state: &ServerState, session: &Arc<Session>, packet: &Packet) -> HandlerResult {
    require_player(session)?;
    let records = packet.records()?;
    let game_id = required_u32(records, GID)?;
    let player_id = required_u32(records, PID)?;
    let reason = records.varint_field(REAS).unwrap_or(REMOVE_REASON_LEFT);

    if state.games.remove_player(game_id, player_id, reason)? == RemoveOutcome::Emptied {
        state.metrics.game_released();
    }
    Ok(vec![Packet::response_empty(packet)])
}

/// Join the first matching game, or wait in the queue for one to be
/// created. The response only acknowledges the search; placement arrives as
/// a setup notification.
pub fn start_matchmaking(
    state: &ServerState,
    session: &Arc<Session>,
    packet: &Packet,
) -> HandlerResult {
    require_player(session)?;
    let rules = packet
        .records()?
        .group_field(CRIT)
        .map(RuleSet::from_criteria)
        .unwrap_or_default();

    state.leave_activities(session, REMOVE_REASON_LEFT);
    let response = Packet::response(packet, vec![Tdf::varint(MSID, session.id())]);

    match state.matchmaking.get_match_or_queue(session, rules.clone()) {
        Some(game) => match game.join(session, JoinContext::Matchmaking) {
            Ok(_) => state.metrics.matchmaking_matched(1),
            Err(BlazeError::GameFull(_)) | Err(BlazeError::GameNotFound(_)) => {
                debug!(session_id = session.id(), game_id = game.id(), "Match lost a race, queueing");
                state.matchmaking.queue(session, rules);
                state.metrics.matchmaking_queued();
            }
            Err(BlazeError::AlreadyInGame { game, .. }) => {
                debug!(session_id = session.id(), game_id = game, "Already placed by the queue");
            }
            Err(e) => return Err(e.into()),
        },
        None => state.metrics.matchmaking_queued(),
    }
    Ok(vec![response])
}

pub fn cancel_matchmaking(
    state: &ServerState,
    session: &Arc<Session>,
    packet: &Packet,
) -> HandlerResult {
    let player = require_player(session)?;
    if state.matchmaking.remove_from_queue(session) {
        session.push(game_notify::matchmaking_failed(session.id(), player.id));
    }
    Ok(vec![Packet::response_empty(packet)])
}

/// Completes a join once the caller reports its peer connection is up.
pub fn update_mesh_connection(
    state: &ServerState,
    session: &Arc<Session>,
    packet: &Packet,
) -> HandlerResult {
    let player = require_player(session)?;
    let game = lookup_game(state, packet)?;
    let connected = match packet.records()?.field(TARG).and_then(Tdf::as_list) {
        Some(TdfList::Group(targets)) => targets
            .iter()
            .any(|t| t.varint_field(STAT) == Some(MESH_CONNECTED)),
        _ => false,
    };

    if connected && game.host_id() != session.id() && game.contains_player(player.id) {
        game.broadcast(&game_notify::player_join_completed(game.id(), player.id), None);
    }
    Ok(vec![Packet::response_empty(packet)])
}
