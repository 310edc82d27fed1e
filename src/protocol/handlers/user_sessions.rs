//! UserSessions component: network address and hardware flag updates.

use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::core::label::Label;
use crate::core::packet::Packet;
use crate::core::tdf::{FieldLookup, Tdf, TdfGroup};
use crate::protocol::components::user_sessions;
use crate::protocol::dispatcher::{DispatcherBuilder, HandlerError, HandlerResult};
use crate::protocol::handlers::{required_u16, required_u32};
use crate::session::{notify as session_notify, NetAddress, NetworkInfo, Session};
use crate::state::ServerState;

const ADDR: Label = Label::from_static("ADDR");
const EXIP: Label = Label::from_static("EXIP");
const HWFG: Label = Label::from_static("HWFG");
const INIP: Label = Label::from_static("INIP");
const IP: Label = Label::from_static("IP");
const PORT: Label = Label::from_static("PORT");
const VALU: Label = Label::from_static("VALU");

pub fn register(builder: DispatcherBuilder) -> DispatcherBuilder {
    builder
        .route(
            user_sessions::COMPONENT,
            user_sessions::UPDATE_NETWORK_INFO,
            update_network_info,
        )
        .route(
            user_sessions::COMPONENT,
            user_sessions::UPDATE_HARDWARE_FLAGS,
            update_hardware_flags,
        )
}

fn read_address(pair: &TdfGroup, label: Label) -> Result<NetAddress, HandlerError> {
    let group = pair
        .group_field(label)
        .ok_or(HandlerError::MissingField(label))?;
    Ok(NetAddress::new(
        Ipv4Addr::from(required_u32(group, IP)?),
        required_u16(group, PORT)?,
    ))
}

/// Store the client's internal/external address pair. An absent union
/// clears it.
pub fn update_network_info(
    state: &ServerState,
    session: &Arc<Session>,
    packet: &Packet,
) -> HandlerResult {
    let records = packet.records()?;
    let union = records
        .field(ADDR)
        .and_then(Tdf::as_union)
        .ok_or(HandlerError::MissingField(ADDR))?;

    let network = match union {
        None => NetworkInfo::default(),
        Some(union) => {
            let pair = union
                .value()
                .as_group()
                .filter(|_| union.value().label == VALU)
                .ok_or(HandlerError::MissingField(VALU))?;
            NetworkInfo {
                internal: read_address(pair, INIP)?,
                external: read_address(pair, EXIP)?,
            }
        }
    };
    session.set_network_info(network);
    refresh_game_members(state, session);
    Ok(vec![Packet::response_empty(packet)])
}

pub fn update_hardware_flags(
    state: &ServerState,
    session: &Arc<Session>,
    packet: &Packet,
) -> HandlerResult {
    let records = packet.records()?;
    session.set_hardware_flags(required_u16(records, HWFG)?);
    refresh_game_members(state, session);
    Ok(vec![Packet::response_empty(packet)])
}

/// Send the session's refreshed extended data to itself and its game.
fn refresh_game_members(state: &ServerState, session: &Arc<Session>) {
    let Some(update) = session_notify::user_updated(&session.details()) else {
        return;
    };
    match session
        .game()
        .and_then(|slot| state.games.get_game_by_id(slot.game_id))
    {
        Some(game) => game.broadcast(&update, None),
        None => session.push(update),
    }
}
