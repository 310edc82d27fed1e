//! Util component: connection bootstrap, ping, client config, user settings.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::label::Label;
use crate::core::packet::Packet;
use crate::core::tdf::{Tdf, TdfList};
use crate::protocol::components::{authentication, game_manager, user_sessions, util};
use crate::protocol::dispatcher::{DispatcherBuilder, HandlerResult};
use crate::protocol::handlers::{require_player, required_str};
use crate::session::notify::DEFAULT_LOCALE;
use crate::session::Session;
use crate::state::ServerState;

const ADRS: Label = Label::from_static("ADRS");
const ANON: Label = Label::from_static("ANON");
const ASRC: Label = Label::from_static("ASRC");
const CFID: Label = Label::from_static("CFID");
const CIDS: Label = Label::from_static("CIDS");
const CONF: Label = Label::from_static("CONF");
const DATA: Label = Label::from_static("DATA");
const INST: Label = Label::from_static("INST");
const KEY: Label = Label::from_static("KEY");
const LOC: Label = Label::from_static("LOC");
const MINR: Label = Label::from_static("MINR");
const NASP: Label = Label::from_static("NASP");
const PILD: Label = Label::from_static("PILD");
const PLAT: Label = Label::from_static("PLAT");
const PORT: Label = Label::from_static("PORT");
const PSS: Label = Label::from_static("PSS");
const RSRC: Label = Label::from_static("RSRC");
const SDLY: Label = Label::from_static("SDLY");
const SMAP: Label = Label::from_static("SMAP");
const STIM: Label = Label::from_static("STIM");
const SVER: Label = Label::from_static("SVER");
const TELE: Label = Label::from_static("TELE");
const TMOP: Label = Label::from_static("TMOP");
const UID: Label = Label::from_static("UID");
const UROP: Label = Label::from_static("UROP");

const SERVER_VERSION: &str = "Blaze 3.15.08.0 (CL# 1060080)";
const RESOURCE_ID: &str = "303107";

/// Client heartbeat period advertised in the pre-auth config.
const PING_PERIOD: &str = "15s";

pub fn register(builder: DispatcherBuilder) -> DispatcherBuilder {
    builder
        .route(util::COMPONENT, util::PRE_AUTH, pre_auth)
        .route(util::COMPONENT, util::POST_AUTH, post_auth)
        .route(util::COMPONENT, util::PING, ping)
        .route(util::COMPONENT, util::FETCH_CLIENT_CONFIG, fetch_client_config)
        .route(util::COMPONENT, util::USER_SETTINGS_SAVE, user_settings_save)
        .route(util::COMPONENT, util::USER_SETTINGS_LOAD_ALL, user_settings_load_all)
}

/// First request of a connection: server identity and routed components.
pub fn pre_auth(_state: &ServerState, _session: &Arc<Session>, packet: &Packet) -> HandlerResult {
    let components = vec![
        i64::from(authentication::COMPONENT),
        i64::from(game_manager::COMPONENT),
        i64::from(util::COMPONENT),
        i64::from(user_sessions::COMPONENT),
    ];
    let config: BTreeMap<String, String> = [
        ("pingPeriod", PING_PERIOD),
        ("connIdleTimeout", "90s"),
        ("defaultRequestTimeout", "60s"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Ok(vec![Packet::response(
        packet,
        vec![
            Tdf::varint(ANON, 0),
            Tdf::string(ASRC, RESOURCE_ID),
            Tdf::list(CIDS, TdfList::VarInt(components)),
            Tdf::group(CONF, vec![Tdf::string_map(CONF, &config)]),
            Tdf::string(INST, "masseffect-3-pc"),
            Tdf::varint(MINR, 0),
            Tdf::string(NASP, "cem_ea_id"),
            Tdf::string(PILD, ""),
            Tdf::string(PLAT, "pc"),
            Tdf::string(RSRC, RESOURCE_ID),
            Tdf::string(SVER, SERVER_VERSION),
        ],
    )])
}

pub fn post_auth(_state: &ServerState, session: &Arc<Session>, packet: &Packet) -> HandlerResult {
    let player = require_player(session)?;
    Ok(vec![Packet::response(
        packet,
        vec![
            Tdf::group(PSS, vec![Tdf::string(ADRS, ""), Tdf::varint(PORT, 0)]),
            Tdf::group(
                TELE,
                vec![
                    Tdf::string(ADRS, ""),
                    Tdf::varint(LOC, DEFAULT_LOCALE),
                    Tdf::varint(PORT, 0),
                    Tdf::varint(SDLY, 15_000),
                ],
            ),
            Tdf::group(UROP, vec![Tdf::varint(TMOP, 1), Tdf::varint(UID, player.id)]),
        ],
    )])
}

/// Records the ping time and replies with server time in seconds.
pub fn ping(_state: &ServerState, session: &Arc<Session>, packet: &Packet) -> HandlerResult {
    session.record_ping();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    Ok(vec![Packet::response(
        packet,
        vec![Tdf::varint(STIM, i64::try_from(now).unwrap_or(i64::MAX))],
    )])
}

pub fn fetch_client_config(
    state: &ServerState,
    _session: &Arc<Session>,
    packet: &Packet,
) -> HandlerResult {
    let records = packet.records()?;
    let name = required_str(records, CFID)?;
    let config = state.store.load_client_config(name)?.unwrap_or_default();
    Ok(vec![Packet::response(packet, vec![Tdf::string_map(CONF, &config)])])
}

pub fn user_settings_save(
    state: &ServerState,
    session: &Arc<Session>,
    packet: &Packet,
) -> HandlerResult {
    let player = require_player(session)?;
    let records = packet.records()?;
    let key = required_str(records, KEY)?;
    let value = required_str(records, DATA)?;
    state.store.save_setting(player.id, key, value)?;
    Ok(vec![Packet::response_empty(packet)])
}

pub fn user_settings_load_all(
    state: &ServerState,
    session: &Arc<Session>,
    packet: &Packet,
) -> HandlerResult {
    let player = require_player(session)?;
    let settings = state.store.load_settings(player.id)?;
    Ok(vec![Packet::response(packet, vec![Tdf::string_map(SMAP, &settings)])])
}
