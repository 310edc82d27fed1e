//! Authentication component: login, silent login, logout, entitlements.

use std::sync::Arc;

use tracing::info;

use crate::core::label::Label;
use crate::core::packet::Packet;
use crate::core::tdf::{Tdf, TdfList};
use crate::protocol::components::{authentication, BlazeErrorCode};
use crate::protocol::dispatcher::{DispatcherBuilder, HandlerError, HandlerResult};
use crate::protocol::handlers::{require_player, required_str, required_u32};
use crate::session::{notify as session_notify, Session};
use crate::state::{ServerState, REMOVE_REASON_LEFT};
use crate::store::Account;

const AUTH: Label = Label::from_static("AUTH");
const BUID: Label = Label::from_static("BUID");
const DSNM: Label = Label::from_static("DSNM");
const FRST: Label = Label::from_static("FRST");
const KEY: Label = Label::from_static("KEY");
const LAST: Label = Label::from_static("LAST");
const LDHT: Label = Label::from_static("LDHT");
const LLOG: Label = Label::from_static("LLOG");
const MAIL: Label = Label::from_static("MAIL");
const NLST: Label = Label::from_static("NLST");
const NTOS: Label = Label::from_static("NTOS");
const PASS: Label = Label::from_static("PASS");
const PCTK: Label = Label::from_static("PCTK");
const PDTL: Label = Label::from_static("PDTL");
const PID: Label = Label::from_static("PID");
const PRIV: Label = Label::from_static("PRIV");
const SESS: Label = Label::from_static("SESS");
const SPAM: Label = Label::from_static("SPAM");
const STAS: Label = Label::from_static("STAS");
const THST: Label = Label::from_static("THST");
const TSUI: Label = Label::from_static("TSUI");
const TURI: Label = Label::from_static("TURI");
const UID: Label = Label::from_static("UID");
const XREF: Label = Label::from_static("XREF");
const XTYP: Label = Label::from_static("XTYP");

pub fn register(builder: DispatcherBuilder) -> DispatcherBuilder {
    builder
        .route(authentication::COMPONENT, authentication::LOGIN, login)
        .route(authentication::COMPONENT, authentication::SILENT_LOGIN, silent_login)
        .route(authentication::COMPONENT, authentication::LOGOUT, logout)
        .route(
            authentication::COMPONENT,
            authentication::LIST_USER_ENTITLEMENTS_2,
            list_user_entitlements_2,
        )
}

/// Email and password login.
pub fn login(state: &ServerState, session: &Arc<Session>, packet: &Packet) -> HandlerResult {
    let records = packet.records()?;
    let email = required_str(records, MAIL)?;
    let password = required_str(records, PASS)?;

    if !email.contains('@') {
        return Err(HandlerError::Blaze(BlazeErrorCode::InvalidEmail));
    }
    let account = state
        .store
        .find_account_by_email(email)?
        .ok_or(HandlerError::Blaze(BlazeErrorCode::EmailNotFound))?;
    if account.password != password {
        return Err(HandlerError::Blaze(BlazeErrorCode::WrongPassword));
    }

    Ok(complete_login(session, &account, packet))
}

/// Token login for a client that logged in before.
pub fn silent_login(state: &ServerState, session: &Arc<Session>, packet: &Packet) -> HandlerResult {
    let records = packet.records()?;
    let token = required_str(records, AUTH)?;
    let player_id = required_u32(records, PID)?;

    let account = state
        .store
        .load_account(player_id)?
        .ok_or(HandlerError::Blaze(BlazeErrorCode::InvalidAccount))?;
    if account.session_token != token {
        return Err(HandlerError::Blaze(BlazeErrorCode::InvalidSession));
    }

    Ok(complete_login(session, &account, packet))
}

/// The login response followed by the player's own identity notifications.
fn complete_login(session: &Arc<Session>, account: &Account, packet: &Packet) -> Vec<Packet> {
    let player = &account.player;
    session.set_player(Some(player.clone()));
    info!(session_id = session.id(), player_id = player.id, "Player logged in");

    let details = session.details();
    let mut replies = vec![login_response(account, packet)];
    replies.extend(session_notify::user_added(&details));
    replies.extend(session_notify::user_updated(&details));
    replies
}

fn login_response(account: &Account, packet: &Packet) -> Packet {
    let player = &account.player;

    let persona = vec![
        Tdf::string(DSNM, player.display_name.as_str()),
        Tdf::varint(LAST, 0),
        Tdf::varint(PID, player.id),
        Tdf::varint(STAS, 0),
        Tdf::varint(XREF, 0),
        Tdf::varint(XTYP, 0),
    ];
    Packet::response(
        packet,
        vec![
            Tdf::string(LDHT, ""),
            Tdf::varint(NTOS, 0),
            Tdf::string(PCTK, account.session_token.as_str()),
            Tdf::string(PRIV, ""),
            Tdf::group(
                SESS,
                vec![
                    Tdf::varint(BUID, player.id),
                    Tdf::varint(FRST, 0),
                    Tdf::string(KEY, account.session_token.as_str()),
                    Tdf::varint(LLOG, 0),
                    Tdf::string(MAIL, account.email.as_str()),
                    Tdf::group(PDTL, persona),
                    Tdf::varint(UID, player.id),
                ],
            ),
            Tdf::varint(SPAM, 0),
            Tdf::string(THST, ""),
            Tdf::string(TSUI, ""),
            Tdf::string(TURI, ""),
        ],
    )
}

pub fn logout(state: &ServerState, session: &Arc<Session>, packet: &Packet) -> HandlerResult {
    let player = require_player(session)?;
    state.leave_activities(session, REMOVE_REASON_LEFT);
    session.set_player(None);
    info!(session_id = session.id(), player_id = player.id, "Player logged out");
    Ok(vec![Packet::response_empty(packet)])
}

/// Entitlements are not tracked; the list is always empty.
pub fn list_user_entitlements_2(
    _state: &ServerState,
    session: &Arc<Session>,
    packet: &Packet,
) -> HandlerResult {
    require_player(session)?;
    Ok(vec![Packet::response(
        packet,
        vec![Tdf::list(NLST, TdfList::Group(Vec::new()))],
    )])
}
