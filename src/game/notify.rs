//! GameManager notification packets.

use crate::config::GAME_CAPACITY;
use crate::core::label::Label;
use crate::core::packet::Packet;
use crate::core::tdf::{Tdf, TdfGroup, TdfList, TdfUnion};
use crate::game::{AttributeMap, GameId, GameSnapshot, JoinContext, MemberSnapshot};
use crate::protocol::components::game_manager;
use crate::session::notify::{network_union, DEFAULT_LOCALE};
use crate::session::SessionId;
use crate::store::PlayerId;

const ADMN: Label = Label::from_static("ADMN");
const ATTR: Label = Label::from_static("ATTR");
const BLOB: Label = Label::from_static("BLOB");
const CAP: Label = Label::from_static("CAP");
const CNTX: Label = Label::from_static("CNTX");
const DCTX: Label = Label::from_static("DCTX");
const GAME: Label = Label::from_static("GAME");
const GID: Label = Label::from_static("GID");
const GNAM: Label = Label::from_static("GNAM");
const GSET: Label = Label::from_static("GSET");
const GSTA: Label = Label::from_static("GSTA");
const HNET: Label = Label::from_static("HNET");
const HOST: Label = Label::from_static("HOST");
const HPID: Label = Label::from_static("HPID");
const HSLT: Label = Label::from_static("HSLT");
const LOC: Label = Label::from_static("LOC");
const MAXF: Label = Label::from_static("MAXF");
const MSID: Label = Label::from_static("MSID");
const NAME: Label = Label::from_static("NAME");
const PDAT: Label = Label::from_static("PDAT");
const PID: Label = Label::from_static("PID");
const PNET: Label = Label::from_static("PNET");
const PROS: Label = Label::from_static("PROS");
const REAS: Label = Label::from_static("REAS");
const RSLT: Label = Label::from_static("RSLT");
const SID: Label = Label::from_static("SID");
const STAT: Label = Label::from_static("STAT");
const UID: Label = Label::from_static("UID");
const USID: Label = Label::from_static("USID");
const VALU: Label = Label::from_static("VALU");

/// Union discriminants of the setup reason.
const REASON_CREATED: u8 = 0x0;
const REASON_MATCHMAKING: u8 = 0x3;

/// Matchmaking result code sent when a search ends without a game.
const MATCHMAKING_CANCELLED: i64 = 0x4;

fn player_data(game_id: GameId, member: &MemberSnapshot) -> Vec<Tdf> {
    vec![
        Tdf::blob(BLOB, Vec::new()),
        Tdf::varint(GID, game_id),
        Tdf::varint(LOC, DEFAULT_LOCALE),
        Tdf::string(NAME, member.player.display_name.as_str()),
        Tdf::varint(PID, member.player.id),
        network_union(PNET, &member.network),
        Tdf::varint(SID, member.slot as i64),
        Tdf::varint(STAT, 0),
        Tdf::varint(UID, member.session_id),
    ]
}

fn setup_reason(snapshot: &GameSnapshot, context: JoinContext) -> Tdf {
    let union = match context {
        JoinContext::Created => {
            TdfUnion::new(REASON_CREATED, Tdf::group(VALU, vec![Tdf::varint(DCTX, 0)]))
        }
        JoinContext::Matchmaking => TdfUnion::new(
            REASON_MATCHMAKING,
            Tdf::group(
                VALU,
                vec![
                    Tdf::varint(MSID, snapshot.mid),
                    Tdf::varint(USID, snapshot.host.player.id),
                ],
            ),
        ),
    };
    match union {
        Ok(union) => Tdf::union(REAS, union),
        Err(_) => Tdf::union_unset(REAS),
    }
}

/// Full game description sent to a member that just joined or created it.
pub fn game_setup(snapshot: &GameSnapshot, context: JoinContext) -> Packet {
    let host = &snapshot.host;
    let admins = snapshot
        .members
        .iter()
        .filter(|m| m.session_id == host.session_id)
        .map(|m| i64::from(m.player.id))
        .collect();
    let game = Tdf::group(
        GAME,
        vec![
            Tdf::list(ADMN, TdfList::VarInt(admins)),
            Tdf::string_map(ATTR, &snapshot.attributes),
            Tdf::varint_list(CAP, vec![GAME_CAPACITY as i64, 0]),
            Tdf::varint(GID, snapshot.id),
            Tdf::string(GNAM, host.player.display_name.as_str()),
            Tdf::varint(GSET, snapshot.setting),
            Tdf::varint(GSTA, snapshot.state),
            network_union(HNET, &host.network),
            Tdf::group(
                HOST,
                vec![
                    Tdf::varint(HPID, host.player.id),
                    Tdf::varint(HSLT, host.slot as i64),
                ],
            ),
        ],
    );
    let roster = snapshot
        .members
        .iter()
        .map(|m| TdfGroup::new(player_data(snapshot.id, m)))
        .collect();
    Packet::notify(
        game_manager::COMPONENT,
        game_manager::NOTIFY_GAME_SETUP,
        vec![
            game,
            Tdf::list(PROS, TdfList::Group(roster)),
            setup_reason(snapshot, context),
        ],
    )
}

/// Tells the host a member is joining so it can open a peer connection.
pub fn player_joining(game_id: GameId, member: &MemberSnapshot) -> Packet {
    Packet::notify(
        game_manager::COMPONENT,
        game_manager::NOTIFY_PLAYER_JOINING,
        vec![
            Tdf::varint(GID, game_id),
            Tdf::group(PDAT, player_data(game_id, member)),
        ],
    )
}

pub fn player_join_completed(game_id: GameId, player_id: PlayerId) -> Packet {
    Packet::notify(
        game_manager::COMPONENT,
        game_manager::NOTIFY_PLAYER_JOIN_COMPLETED,
        vec![Tdf::varint(GID, game_id), Tdf::varint(PID, player_id)],
    )
}

pub fn player_removed(game_id: GameId, player_id: PlayerId, reason: i64) -> Packet {
    Packet::notify(
        game_manager::COMPONENT,
        game_manager::NOTIFY_PLAYER_REMOVED,
        vec![
            Tdf::varint(CNTX, 0),
            Tdf::varint(GID, game_id),
            Tdf::varint(PID, player_id),
            Tdf::varint(REAS, reason),
        ],
    )
}

pub fn game_attributes_changed(game_id: GameId, attributes: &AttributeMap) -> Packet {
    Packet::notify(
        game_manager::COMPONENT,
        game_manager::NOTIFY_GAME_ATTRIB_CHANGE,
        vec![Tdf::string_map(ATTR, attributes), Tdf::varint(GID, game_id)],
    )
}

pub fn game_state_changed(game_id: GameId, state: u16) -> Packet {
    Packet::notify(
        game_manager::COMPONENT,
        game_manager::NOTIFY_GAME_STATE_CHANGE,
        vec![Tdf::varint(GID, game_id), Tdf::varint(GSTA, state)],
    )
}

pub fn game_settings_changed(game_id: GameId, setting: u16) -> Packet {
    Packet::notify(
        game_manager::COMPONENT,
        game_manager::NOTIFY_GAME_SETTINGS_CHANGE,
        vec![Tdf::varint(ATTR, setting), Tdf::varint(GID, game_id)],
    )
}

pub fn matchmaking_failed(session_id: SessionId, player_id: PlayerId) -> Packet {
    Packet::notify(
        game_manager::COMPONENT,
        game_manager::NOTIFY_MATCHMAKING_FAILED,
        vec![
            Tdf::varint(MAXF, 0),
            Tdf::varint(MSID, session_id),
            Tdf::varint(RSLT, MATCHMAKING_CANCELLED),
            Tdf::varint(USID, player_id),
        ],
    )
}
