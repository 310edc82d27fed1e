//! UserSessions notifications describing a session to other clients.

use crate::core::label::Label;
use crate::core::packet::Packet;
use crate::core::tdf::{Tdf, TdfList, TdfUnion};
use crate::protocol::components::{game_manager, user_sessions};
use crate::session::{NetAddress, NetworkInfo, SessionDetails};

const ADDR: Label = Label::from_static("ADDR");
const AID: Label = Label::from_static("AID");
const ALOC: Label = Label::from_static("ALOC");
const DATA: Label = Label::from_static("DATA");
const EXIP: Label = Label::from_static("EXIP");
const FLGS: Label = Label::from_static("FLGS");
const HWFL: Label = Label::from_static("HWFL");
const ID: Label = Label::from_static("ID");
const INIP: Label = Label::from_static("INIP");
const IP: Label = Label::from_static("IP");
const NAME: Label = Label::from_static("NAME");
const PORT: Label = Label::from_static("PORT");
const ULST: Label = Label::from_static("ULST");
const USER: Label = Label::from_static("USER");
const VALU: Label = Label::from_static("VALU");

/// Union discriminant for an internal/external IP pair.
pub const NETWORK_PAIR: u8 = 0x2;

/// "enUS" packed as the client locale integer.
pub const DEFAULT_LOCALE: i64 = 0x656E_5553;

/// Session is online and its extended data is current.
const USER_FLAGS_ONLINE: i64 = 0x3;

/// Game-membership entry type in the extended data list.
const GAME_MEMBERSHIP: i64 = 0x1;

fn address_group(label: Label, addr: &NetAddress) -> Tdf {
    Tdf::group(
        label,
        vec![
            Tdf::varint(IP, addr.ip_u32()),
            Tdf::varint(PORT, addr.port),
        ],
    )
}

/// Address pair as a union, unset until the client has reported one.
pub fn network_union(label: Label, network: &NetworkInfo) -> Tdf {
    if *network == NetworkInfo::default() {
        return Tdf::union_unset(label);
    }
    let pair = Tdf::group(
        VALU,
        vec![
            address_group(EXIP, &network.external),
            address_group(INIP, &network.internal),
        ],
    );
    match TdfUnion::new(NETWORK_PAIR, pair) {
        Ok(union) => Tdf::union(label, union),
        Err(_) => Tdf::union_unset(label),
    }
}

fn extended_data(details: &SessionDetails) -> Tdf {
    let memberships = details
        .game
        .iter()
        .map(|slot| {
            (
                i64::from(game_manager::COMPONENT),
                GAME_MEMBERSHIP,
                i64::from(slot.game_id),
            )
        })
        .collect();
    Tdf::group(
        DATA,
        vec![
            network_union(ADDR, &details.network),
            Tdf::varint(HWFL, details.hardware_flags),
            Tdf::list(ULST, TdfList::Triple(memberships)),
        ],
    )
}

/// Introduce a session to another client. `None` before login.
pub fn user_added(details: &SessionDetails) -> Option<Packet> {
    let player = details.player.as_ref()?;
    Some(Packet::notify(
        user_sessions::COMPONENT,
        user_sessions::NOTIFY_USER_ADDED,
        vec![
            extended_data(details),
            Tdf::group(
                USER,
                vec![
                    Tdf::varint(AID, player.id),
                    Tdf::varint(ALOC, DEFAULT_LOCALE),
                    Tdf::varint(ID, player.id),
                    Tdf::string(NAME, player.display_name.as_str()),
                ],
            ),
        ],
    ))
}

/// Refreshed extended data for a session. `None` before login.
pub fn user_updated(details: &SessionDetails) -> Option<Packet> {
    let player = details.player.as_ref()?;
    Some(Packet::notify(
        user_sessions::COMPONENT,
        user_sessions::NOTIFY_USER_UPDATED,
        vec![
            extended_data(details),
            Tdf::varint(FLGS, USER_FLAGS_ONLINE),
            Tdf::varint(ID, player.id),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tdf::FieldLookup;
    use crate::session::GameSlot;
    use crate::store::Player;
    use std::net::Ipv4Addr;

    fn details() -> SessionDetails {
        SessionDetails {
            session_id: 3,
            player: Some(Player {
                id: 12,
                display_name: "Garrus".into(),
            }),
            network: NetworkInfo {
                internal: NetAddress::new(Ipv4Addr::new(10, 0, 0, 2), 3659),
                external: NetAddress::new(Ipv4Addr::new(203, 0, 113, 7), 3659),
            },
            hardware_flags: 1,
            game: Some(GameSlot { game_id: 4, slot: 1 }),
        }
    }

    #[test]
    fn anonymous_sessions_produce_nothing() {
        let mut d = details();
        d.player = None;
        assert!(user_added(&d).is_none());
        assert!(user_updated(&d).is_none());
    }

    #[test]
    fn updated_carries_membership_and_address() {
        let packet = user_updated(&details()).unwrap();
        let records = packet.records().unwrap();
        assert_eq!(records.varint_field(ID), Some(12));
        let data = records.group_field(DATA).unwrap();
        assert_eq!(
            data.field(ULST).and_then(Tdf::as_list),
            Some(&TdfList::Triple(vec![(4, 1, 4)]))
        );
        let union = data.field(ADDR).and_then(Tdf::as_union).flatten().unwrap();
        assert_eq!(union.discriminant(), NETWORK_PAIR);
        let exip = union.value().as_group().unwrap().group_field(EXIP).unwrap();
        assert_eq!(exip.varint_field(IP), Some(0xCB00_7107));
    }

    #[test]
    fn unknown_network_is_unset() {
        let tdf = network_union(ADDR, &NetworkInfo::default());
        assert_eq!(tdf.as_union(), Some(None));
    }
}
