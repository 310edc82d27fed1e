//! Component and command numbers routed by this server, plus the numeric
//! error codes written to the header of ERROR packets.

pub mod authentication {
    pub const COMPONENT: u16 = 0x1;

    pub const LIST_USER_ENTITLEMENTS_2: u16 = 0x1D;
    pub const LOGIN: u16 = 0x28;
    pub const SILENT_LOGIN: u16 = 0x32;
    pub const LOGOUT: u16 = 0x46;
}

pub mod game_manager {
    pub const COMPONENT: u16 = 0x4;

    pub const CREATE_GAME: u16 = 0x1;
    pub const ADVANCE_GAME_STATE: u16 = 0x3;
    pub const SET_GAME_SETTINGS: u16 = 0x4;
    pub const SET_GAME_ATTRIBUTES: u16 = 0x7;
    pub const REMOVE_PLAYER: u16 = 0xB;
    pub const START_MATCHMAKING: u16 = 0xF;
    pub const CANCEL_MATCHMAKING: u16 = 0x10;
    pub const UPDATE_MESH_CONNECTION: u16 = 0x1D;

    pub const NOTIFY_MATCHMAKING_FAILED: u16 = 0xA;
    pub const NOTIFY_GAME_SETUP: u16 = 0x14;
    pub const NOTIFY_PLAYER_JOINING: u16 = 0x15;
    pub const NOTIFY_PLAYER_JOIN_COMPLETED: u16 = 0x1E;
    pub const NOTIFY_PLAYER_REMOVED: u16 = 0x28;
    pub const NOTIFY_GAME_ATTRIB_CHANGE: u16 = 0x50;
    pub const NOTIFY_GAME_STATE_CHANGE: u16 = 0x64;
    pub const NOTIFY_GAME_SETTINGS_CHANGE: u16 = 0x6E;
}

pub mod util {
    pub const COMPONENT: u16 = 0x9;

    pub const FETCH_CLIENT_CONFIG: u16 = 0x1;
    pub const PING: u16 = 0x2;
    pub const PRE_AUTH: u16 = 0x7;
    pub const POST_AUTH: u16 = 0x8;
    pub const USER_SETTINGS_SAVE: u16 = 0xB;
    pub const USER_SETTINGS_LOAD_ALL: u16 = 0xC;
}

pub mod user_sessions {
    pub const COMPONENT: u16 = 0x7802;

    pub const UPDATE_HARDWARE_FLAGS: u16 = 0x8;
    pub const UPDATE_NETWORK_INFO: u16 = 0x14;

    pub const NOTIFY_USER_UPDATED: u16 = 0x1;
    pub const NOTIFY_USER_ADDED: u16 = 0x2;
}

/// Error codes sent in the `error` header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum BlazeErrorCode {
    ServerUnavailable = 0x0,
    GameNotFound = 0x2,
    GameFull = 0x4,
    EmailNotFound = 0xB,
    WrongPassword = 0xC,
    InvalidSession = 0xD,
    EmailAlreadyInUse = 0xF,
    AgeRestriction = 0x10,
    InvalidAccount = 0x11,
    BannedAccount = 0x13,
    InvalidInformation = 0x15,
    InvalidEmail = 0x16,
}

impl BlazeErrorCode {
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Human readable component name for logs.
pub fn component_name(component: u16) -> &'static str {
    match component {
        authentication::COMPONENT => "Authentication",
        game_manager::COMPONENT => "GameManager",
        util::COMPONENT => "Util",
        user_sessions::COMPONENT => "UserSessions",
        _ => "Unknown",
    }
}
