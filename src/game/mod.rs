//! # Games
//!
//! A [`Game`] is a fixed-capacity roster of sessions plus a string attribute
//! map. Every roster and attribute access goes through one reader/writer lock
//! per game. Notifications are built while the lock is held and pushed after
//! it is released; pushing only enqueues, so no socket I/O happens under a
//! game lock.
//!
//! Lock order across the crate is GameManager map, then Game, then the
//! matchmaking queue. Session locks are leaves and may be taken under any of
//! them.

pub mod manager;
pub mod matchmaking;
pub mod notify;
pub mod rules;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::config::GAME_CAPACITY;
use crate::core::packet::Packet;
use crate::error::{BlazeError, Result};
use crate::session::{notify as session_notify, GameSlot, NetworkInfo, Session, SessionId};
use crate::store::{Player, PlayerId};
use crate::utils::sync::{read, write};

pub use manager::GameManager;
pub use matchmaking::Matchmaking;
pub use rules::RuleSet;

pub type GameId = u32;

/// Game attribute map, ordered for stable encoding.
pub type AttributeMap = BTreeMap<String, String>;

/// How a member came to be in the game; echoed in the setup notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinContext {
    /// The member created the game
    Created,
    /// Placed by matchmaking
    Matchmaking,
}

/// Result of removing a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    NotMember,
    Removed,
    /// Host moved to another member
    HostMigrated { new_host: SessionId },
    /// Roster is empty and the game is inactive
    Emptied,
}

/// One roster entry.
#[derive(Debug, Clone)]
pub struct GameMember {
    pub session: Arc<Session>,
    pub player: Player,
    pub slot: usize,
}

impl GameMember {
    fn snapshot(&self) -> MemberSnapshot {
        MemberSnapshot {
            session_id: self.session.id(),
            player: self.player.clone(),
            slot: self.slot,
            network: self.session.network_info(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberSnapshot {
    pub session_id: SessionId,
    pub player: Player,
    pub slot: usize,
    pub network: NetworkInfo,
}

/// Copy of everything the setup notification describes.
#[derive(Debug, Clone)]
pub struct GameSnapshot {
    pub id: GameId,
    pub mid: u32,
    pub host: MemberSnapshot,
    pub state: u16,
    pub setting: u16,
    pub attributes: AttributeMap,
    pub members: Vec<MemberSnapshot>,
}

#[derive(Debug)]
struct GameInner {
    host: SessionId,
    /// Sorted by slot
    roster: Vec<GameMember>,
    attributes: AttributeMap,
    attributes_dirty: bool,
    state: u16,
    setting: u16,
}

impl GameInner {
    fn next_free_slot(&self) -> usize {
        (0..GAME_CAPACITY)
            .find(|slot| !self.roster.iter().any(|m| m.slot == *slot))
            .unwrap_or(self.roster.len())
    }

    fn position_of_player(&self, player_id: PlayerId) -> Option<usize> {
        self.roster.iter().position(|m| m.player.id == player_id)
    }

    fn host_member(&self) -> Option<&GameMember> {
        self.roster.iter().find(|m| m.session.id() == self.host)
    }

    fn sessions(&self) -> Vec<Arc<Session>> {
        self.roster.iter().map(|m| m.session.clone()).collect()
    }
}

#[derive(Debug)]
pub struct Game {
    id: GameId,
    mid: u32,
    active: AtomicBool,
    inner: RwLock<GameInner>,
}

pub const INITIAL_GAME_STATE: u16 = 0x1;

impl Game {
    /// Create a game hosted by `host` in slot 0. The host must be logged in.
    pub fn new(
        id: GameId,
        mid: u32,
        host: &Arc<Session>,
        attributes: AttributeMap,
        setting: u16,
    ) -> Result<Self> {
        let player = host
            .player()
            .ok_or(BlazeError::Unauthenticated(host.id()))?;
        host.claim_game(GameSlot { game_id: id, slot: 0 })
            .map_err(|game| BlazeError::AlreadyInGame {
                session: host.id(),
                game,
            })?;
        Ok(Self {
            id,
            mid,
            active: AtomicBool::new(true),
            inner: RwLock::new(GameInner {
                host: host.id(),
                roster: vec![GameMember {
                    session: host.clone(),
                    player,
                    slot: 0,
                }],
                attributes,
                attributes_dirty: false,
                state: INITIAL_GAME_STATE,
                setting,
            }),
        })
    }

    #[inline]
    pub fn id(&self) -> GameId {
        self.id
    }

    /// Matchmaking session id allocated with this game.
    #[inline]
    pub fn mid(&self) -> u32 {
        self.mid
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Active with a free slot.
    pub fn is_joinable(&self) -> bool {
        self.is_active() && read(&self.inner).roster.len() < GAME_CAPACITY
    }

    pub fn player_count(&self) -> usize {
        read(&self.inner).roster.len()
    }

    pub fn free_slots(&self) -> usize {
        GAME_CAPACITY.saturating_sub(self.player_count())
    }

    pub fn host_id(&self) -> SessionId {
        read(&self.inner).host
    }

    pub fn contains_player(&self, player_id: PlayerId) -> bool {
        read(&self.inner).position_of_player(player_id).is_some()
    }

    pub fn members(&self) -> Vec<MemberSnapshot> {
        read(&self.inner).roster.iter().map(GameMember::snapshot).collect()
    }

    pub fn attributes(&self) -> AttributeMap {
        read(&self.inner).attributes.clone()
    }

    pub fn state(&self) -> u16 {
        read(&self.inner).state
    }

    pub fn setting(&self) -> u16 {
        read(&self.inner).setting
    }

    pub fn attributes_dirty(&self) -> bool {
        read(&self.inner).attributes_dirty
    }

    pub fn snapshot(&self) -> Option<GameSnapshot> {
        Self::snapshot_of(self.id, self.mid, &read(&self.inner))
    }

    fn snapshot_of(id: GameId, mid: u32, inner: &GameInner) -> Option<GameSnapshot> {
        Some(GameSnapshot {
            id,
            mid,
            host: inner.host_member()?.snapshot(),
            state: inner.state,
            setting: inner.setting,
            attributes: inner.attributes.clone(),
            members: inner.roster.iter().map(GameMember::snapshot).collect(),
        })
    }

    /// Send the setup notification to the host after creation.
    pub fn notify_created(&self) {
        let (host, snapshot) = {
            let inner = read(&self.inner);
            let Some(host) = inner.host_member() else {
                return;
            };
            (host.session.clone(), Self::snapshot_of(self.id, self.mid, &inner))
        };
        if let Some(snapshot) = snapshot {
            host.push(notify::game_setup(&snapshot, JoinContext::Created));
        }
    }

    /// Add `session` to the roster in the lowest free slot.
    ///
    /// The capacity check, the session link and the insert happen under one
    /// write lock, so concurrent joins cannot overfill the game. Joining twice
    /// returns the existing slot without notifying anyone. A session linked
    /// to another game is refused with [`BlazeError::AlreadyInGame`].
    pub fn join(&self, session: &Arc<Session>, context: JoinContext) -> Result<usize> {
        let player = session
            .player()
            .ok_or(BlazeError::Unauthenticated(session.id()))?;

        let (slot, snapshot, others) = {
            let mut inner = write(&self.inner);
            if !self.is_active() {
                return Err(BlazeError::GameNotFound(self.id));
            }
            if let Some(pos) = inner.position_of_player(player.id) {
                return Ok(inner.roster[pos].slot);
            }
            if inner.roster.len() >= GAME_CAPACITY {
                return Err(BlazeError::GameFull(self.id));
            }

            let slot = inner.next_free_slot();
            session
                .claim_game(GameSlot {
                    game_id: self.id,
                    slot,
                })
                .map_err(|game| BlazeError::AlreadyInGame {
                    session: session.id(),
                    game,
                })?;
            let others = inner.sessions();
            let member = GameMember {
                session: session.clone(),
                player,
                slot,
            };
            let at = inner.roster.partition_point(|m| m.slot < slot);
            inner.roster.insert(at, member);
            (slot, Self::snapshot_of(self.id, self.mid, &inner), others)
        };

        let Some(snapshot) = snapshot else {
            return Ok(slot);
        };
        let Some(joined) = snapshot.members.iter().find(|m| m.slot == slot) else {
            return Ok(slot);
        };

        // Existing members learn about the newcomer, host included
        let details = session.details();
        for other in &others {
            let mut packets = Vec::with_capacity(3);
            packets.extend(session_notify::user_added(&details));
            packets.extend(session_notify::user_updated(&details));
            if other.id() == snapshot.host.session_id {
                packets.push(notify::player_joining(self.id, joined));
            }
            other.push_all(packets);
        }

        // The newcomer learns about everyone already present, then the game
        let mut packets = Vec::with_capacity(others.len() + 1);
        for other in &others {
            packets.extend(session_notify::user_added(&other.details()));
        }
        packets.push(notify::game_setup(&snapshot, context));
        session.push_all(packets);

        info!(
            game_id = self.id,
            session_id = session.id(),
            slot,
            players = snapshot.members.len(),
            "Player joined game"
        );
        Ok(slot)
    }

    /// Remove a player by id.
    ///
    /// When the last member leaves the game becomes inactive; the owning
    /// [`GameManager`] releases it. When the host leaves and others remain,
    /// the lowest-slot member becomes host.
    pub fn remove_player(&self, player_id: PlayerId, reason: i64) -> RemoveOutcome {
        let (removed, remaining, outcome) = {
            let mut inner = write(&self.inner);
            let Some(pos) = inner.position_of_player(player_id) else {
                return RemoveOutcome::NotMember;
            };
            let removed = inner.roster.remove(pos);
            removed.session.clear_game(self.id);

            let outcome = if inner.roster.is_empty() {
                self.active.store(false, Ordering::Release);
                RemoveOutcome::Emptied
            } else if removed.session.id() == inner.host {
                let new_host = inner.roster[0].session.id();
                inner.host = new_host;
                RemoveOutcome::HostMigrated { new_host }
            } else {
                RemoveOutcome::Removed
            };
            (removed, inner.sessions(), outcome)
        };

        let removed_notice = notify::player_removed(self.id, player_id, reason);
        removed.session.push(removed_notice.clone());

        let refreshed = session_notify::user_updated(&removed.session.details());
        for member in &remaining {
            let mut packets = vec![removed_notice.clone()];
            packets.extend(refreshed.clone());
            member.push_all(packets);
        }

        match outcome {
            RemoveOutcome::Emptied => info!(game_id = self.id, player_id, "Last player left game"),
            RemoveOutcome::HostMigrated { new_host } => {
                info!(game_id = self.id, player_id, new_host, "Host left, migrated")
            }
            _ => debug!(game_id = self.id, player_id, "Player removed from game"),
        }
        outcome
    }

    /// Remove whichever member belongs to `session`.
    pub fn remove_session(&self, session: &Session, reason: i64) -> RemoveOutcome {
        let player_id = {
            let inner = read(&self.inner);
            inner
                .roster
                .iter()
                .find(|m| m.session.id() == session.id())
                .map(|m| m.player.id)
        };
        match player_id {
            Some(id) => self.remove_player(id, reason),
            None => RemoveOutcome::NotMember,
        }
    }

    /// Merge `attributes` into the attribute map and mark it dirty.
    pub fn set_attributes(&self, attributes: AttributeMap) {
        let mut inner = write(&self.inner);
        inner.attributes.extend(attributes);
        inner.attributes_dirty = true;
    }

    /// Push the full attribute map to every member and clear the dirty flag.
    pub fn broadcast_attribute_update(&self) {
        let (packet, members) = {
            let mut inner = write(&self.inner);
            inner.attributes_dirty = false;
            (
                notify::game_attributes_changed(self.id, &inner.attributes),
                inner.sessions(),
            )
        };
        for member in members {
            member.push(packet.clone());
        }
    }

    pub fn set_state(&self, state: u16) {
        let (packet, members) = {
            let mut inner = write(&self.inner);
            inner.state = state;
            (notify::game_state_changed(self.id, state), inner.sessions())
        };
        debug!(game_id = self.id, state, "Game state changed");
        for member in members {
            member.push(packet.clone());
        }
    }

    pub fn set_setting(&self, setting: u16) {
        let (packet, members) = {
            let mut inner = write(&self.inner);
            inner.setting = setting;
            (notify::game_settings_changed(self.id, setting), inner.sessions())
        };
        for member in members {
            member.push(packet.clone());
        }
    }

    /// Push `packet` to every member except `exclude`.
    pub fn broadcast(&self, packet: &Packet, exclude: Option<SessionId>) {
        let members = read(&self.inner).sessions();
        for member in members.iter().filter(|s| Some(s.id()) != exclude) {
            member.push(packet.clone());
        }
    }
}
