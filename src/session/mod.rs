//! # Session
//!
//! Per-connection state shared between the connection task and any handler
//! that needs to reach this client.
//!
//! Writes never touch the socket directly. [`Session::push`] enqueues onto a
//! single-consumer channel owned by the connection task, which drains it in
//! order and flushes; packets pushed from other connections' handlers are
//! therefore serialized with this connection's own responses.
//!
//! Identity, game membership, network addresses and the ping timestamp are
//! only reachable through the accessor methods below.

pub mod notify;

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::core::packet::Packet;
use crate::game::GameId;
use crate::store::{Player, PlayerId};
use crate::utils::sync::{read, write};

pub type SessionId = u32;

/// One unit of outbound work for the connection task.
#[derive(Debug)]
pub enum Outbound {
    Packet(Packet),
    /// Written back to back with a single flush
    Batch(Vec<Packet>),
}

pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// IPv4 endpoint as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetAddress {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl Default for NetAddress {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::UNSPECIFIED,
            port: 0,
        }
    }
}

impl NetAddress {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Address as the big-endian integer carried in TDF content.
    pub fn ip_u32(&self) -> u32 {
        u32::from(self.ip)
    }
}

/// Last-known internal/external address pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkInfo {
    pub internal: NetAddress,
    pub external: NetAddress,
}

/// A session's membership in a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSlot {
    pub game_id: GameId,
    pub slot: usize,
}

/// Point-in-time copy of the fields notifications describe.
#[derive(Debug, Clone)]
pub struct SessionDetails {
    pub session_id: SessionId,
    pub player: Option<Player>,
    pub network: NetworkInfo,
    pub hardware_flags: u16,
    pub game: Option<GameSlot>,
}

#[derive(Debug, Default)]
struct SessionData {
    player: Option<Player>,
    game: Option<GameSlot>,
    matchmaking: bool,
    network: NetworkInfo,
    hardware_flags: u16,
    last_ping: Option<Instant>,
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    peer: Option<SocketAddr>,
    outbound: mpsc::UnboundedSender<Outbound>,
    data: RwLock<SessionData>,
}

impl Session {
    /// New session plus the receiving end of its outbound queue.
    pub fn new(id: SessionId, peer: Option<SocketAddr>) -> (Arc<Self>, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            id,
            peer,
            outbound: tx,
            data: RwLock::new(SessionData::default()),
        });
        (session, rx)
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Queue a packet for this connection.
    pub fn push(&self, packet: Packet) {
        trace!(session_id = self.id, ?packet, "Queued packet");
        if self.outbound.send(Outbound::Packet(packet)).is_err() {
            debug!(session_id = self.id, "Dropped packet for closed session");
        }
    }

    /// Queue several packets, written contiguously in the given order.
    pub fn push_all<I>(&self, packets: I)
    where
        I: IntoIterator<Item = Packet>,
    {
        let batch: Vec<Packet> = packets.into_iter().collect();
        if batch.is_empty() {
            return;
        }
        if self.outbound.send(Outbound::Batch(batch)).is_err() {
            debug!(session_id = self.id, "Dropped batch for closed session");
        }
    }

    /// Whether the connection task has gone away.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    pub fn player(&self) -> Option<Player> {
        read(&self.data).player.clone()
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        read(&self.data).player.as_ref().map(|p| p.id)
    }

    pub fn is_authenticated(&self) -> bool {
        read(&self.data).player.is_some()
    }

    pub fn set_player(&self, player: Option<Player>) {
        write(&self.data).player = player;
    }

    pub fn game(&self) -> Option<GameSlot> {
        read(&self.data).game
    }

    /// Link this session to `slot` unless it is already in another game.
    /// Returns the id of the game that holds it on failure.
    pub fn claim_game(&self, slot: GameSlot) -> std::result::Result<(), GameId> {
        let mut data = write(&self.data);
        match data.game {
            Some(current) if current.game_id != slot.game_id => Err(current.game_id),
            _ => {
                data.game = Some(slot);
                Ok(())
            }
        }
    }

    /// Clear the game link only if it still points at `game_id`.
    pub fn clear_game(&self, game_id: GameId) {
        let mut data = write(&self.data);
        if data.game.map(|g| g.game_id) == Some(game_id) {
            data.game = None;
        }
    }

    pub fn is_matchmaking(&self) -> bool {
        read(&self.data).matchmaking
    }

    pub fn set_matchmaking(&self, matchmaking: bool) {
        write(&self.data).matchmaking = matchmaking;
    }

    pub fn network_info(&self) -> NetworkInfo {
        read(&self.data).network
    }

    pub fn set_network_info(&self, network: NetworkInfo) {
        write(&self.data).network = network;
    }

    pub fn hardware_flags(&self) -> u16 {
        read(&self.data).hardware_flags
    }

    pub fn set_hardware_flags(&self, flags: u16) {
        write(&self.data).hardware_flags = flags;
    }

    /// Record a client ping. Nothing times out on a stale value.
    pub fn record_ping(&self) {
        write(&self.data).last_ping = Some(Instant::now());
    }

    pub fn last_ping(&self) -> Option<Instant> {
        read(&self.data).last_ping
    }

    pub fn details(&self) -> SessionDetails {
        let data = read(&self.data);
        SessionDetails {
            session_id: self.id,
            player: data.player.clone(),
            network: data.network,
            hardware_flags: data.hardware_flags,
            game: data.game,
        }
    }
}

/// Live sessions by id.
#[derive(Debug)]
pub struct SessionRegistry {
    next_id: AtomicU32,
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate an id and register a new session.
    pub fn create(&self, peer: Option<SocketAddr>) -> (Arc<Session>, OutboundReceiver) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (session, rx) = Session::new(id, peer);
        write(&self.sessions).insert(id, session.clone());
        debug!(session_id = id, ?peer, "Session registered");
        (session, rx)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        read(&self.sessions).get(&id).cloned()
    }

    pub fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        let removed = write(&self.sessions).remove(&id);
        if removed.is_some() {
            debug!(session_id = id, "Session deregistered");
        }
        removed
    }

    /// Session currently authenticated as `player_id`.
    pub fn find_by_player(&self, player_id: PlayerId) -> Option<Arc<Session>> {
        read(&self.sessions)
            .values()
            .find(|s| s.player_id() == Some(player_id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        read(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
