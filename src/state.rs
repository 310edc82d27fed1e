//! Process-wide server state shared by every connection and handler.

use std::sync::Arc;

use tracing::debug;

use crate::game::{GameManager, Matchmaking, RemoveOutcome};
use crate::session::{Session, SessionRegistry};
use crate::store::{DataStore, MemoryStore};
use crate::utils::metrics::Metrics;

/// Removal reason sent when a player's connection goes away.
pub const REMOVE_REASON_DISCONNECTED: i64 = 0x1;

/// Removal reason sent when a player leaves on their own.
pub const REMOVE_REASON_LEFT: i64 = 0x6;

pub struct ServerState {
    pub sessions: SessionRegistry,
    pub games: Arc<GameManager>,
    pub matchmaking: Matchmaking,
    pub store: Arc<dyn DataStore>,
    pub metrics: Arc<Metrics>,
}

impl ServerState {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        let games = Arc::new(GameManager::new());
        Self {
            sessions: SessionRegistry::new(),
            matchmaking: Matchmaking::new(games.clone()),
            games,
            store,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// State backed by an empty [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Leave the matchmaking queue and any current game.
    pub fn leave_activities(&self, session: &Session, reason: i64) {
        self.matchmaking.remove_from_queue(session);
        if self.games.remove_session(session, reason) == RemoveOutcome::Emptied {
            self.metrics.game_released();
        }
    }

    /// Cleanup once a connection has closed.
    pub fn on_disconnect(&self, session: &Session) {
        self.leave_activities(session, REMOVE_REASON_DISCONNECTED);
        self.sessions.remove(session.id());
        debug!(session_id = session.id(), "Session cleaned up");
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("sessions", &self.sessions.len())
            .field("games", &self.games.len())
            .field("queued", &self.matchmaking.queue_len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlazeError;
    use crate::game::{AttributeMap, JoinContext, RuleSet};
    use crate::store::Player;

    #[test]
    fn disconnect_releases_everything() {
        let state = ServerState::in_memory();
        let (host, _rh) = state.sessions.create(None);
        host.set_player(Some(Player {
            id: 1,
            display_name: "Host".into(),
        }));
        let (seeker, _rs) = state.sessions.create(None);
        seeker.set_player(Some(Player {
            id: 2,
            display_name: "Seeker".into(),
        }));

        state.games.create_game(&host, AttributeMap::new(), 0).unwrap();
        state.matchmaking.queue(&seeker, RuleSet::new([("ME3_gameMapMatchRule", "map9")]));

        state.on_disconnect(&host);
        state.on_disconnect(&seeker);
        assert!(state.games.is_empty());
        assert_eq!(state.matchmaking.queue_len(), 0);
        assert!(state.sessions.is_empty());
        assert_eq!(state.metrics.snapshot().games_released, 1);
    }

    #[test]
    fn rejected_second_join_still_releases_first_game() {
        let state = ServerState::in_memory();
        let (a, _ra) = state.sessions.create(None);
        a.set_player(Some(Player {
            id: 1,
            display_name: "Wrex".into(),
        }));
        let (b, _rb) = state.sessions.create(None);
        b.set_player(Some(Player {
            id: 2,
            display_name: "Tali".into(),
        }));

        let first = state.games.create_game(&a, AttributeMap::new(), 0).unwrap();
        let second = state.games.create_game(&b, AttributeMap::new(), 0).unwrap();
        assert!(matches!(
            second.join(&a, JoinContext::Matchmaking),
            Err(BlazeError::AlreadyInGame { .. })
        ));
        assert!(!second.contains_player(1));

        state.on_disconnect(&a);
        assert!(state.games.get_game_by_id(first.id()).is_none());
        assert!(!first.is_active());
        assert!(state.games.get_game_by_id(second.id()).is_some());
    }
}
