//! Registry of live games.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::error::{BlazeError, Result};
use crate::game::{AttributeMap, Game, GameId, RemoveOutcome};
use crate::session::Session;
use crate::store::PlayerId;
use crate::utils::sync::{read, write};

/// Offsets applied to the allocation counter.
const GAME_ID_BASE: u32 = 1;
const MATCHMAKING_ID_BASE: u32 = 0x1000_0001;

#[derive(Debug, Default)]
struct Registry {
    /// Keyed by id, so iteration visits the oldest game first
    games: BTreeMap<GameId, Arc<Game>>,
    counter: u32,
}

#[derive(Debug, Default)]
pub struct GameManager {
    registry: RwLock<Registry>,
}

impl GameManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict inactive games, then register a new game hosted by `host`.
    pub fn create_game(
        &self,
        host: &Arc<Session>,
        attributes: AttributeMap,
        setting: u16,
    ) -> Result<Arc<Game>> {
        let game = {
            let mut registry = write(&self.registry);
            let before = registry.games.len();
            registry.games.retain(|_, game| game.is_active());
            let evicted = before - registry.games.len();
            if evicted > 0 {
                debug!(evicted, "Evicted inactive games");
            }

            let counter = registry.counter;
            let id = GAME_ID_BASE.wrapping_add(counter);
            let mid = MATCHMAKING_ID_BASE.wrapping_add(counter);
            let game = Arc::new(Game::new(id, mid, host, attributes, setting)?);
            registry.counter = counter.wrapping_add(1);
            registry.games.insert(id, game.clone());
            game
        };
        info!(game_id = game.id(), host = host.id(), "Game created");
        game.notify_created();
        Ok(game)
    }

    pub fn get_game_by_id(&self, id: GameId) -> Option<Arc<Game>> {
        read(&self.registry).games.get(&id).cloned()
    }

    /// First active game accepted by `predicate`, oldest first.
    pub fn find_game<F>(&self, predicate: F) -> Option<Arc<Game>>
    where
        F: Fn(&Game) -> bool,
    {
        read(&self.registry)
            .games
            .values()
            .find(|game| game.is_active() && predicate(game))
            .cloned()
    }

    /// Remove a player and release the game if that emptied it.
    pub fn remove_player(
        &self,
        game_id: GameId,
        player_id: PlayerId,
        reason: i64,
    ) -> Result<RemoveOutcome> {
        let game = self
            .get_game_by_id(game_id)
            .ok_or(BlazeError::GameNotFound(game_id))?;
        let outcome = game.remove_player(player_id, reason);
        if outcome == RemoveOutcome::Emptied {
            self.release(game_id);
        }
        Ok(outcome)
    }

    /// Take `session` out of whatever game it is in.
    pub fn remove_session(&self, session: &Session, reason: i64) -> RemoveOutcome {
        let Some(slot) = session.game() else {
            return RemoveOutcome::NotMember;
        };
        let Some(game) = self.get_game_by_id(slot.game_id) else {
            session.clear_game(slot.game_id);
            return RemoveOutcome::NotMember;
        };
        let outcome = game.remove_session(session, reason);
        if outcome == RemoveOutcome::Emptied {
            self.release(slot.game_id);
        }
        outcome
    }

    /// Drop a game from the registry.
    pub fn release(&self, game_id: GameId) -> Option<Arc<Game>> {
        let removed = write(&self.registry).games.remove(&game_id);
        if removed.is_some() {
            info!(game_id, "Game released");
        }
        removed
    }

    pub fn len(&self) -> usize {
        read(&self.registry).games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::test_support::player_session;
    use crate::game::JoinContext;

    #[test]
    fn ids_increase_with_paired_mid() {
        let manager = GameManager::new();
        let (a, _ra) = player_session(1);
        let (b, _rb) = player_session(2);
        let g1 = manager.create_game(&a, AttributeMap::new(), 0).unwrap();
        let g2 = manager.create_game(&b, AttributeMap::new(), 0).unwrap();
        assert_eq!(g2.id(), g1.id() + 1);
        assert_eq!(g2.mid(), g1.mid() + 1);
        assert_ne!(g1.id(), g1.mid());
    }

    #[test]
    fn removing_lone_host_releases_game() {
        let manager = GameManager::new();
        let (host, _rx) = player_session(1);
        let game = manager.create_game(&host, AttributeMap::new(), 0).unwrap();
        let outcome = manager.remove_player(game.id(), 101, 0).unwrap();
        assert_eq!(outcome, RemoveOutcome::Emptied);
        assert!(manager.get_game_by_id(game.id()).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn inactive_games_are_swept_on_create() {
        let manager = GameManager::new();
        let (host, _rx) = player_session(1);
        let game = manager.create_game(&host, AttributeMap::new(), 0).unwrap();
        // Bypass the manager so the emptied game stays registered
        game.remove_player(101, 0);
        assert_eq!(manager.len(), 1);
        assert!(manager.find_game(|_| true).is_none());

        let (other, _ro) = player_session(2);
        manager.create_game(&other, AttributeMap::new(), 0).unwrap();
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn find_game_is_oldest_first() {
        let manager = GameManager::new();
        let (a, _ra) = player_session(1);
        let (b, _rb) = player_session(2);
        let first = manager.create_game(&a, AttributeMap::new(), 0).unwrap();
        manager.create_game(&b, AttributeMap::new(), 0).unwrap();
        assert_eq!(manager.find_game(|g| g.is_joinable()).map(|g| g.id()), Some(first.id()));
    }

    #[test]
    fn unknown_game_is_reported() {
        let manager = GameManager::new();
        assert!(matches!(
            manager.remove_player(42, 1, 0),
            Err(BlazeError::GameNotFound(42))
        ));
    }

    #[test]
    fn remove_session_follows_link() {
        let manager = GameManager::new();
        let (host, _rh) = player_session(1);
        let (guest, _rg) = player_session(2);
        let game = manager.create_game(&host, AttributeMap::new(), 0).unwrap();
        game.join(&guest, JoinContext::Matchmaking).unwrap();
        assert_eq!(manager.remove_session(&guest, 0), RemoveOutcome::Removed);
        assert!(guest.game().is_none());
        assert_eq!(game.player_count(), 1);
    }
}
