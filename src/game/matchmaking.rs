//! # Matchmaking
//!
//! Sessions looking for a game are either placed immediately into the first
//! live game whose attributes satisfy their [`RuleSet`], or queued. Each new
//! game is offered to the queue in FIFO order, never taking more sessions
//! than it has free slots.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, info};

use crate::error::BlazeError;
use crate::game::{AttributeMap, Game, GameManager, JoinContext, RuleSet};
use crate::session::{Session, SessionId};
use crate::utils::sync::{read, write};

#[derive(Debug)]
struct QueueEntry {
    session: Arc<Session>,
    rules: RuleSet,
    queued_at: Instant,
}

#[derive(Debug)]
pub struct Matchmaking {
    games: Arc<GameManager>,
    queue: RwLock<VecDeque<QueueEntry>>,
}

impl Matchmaking {
    pub fn new(games: Arc<GameManager>) -> Self {
        Self {
            games,
            queue: RwLock::new(VecDeque::new()),
        }
    }

    /// First joinable game matching `rules`; otherwise queue the session
    /// and return `None`. The caller joins the returned game.
    pub fn get_match_or_queue(&self, session: &Arc<Session>, rules: RuleSet) -> Option<Arc<Game>> {
        let found = self
            .games
            .find_game(|game| game.is_joinable() && rules.matches(&game.attributes()));
        match found {
            Some(game) => {
                debug!(session_id = session.id(), game_id = game.id(), "Matched existing game");
                Some(game)
            }
            None => {
                self.queue(session, rules);
                None
            }
        }
    }

    /// Add to the back of the queue, replacing any existing entry.
    ///
    /// The session's matchmaking flag only changes under the queue lock. It
    /// is set while the session has a queue entry or a join in flight.
    pub fn queue(&self, session: &Arc<Session>, rules: RuleSet) {
        {
            let mut queue = write(&self.queue);
            queue.retain(|entry| entry.session.id() != session.id());
            queue.push_back(QueueEntry {
                session: session.clone(),
                rules,
                queued_at: Instant::now(),
            });
            session.set_matchmaking(true);
        }
        debug!(session_id = session.id(), "Queued for matchmaking");
    }

    /// Offer a newly created game to queued sessions. Returns the sessions
    /// that were placed.
    pub fn on_new_game_created(&self, game: &Arc<Game>) -> Vec<SessionId> {
        let attributes = game.attributes();
        let free = game.free_slots();
        if free == 0 {
            return Vec::new();
        }

        let candidates = self.take_matching(&attributes, free);
        let mut placed = Vec::new();
        let mut requeue = Vec::new();
        for entry in candidates {
            match game.join(&entry.session, JoinContext::Matchmaking) {
                Ok(slot) => {
                    self.finish_in_flight(&entry.session);
                    info!(
                        session_id = entry.session.id(),
                        game_id = game.id(),
                        slot,
                        waited_ms = entry.queued_at.elapsed().as_millis() as u64,
                        "Matched queued session"
                    );
                    placed.push(entry.session.id());
                }
                Err(BlazeError::GameFull(_)) | Err(BlazeError::GameNotFound(_)) => {
                    requeue.push(entry)
                }
                Err(BlazeError::AlreadyInGame { game: other, .. }) => {
                    debug!(
                        session_id = entry.session.id(),
                        game_id = other,
                        "Queued session already placed elsewhere"
                    );
                    self.finish_in_flight(&entry.session);
                }
                Err(e) => {
                    debug!(session_id = entry.session.id(), error = %e, "Dropped queue entry");
                    self.finish_in_flight(&entry.session);
                }
            }
        }

        self.requeue_front(requeue);
        placed
    }

    /// Take up to `limit` live entries matching `attributes`, oldest first.
    fn take_matching(&self, attributes: &AttributeMap, limit: usize) -> Vec<QueueEntry> {
        let mut queue = write(&self.queue);
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(queue.len());
        for entry in queue.drain(..) {
            if taken.len() < limit && !entry.session.is_closed() && entry.rules.matches(attributes) {
                taken.push(entry);
            } else {
                kept.push_back(entry);
            }
        }
        *queue = kept;
        taken
    }

    /// Put failed joins back at the front, keeping their order.
    fn requeue_front(&self, entries: Vec<QueueEntry>) {
        if entries.is_empty() {
            return;
        }
        let mut queue = write(&self.queue);
        // Entries cancelled or disconnected while in flight are dropped
        for entry in entries.into_iter().rev() {
            let id = entry.session.id();
            if entry.session.is_matchmaking()
                && !entry.session.is_closed()
                && !queue.iter().any(|queued| queued.session.id() == id)
            {
                queue.push_front(entry);
            } else {
                debug!(session_id = id, "Not requeueing cancelled entry");
            }
        }
    }

    /// Clear the flag of a session taken off the queue, unless it queued
    /// again in the meantime.
    fn finish_in_flight(&self, session: &Session) {
        let queue = write(&self.queue);
        if !queue.iter().any(|entry| entry.session.id() == session.id()) {
            session.set_matchmaking(false);
        }
    }

    /// Clear the queue entry and the session's queued flag. Returns whether
    /// the session was matchmaking, including a join still in flight.
    pub fn remove_from_queue(&self, session: &Session) -> bool {
        let removed = {
            let mut queue = write(&self.queue);
            let before = queue.len();
            queue.retain(|entry| entry.session.id() != session.id());
            let was_matchmaking = session.is_matchmaking();
            session.set_matchmaking(false);
            queue.len() != before || was_matchmaking
        };
        if removed {
            debug!(session_id = session.id(), "Removed from matchmaking queue");
        }
        removed
    }

    pub fn is_queued(&self, session_id: SessionId) -> bool {
        read(&self.queue)
            .iter()
            .any(|entry| entry.session.id() == session_id)
    }

    pub fn queue_len(&self) -> usize {
        read(&self.queue).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::rules::ABSTAIN;
    use crate::game::test_support::player_session;

    fn map_rule(map: &str) -> RuleSet {
        RuleSet::new([("ME3_gameMapMatchRule", map)])
    }

    fn map_attrs(map: &str) -> AttributeMap {
        [("ME3map".to_string(), map.to_string())].into()
    }

    #[test]
    fn matches_existing_game_without_queueing() {
        let games = Arc::new(GameManager::new());
        let mm = Matchmaking::new(games.clone());
        let (host, _rh) = player_session(1);
        let game = games.create_game(&host, map_attrs("map2"), 0).unwrap();

        let (seeker, _rs) = player_session(2);
        let found = mm.get_match_or_queue(&seeker, map_rule("map2")).unwrap();
        assert_eq!(found.id(), game.id());
        assert_eq!(mm.queue_len(), 0);
        assert!(!seeker.is_matchmaking());
    }

    #[test]
    fn no_match_queues_session() {
        let games = Arc::new(GameManager::new());
        let mm = Matchmaking::new(games.clone());
        let (host, _rh) = player_session(1);
        games.create_game(&host, map_attrs("map2"), 0).unwrap();

        let (seeker, _rs) = player_session(2);
        assert!(mm.get_match_or_queue(&seeker, map_rule("map9")).is_none());
        assert!(mm.is_queued(seeker.id()));
        assert!(seeker.is_matchmaking());

        assert!(mm.remove_from_queue(&seeker));
        assert!(!seeker.is_matchmaking());
        assert!(!mm.remove_from_queue(&seeker));
    }

    #[test]
    fn new_game_takes_only_free_slots_in_fifo_order() {
        let games = Arc::new(GameManager::new());
        let mm = Matchmaking::new(games.clone());
        let mut sessions = Vec::new();
        for id in 2..=6 {
            let (s, rx) = player_session(id);
            assert!(mm.get_match_or_queue(&s, RuleSet::new([("ME3_gameMapMatchRule", ABSTAIN)])).is_none());
            sessions.push((s, rx));
        }
        assert_eq!(mm.queue_len(), 5);

        let (host, _rh) = player_session(1);
        let game = games.create_game(&host, map_attrs("map1"), 0).unwrap();
        let placed = mm.on_new_game_created(&game);

        let expected: Vec<SessionId> = sessions[..3].iter().map(|(s, _)| s.id()).collect();
        assert_eq!(placed, expected);
        assert_eq!(game.player_count(), 4);
        assert_eq!(mm.queue_len(), 2);
        assert!(mm.is_queued(sessions[3].0.id()));
        assert!(sessions[4].0.is_matchmaking());
    }

    #[test]
    fn non_matching_entries_stay_queued() {
        let games = Arc::new(GameManager::new());
        let mm = Matchmaking::new(games.clone());
        let (wants_map3, _r1) = player_session(2);
        let (wants_map1, _r2) = player_session(3);
        mm.queue(&wants_map3, map_rule("map3"));
        mm.queue(&wants_map1, map_rule("map1"));

        let (host, _rh) = player_session(1);
        let game = games.create_game(&host, map_attrs("map1"), 0).unwrap();
        assert_eq!(mm.on_new_game_created(&game), vec![wants_map1.id()]);
        assert!(mm.is_queued(wants_map3.id()));
    }

    #[test]
    fn cancel_during_join_is_not_requeued() {
        let games = Arc::new(GameManager::new());
        let mm = Matchmaking::new(games);
        let (seeker, _rs) = player_session(2);
        let (waiting, _rw) = player_session(3);
        mm.queue(&seeker, RuleSet::abstain_all());
        mm.queue(&waiting, RuleSet::abstain_all());

        let in_flight = mm.take_matching(&map_attrs("map1"), 1);
        assert_eq!(in_flight.len(), 1);
        assert!(seeker.is_matchmaking());

        // Counts as a cancel even though the entry is off the queue
        assert!(mm.remove_from_queue(&seeker));
        mm.requeue_front(in_flight);

        assert!(!mm.is_queued(seeker.id()));
        assert!(!seeker.is_matchmaking());
        assert_eq!(mm.queue_len(), 1);
        assert!(mm.is_queued(waiting.id()));
    }

    #[test]
    fn failed_join_goes_back_to_the_front() {
        let games = Arc::new(GameManager::new());
        let mm = Matchmaking::new(games);
        let (first, _r1) = player_session(2);
        let (second, _r2) = player_session(3);
        mm.queue(&first, RuleSet::abstain_all());
        mm.queue(&second, RuleSet::abstain_all());

        let in_flight = mm.take_matching(&map_attrs("map1"), 1);
        mm.requeue_front(in_flight);
        assert_eq!(mm.take_matching(&map_attrs("map1"), 1)[0].session.id(), first.id());
        assert!(first.is_matchmaking());
    }

    #[test]
    fn queued_session_placed_elsewhere_is_dropped() {
        let games = Arc::new(GameManager::new());
        let mm = Matchmaking::new(games.clone());
        let (seeker, _rs) = player_session(2);
        mm.queue(&seeker, RuleSet::abstain_all());

        // Seeker hosts its own game while its queue entry is still live
        let own = games.create_game(&seeker, AttributeMap::new(), 0).unwrap();
        let (host, _rh) = player_session(1);
        let other = games.create_game(&host, AttributeMap::new(), 0).unwrap();

        assert!(mm.on_new_game_created(&other).is_empty());
        assert_eq!(other.player_count(), 1);
        assert_eq!(seeker.game().map(|g| g.game_id), Some(own.id()));
        assert_eq!(mm.queue_len(), 0);
        assert!(!seeker.is_matchmaking());
    }
}
