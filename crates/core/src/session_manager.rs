//! Session lifecycle management and action routing
//!
//! One manager per game kind. Creates sessions from a lobby roster,
//! routes player actions to the session holding that player, and
//! closes sessions that ended or emptied. The caller's session is
//! resolved by roster membership scan; O(sessions) is fine at the
//! scale this framework targets.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::collab::{Broadcaster, FinishedGame, GameArchive, NullBroadcaster};
use crate::config::SessionCore;
use crate::error::{Error, Result};
use crate::ids::{PlayerId, SessionKey};
use crate::notice::{Audience, Notice, NoticeBody};
use crate::registry::ConcurrentRegistry;
use crate::session::{GameFactory, Session, TurnGame};
use crate::timer::TurnTimer;

pub struct SessionManager<F: GameFactory> {
    core: SessionCore<SessionKey>,
    sessions: ConcurrentRegistry<Session<F::Game>>,
    factory: F,
    turn_timeout: Option<Duration>,
    broadcaster: Arc<dyn Broadcaster>,
    archive: Option<Arc<dyn GameArchive>>,
}

impl<F: GameFactory> SessionManager<F> {
    pub fn new(core: SessionCore<SessionKey>, factory: F) -> Self {
        Self {
            core,
            sessions: ConcurrentRegistry::new(),
            factory,
            turn_timeout: None,
            broadcaster: Arc::new(NullBroadcaster),
            archive: None,
        }
    }

    /// Enable per-turn forfeiture timers for games that want them.
    pub fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = Some(timeout);
        self
    }

    /// Attach the push collaborator used for transitions no caller is
    /// waiting on (timer forfeitures).
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    pub fn with_archive(mut self, archive: Arc<dyn GameArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn core(&self) -> &SessionCore<SessionKey> {
        &self.core
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Create a session for a lobby roster.
    ///
    /// Rejects rosters outside the configured player bounds; fails
    /// with a capacity error when every game code is leased.
    pub fn try_start(
        self: &Arc<Self>,
        players: Vec<PlayerId>,
        settings: &serde_json::Value,
    ) -> Result<(SessionKey, Vec<Notice>)> {
        if players.len() < self.core.min_players() || players.len() > self.core.max_players() {
            return Err(Error::Rejected(format!(
                "{} games take {}..={} players, got {}",
                self.core.name(),
                self.core.min_players(),
                self.core.max_players(),
                players.len()
            )));
        }
        for player in &players {
            if self.find_of(player).is_some() {
                return Err(Error::Conflict(format!(
                    "player {player} is already in a game"
                )));
            }
        }

        let key = self
            .core
            .lease_key()
            .ok_or_else(|| Error::Capacity("no free game codes".into()))?;
        let game = match self.factory.create(players.len(), settings) {
            Ok(game) => game,
            Err(e) => {
                self.core.release_key(key);
                return Err(e);
            }
        };

        let timer = match (self.turn_timeout, game.uses_turn_timer()) {
            (Some(timeout), true) => Some(TurnTimer::new(timeout)),
            _ => None,
        };

        let session = Arc::new(Session::new(key, players, game, timer));
        self.arm_timer(&session, 0);
        let notices = session
            .players()
            .iter()
            .map(|player| {
                Notice::new(
                    Audience::Player(player.clone()),
                    NoticeBody::GameStarted {
                        session: self.core.render_key(key),
                    },
                )
            })
            .collect();
        self.sessions.insert(Arc::clone(&session));

        tracing::info!(
            game = %self.core.render_key(key),
            players = session.players().len(),
            "session started"
        );
        Ok((key, notices))
    }

    /// Apply a move from a player, returning their refreshed state
    /// view plus the notices to deliver.
    pub fn make_move(
        self: &Arc<Self>,
        player: &PlayerId,
        payload: &serde_json::Value,
    ) -> Result<(serde_json::Value, Vec<Notice>)> {
        let session = self.resolve(player)?;
        let seat = seat_of(&session, player)?;

        let (transition, epoch, winner, view) = {
            let mut slot = session.state();
            if slot.game.winner().is_some() {
                return Err(Error::Conflict("the game has already ended".into()));
            }
            if !slot.game.is_player_turn(seat) {
                return Err(Error::Rejected("it is not your turn".into()));
            }
            let transition = slot.game.apply_action(seat, payload)?;
            slot.turn_epoch += 1;
            let epoch = slot.turn_epoch;
            let winner = slot.game.winner();
            let view = slot.game.relative_state(seat);
            (transition, epoch, winner, view)
        };

        let mut notices = self.map_notices(&session, transition.notices);
        if winner.is_some() {
            notices.extend(self.finalize_terminal(&session));
        } else if transition.turn_advanced {
            self.arm_timer(&session, epoch);
        }
        Ok((view, notices))
    }

    /// Voluntary surrender.
    pub fn surrender(self: &Arc<Self>, player: &PlayerId) -> Result<Vec<Notice>> {
        let session = self.resolve(player)?;
        let seat = seat_of(&session, player)?;

        let (transition, epoch, winner) = {
            let mut slot = session.state();
            if slot.game.winner().is_some() {
                return Err(Error::Conflict("the game has already ended".into()));
            }
            let transition = slot.game.surrender(seat);
            slot.turn_epoch += 1;
            (transition, slot.turn_epoch, slot.game.winner())
        };

        tracing::info!(game = %self.core.render_key(session.key), %player, "player surrendered");
        let mut notices = self.map_notices(&session, transition.notices);
        if winner.is_some() {
            notices.extend(self.finalize_terminal(&session));
        } else {
            self.arm_timer(&session, epoch);
        }
        Ok(notices)
    }

    /// Out-of-band request, e.g. "repeat last offer" on reconnect.
    pub fn request(
        &self,
        player: &PlayerId,
        payload: &serde_json::Value,
    ) -> Result<Vec<Notice>> {
        let session = self.resolve(player)?;
        let seat = seat_of(&session, player)?;
        let transition = session.state().game.request(seat, payload)?;
        Ok(self.map_notices(&session, transition.notices))
    }

    /// The caller's relative state view.
    pub fn get_state(&self, player: &PlayerId) -> Result<serde_json::Value> {
        let session = self.resolve(player)?;
        let seat = seat_of(&session, player)?;
        let view = session.state().game.relative_state(seat);
        Ok(view)
    }

    pub fn connect(&self, player: &PlayerId) -> Result<()> {
        let session = self.resolve(player)?;
        session.set_connected(player, true);
        Ok(())
    }

    /// Disconnects never corrupt the roster and never end the game;
    /// a session with zero connected players stays alive.
    pub fn disconnect(&self, player: &PlayerId) -> Result<()> {
        let session = self.resolve(player)?;
        session.set_connected(player, false);
        Ok(())
    }

    /// Explicit departure. A session empty of players is closed and
    /// discarded without a finished-game record.
    pub fn leave(&self, player: &PlayerId) -> Result<Vec<Notice>> {
        let session = self.resolve(player)?;
        if session.mark_departed(player) {
            self.close_session(&session);
            tracing::info!(
                game = %self.core.render_key(session.key),
                "session abandoned by all players"
            );
            return Ok(vec![Notice::new(
                Audience::Session(session.key),
                NoticeBody::SessionClosed,
            )]);
        }
        Ok(Vec::new())
    }

    fn resolve(&self, player: &PlayerId) -> Result<Arc<Session<F::Game>>> {
        self.find_of(player)
            .ok_or_else(|| Error::NotFound(format!("player {player} is not in a game")))
    }

    fn find_of(&self, player: &PlayerId) -> Option<Arc<Session<F::Game>>> {
        self.sessions.find(|s| s.contains(player))
    }

    pub fn find_by_key(&self, key: SessionKey) -> Option<Arc<Session<F::Game>>> {
        self.sessions.find(|s| s.key == key)
    }

    fn map_notices(
        &self,
        session: &Arc<Session<F::Game>>,
        notices: Vec<crate::notice::GameNotice>,
    ) -> Vec<Notice> {
        session
            .resolve_recipients(notices)
            .into_iter()
            .map(|(recipient, body)| match recipient {
                Some(player) => Notice::new(Audience::Player(player), NoticeBody::Game { body }),
                None => Notice::new(Audience::Session(session.key), NoticeBody::Game { body }),
            })
            .collect()
    }

    /// Close out a session whose winner was just set. Archival and
    /// push failures never roll anything back; state committed first.
    fn finalize_terminal(&self, session: &Arc<Session<F::Game>>) -> Vec<Notice> {
        let winner = session.winner_id();
        self.close_session(session);

        if let Some(archive) = &self.archive {
            let winners: Vec<PlayerId> = winner.iter().cloned().collect();
            let losers = session
                .players()
                .iter()
                .filter(|p| Some(*p) != winner.as_ref())
                .cloned()
                .collect();
            archive.record_finished_game(&FinishedGame {
                winners,
                losers,
                started_at: session.started_at,
                ended_at: Utc::now(),
            });
        }

        tracing::info!(
            game = %self.core.render_key(session.key),
            winner = winner.as_ref().map(|w| w.as_str()).unwrap_or("none"),
            "session finished"
        );
        vec![Notice::new(
            Audience::Session(session.key),
            NoticeBody::GameEnded { winner },
        )]
    }

    fn close_session(&self, session: &Arc<Session<F::Game>>) {
        if let Some(timer) = session.timer() {
            timer.cancel();
        }
        self.sessions.remove(|s| s.key == session.key);
        self.core.release_key(session.key);
    }

    fn arm_timer(self: &Arc<Self>, session: &Arc<Session<F::Game>>, epoch: u64) {
        let Some(timer) = session.timer() else {
            return;
        };
        let manager = Arc::clone(self);
        let key = session.key;
        timer.rearm(async move {
            manager.forfeit_stale_turn(key, epoch);
        });
    }

    /// Timer-driven forfeiture: modeled as an internally generated
    /// surrender by the player whose turn it was. Takes the same
    /// session lock as player actions; a legal move that beat the
    /// timer bumped the epoch, making this firing a no-op.
    fn forfeit_stale_turn(self: &Arc<Self>, key: SessionKey, epoch: u64) {
        let Some(session) = self.find_by_key(key) else {
            return;
        };

        let (transition, seat, new_epoch, winner) = {
            let mut slot = session.state();
            if slot.turn_epoch != epoch || slot.game.winner().is_some() {
                return;
            }
            let Some(seat) =
                (0..slot.game.player_count()).find(|s| slot.game.is_player_turn(*s))
            else {
                return;
            };
            let transition = slot.game.surrender(seat);
            slot.turn_epoch += 1;
            (transition, seat, slot.turn_epoch, slot.game.winner())
        };

        tracing::warn!(
            game = %self.core.render_key(key),
            seat,
            "turn timed out, forfeiting"
        );
        let mut notices = self.map_notices(&session, transition.notices);
        if winner.is_some() {
            notices.extend(self.finalize_terminal(&session));
        } else {
            self.arm_timer(&session, new_epoch);
        }
        for notice in &notices {
            self.broadcaster.deliver(notice);
        }
    }
}

fn seat_of<G: TurnGame>(session: &Session<G>, player: &PlayerId) -> Result<usize> {
    session
        .seat_of(player)
        .ok_or_else(|| Error::Unauthorized(format!("player {player} is not in this game")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Transition;
    use std::sync::Mutex;

    /// Two-seat stub: "win" ends the game, anything else passes the
    /// turn. Timer usage is configurable per factory.
    struct StubGame {
        turn: usize,
        winner: Option<usize>,
        timed: bool,
    }

    impl TurnGame for StubGame {
        fn player_count(&self) -> usize {
            2
        }

        fn is_player_turn(&self, seat: usize) -> bool {
            self.turn == seat && self.winner.is_none()
        }

        fn relative_state(&self, seat: usize) -> serde_json::Value {
            serde_json::json!({ "seat": seat, "turn": self.turn })
        }

        fn apply_action(
            &mut self,
            seat: usize,
            payload: &serde_json::Value,
        ) -> Result<Transition> {
            if payload["kind"] == "illegal" {
                return Err(Error::Rejected("illegal stub action".into()));
            }
            if payload["kind"] == "win" {
                self.winner = Some(seat);
            }
            self.turn = 1 - self.turn;
            Ok(Transition::advanced(vec![
                crate::notice::GameNotice::all(serde_json::json!({"kind": "moved"})),
            ]))
        }

        fn surrender(&mut self, seat: usize) -> Transition {
            self.winner = Some(1 - seat);
            Transition::advanced(Vec::new())
        }

        fn winner(&self) -> Option<usize> {
            self.winner
        }

        fn uses_turn_timer(&self) -> bool {
            self.timed
        }
    }

    struct StubFactory {
        timed: bool,
    }

    impl GameFactory for StubFactory {
        type Game = StubGame;

        fn create(&self, players: usize, _settings: &serde_json::Value) -> Result<StubGame> {
            assert_eq!(players, 2);
            Ok(StubGame {
                turn: 0,
                winner: None,
                timed: self.timed,
            })
        }
    }

    #[derive(Default)]
    struct RecordingArchive {
        records: Mutex<Vec<FinishedGame>>,
    }

    impl GameArchive for RecordingArchive {
        fn record_finished_game(&self, record: &FinishedGame) {
            self.records.lock().unwrap().push(record.clone());
        }
    }

    fn manager(timed: bool) -> Arc<SessionManager<StubFactory>> {
        Arc::new(SessionManager::new(
            SessionCore::new("stub", 8, 2, 2),
            StubFactory { timed },
        ))
    }

    fn roster() -> Vec<PlayerId> {
        vec!["a".into(), "b".into()]
    }

    #[test]
    fn start_routes_and_ends() {
        let mgr = manager(false);
        let (_, notices) = mgr.try_start(roster(), &serde_json::Value::Null).unwrap();
        assert_eq!(notices.len(), 2);
        assert_eq!(mgr.session_count(), 1);

        // Wrong player's turn.
        let err = mgr
            .make_move(&"b".into(), &serde_json::json!({"kind": "pass"}))
            .unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));

        mgr.make_move(&"a".into(), &serde_json::json!({"kind": "pass"}))
            .unwrap();
        let (_, notices) = mgr
            .make_move(&"b".into(), &serde_json::json!({"kind": "win"}))
            .unwrap();

        // Terminal session closes immediately and announces the end.
        assert!(notices
            .iter()
            .any(|n| matches!(&n.body, NoticeBody::GameEnded { winner: Some(w) } if w.as_str() == "b")));
        assert_eq!(mgr.session_count(), 0);
        assert!(mgr.get_state(&"a".into()).is_err());
    }

    #[test]
    fn rejected_action_leaves_state_unchanged() {
        let mgr = manager(false);
        mgr.try_start(roster(), &serde_json::Value::Null).unwrap();

        let before = mgr.get_state(&"a".into()).unwrap();
        let err = mgr
            .make_move(&"a".into(), &serde_json::json!({"kind": "illegal"}))
            .unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
        assert_eq!(mgr.get_state(&"a".into()).unwrap(), before);
    }

    #[test]
    fn get_state_is_relative_to_the_caller() {
        let mgr = manager(false);
        mgr.try_start(roster(), &serde_json::Value::Null).unwrap();

        let a = mgr.get_state(&"a".into()).unwrap();
        let b = mgr.get_state(&"b".into()).unwrap();
        assert_eq!(a["seat"], 0);
        assert_eq!(b["seat"], 1);
        assert_eq!(a["turn"], b["turn"]);
    }

    #[test]
    fn roster_bounds_are_enforced() {
        let mgr = manager(false);
        let err = mgr
            .try_start(vec!["a".into()], &serde_json::Value::Null)
            .unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
    }

    #[test]
    fn one_game_per_player() {
        let mgr = manager(false);
        mgr.try_start(roster(), &serde_json::Value::Null).unwrap();
        let err = mgr
            .try_start(vec!["a".into(), "c".into()], &serde_json::Value::Null)
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn surrender_finishes_and_archives() {
        let archive = Arc::new(RecordingArchive::default());
        let mgr = Arc::new(
            SessionManager::new(SessionCore::new("stub", 8, 2, 2), StubFactory { timed: false })
                .with_archive(archive.clone() as Arc<dyn GameArchive>),
        );
        mgr.try_start(roster(), &serde_json::Value::Null).unwrap();

        mgr.surrender(&"a".into()).unwrap();
        let records = archive.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].winners, vec![PlayerId::from("b")]);
        assert_eq!(records[0].losers, vec![PlayerId::from("a")]);
        assert_eq!(mgr.session_count(), 0);
    }

    #[test]
    fn disconnect_does_not_close_the_session() {
        let mgr = manager(false);
        mgr.try_start(roster(), &serde_json::Value::Null).unwrap();

        mgr.disconnect(&"a".into()).unwrap();
        mgr.disconnect(&"b".into()).unwrap();
        assert_eq!(mgr.session_count(), 1);

        mgr.connect(&"a".into()).unwrap();
        assert_eq!(mgr.session_count(), 1);
    }

    #[test]
    fn player_empty_session_closes() {
        let mgr = manager(false);
        mgr.try_start(roster(), &serde_json::Value::Null).unwrap();
        let keys_before = mgr.core().available_keys();

        assert!(mgr.leave(&"a".into()).unwrap().is_empty());
        assert_eq!(mgr.session_count(), 1);

        let notices = mgr.leave(&"b".into()).unwrap();
        assert!(!notices.is_empty());
        assert_eq!(mgr.session_count(), 0);
        assert_eq!(mgr.core().available_keys(), keys_before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn turn_timeout_forfeits_through_surrender() {
        let archive = Arc::new(RecordingArchive::default());
        let mgr = Arc::new(
            SessionManager::new(SessionCore::new("stub", 8, 2, 2), StubFactory { timed: true })
                .with_turn_timeout(Duration::from_secs(60))
                .with_archive(archive.clone() as Arc<dyn GameArchive>),
        );
        mgr.try_start(roster(), &serde_json::Value::Null).unwrap();

        // Seat 0 never moves; the timer forfeits them.
        tokio::time::sleep(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert_eq!(mgr.session_count(), 0);
        let records = archive.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].winners, vec![PlayerId::from("b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn timely_move_resets_the_timer() {
        let mgr = Arc::new(
            SessionManager::new(SessionCore::new("stub", 8, 2, 2), StubFactory { timed: true })
                .with_turn_timeout(Duration::from_secs(60)),
        );
        mgr.try_start(roster(), &serde_json::Value::Null).unwrap();

        tokio::time::sleep(Duration::from_secs(40)).await;
        mgr.make_move(&"a".into(), &serde_json::json!({"kind": "pass"}))
            .unwrap();

        // The old deadline passes without firing; the new one is live.
        tokio::time::sleep(Duration::from_secs(40)).await;
        tokio::task::yield_now().await;
        assert_eq!(mgr.session_count(), 1);

        tokio::time::sleep(Duration::from_secs(21)).await;
        tokio::task::yield_now().await;
        assert_eq!(mgr.session_count(), 0);
    }
}
