//! Active game sessions and the contract games implement
//!
//! A session owns one game instance and its turn/winner bookkeeping.
//! The roster is fixed at creation; seats are roster indices, and the
//! game state machine speaks only in seats. All state transitions are
//! synchronous and non-reentrant: the game sits behind one mutex, and
//! player presence behind another so connect/disconnect never contends
//! with move validation.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::ids::{PlayerId, SessionKey};
use crate::invariants::assert_roster_invariants;
use crate::notice::GameNotice;
use crate::timer::TurnTimer;

/// Result of one accepted game action.
#[derive(Debug, Default)]
pub struct Transition {
    /// Outbound notifications for the transport to drain.
    pub notices: Vec<GameNotice>,
    /// Whether turn ownership moved or the turn restarted; used to
    /// rearm the turn timer.
    pub turn_advanced: bool,
}

impl Transition {
    pub fn advanced(notices: Vec<GameNotice>) -> Self {
        Self {
            notices,
            turn_advanced: true,
        }
    }

    pub fn held(notices: Vec<GameNotice>) -> Self {
        Self {
            notices,
            turn_advanced: false,
        }
    }
}

/// Contract each supported game implements.
///
/// The set of games is closed: one implementation per game kind, and
/// one `SessionManager` per implementation. Seats index the roster.
pub trait TurnGame: Send + 'static {
    fn player_count(&self) -> usize;

    fn is_player_turn(&self, seat: usize) -> bool;

    /// Per-seat projection of the state. Must never leak absolute
    /// board orientation to a seat that sees a mirrored board.
    fn relative_state(&self, seat: usize) -> serde_json::Value;

    /// Validate and apply one action. A rejection leaves the state
    /// unchanged and is always recoverable by submitting a legal
    /// action instead.
    fn apply_action(&mut self, seat: usize, payload: &serde_json::Value) -> Result<Transition>;

    /// Voluntary surrender, also the path taken by turn-timer
    /// forfeiture. Infallible by design.
    fn surrender(&mut self, seat: usize) -> Transition;

    /// Out-of-band request (e.g. "repeat last offer"). Games without
    /// a request protocol reject everything.
    fn request(&mut self, seat: usize, payload: &serde_json::Value) -> Result<Transition> {
        let _ = (seat, payload);
        Err(crate::error::Error::Rejected(
            "this game accepts no requests".into(),
        ))
    }

    /// Terminal winner seat, if any. A set winner is sticky.
    fn winner(&self) -> Option<usize>;

    /// Whether sessions of this game run a per-turn forfeiture timer.
    fn uses_turn_timer(&self) -> bool {
        false
    }
}

/// Factory the session manager uses to instantiate games.
pub trait GameFactory: Send + Sync + 'static {
    type Game: TurnGame;

    fn create(&self, players: usize, settings: &serde_json::Value) -> Result<Self::Game>;
}

/// Per-player presence flags, locked separately from game state.
#[derive(Debug, Clone, Copy)]
struct Presence {
    connected: bool,
    /// Explicitly left the session. Distinct from a mere disconnect:
    /// sessions tolerate zero connected players and close only when
    /// empty of players.
    departed: bool,
}

/// Game state plus turn bookkeeping, all behind one lock.
pub struct GameSlot<G> {
    pub game: G,
    /// Bumped on every applied transition; lets a fired timer detect
    /// that a legal move beat it to the lock.
    pub turn_epoch: u64,
}

pub struct Session<G> {
    pub key: SessionKey,
    players: Vec<PlayerId>,
    pub started_at: DateTime<Utc>,
    presence: Mutex<Vec<Presence>>,
    state: Mutex<GameSlot<G>>,
    timer: Option<TurnTimer>,
}

impl<G: TurnGame> Session<G> {
    pub fn new(key: SessionKey, players: Vec<PlayerId>, game: G, timer: Option<TurnTimer>) -> Self {
        assert_roster_invariants(&players);
        let presence = players
            .iter()
            .map(|_| Presence {
                connected: true,
                departed: false,
            })
            .collect();
        Self {
            key,
            players,
            started_at: Utc::now(),
            presence: Mutex::new(presence),
            state: Mutex::new(GameSlot {
                game,
                turn_epoch: 0,
            }),
            timer,
        }
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn contains(&self, player: &PlayerId) -> bool {
        self.players.iter().any(|p| p == player)
    }

    pub fn seat_of(&self, player: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p == player)
    }

    pub fn player_at(&self, seat: usize) -> Option<&PlayerId> {
        self.players.get(seat)
    }

    /// Lock the game state for one synchronous transition.
    pub fn state(&self) -> MutexGuard<'_, GameSlot<G>> {
        self.state.lock().expect("session state lock poisoned")
    }

    pub fn timer(&self) -> Option<&TurnTimer> {
        self.timer.as_ref()
    }

    /// Toggle connectedness; returns false for an unknown player.
    pub fn set_connected(&self, player: &PlayerId, connected: bool) -> bool {
        let Some(seat) = self.seat_of(player) else {
            return false;
        };
        let mut presence = self.presence.lock().expect("presence lock poisoned");
        presence[seat].connected = connected;
        true
    }

    pub fn is_connected(&self, player: &PlayerId) -> bool {
        self.seat_of(player)
            .map(|seat| self.presence.lock().expect("presence lock poisoned")[seat].connected)
            .unwrap_or(false)
    }

    pub fn connected_count(&self) -> usize {
        self.presence
            .lock()
            .expect("presence lock poisoned")
            .iter()
            .filter(|p| p.connected)
            .count()
    }

    /// Mark a player as having explicitly left; returns true when the
    /// session is now empty of players.
    pub fn mark_departed(&self, player: &PlayerId) -> bool {
        let mut presence = self.presence.lock().expect("presence lock poisoned");
        if let Some(seat) = self.seat_of(player) {
            presence[seat].departed = true;
            presence[seat].connected = false;
        }
        presence.iter().all(|p| p.departed)
    }

    pub fn is_player_empty(&self) -> bool {
        self.presence
            .lock()
            .expect("presence lock poisoned")
            .iter()
            .all(|p| p.departed)
    }

    pub fn is_terminal(&self) -> bool {
        self.state().game.winner().is_some()
    }

    /// Winner identity once terminal.
    pub fn winner_id(&self) -> Option<PlayerId> {
        let seat = self.state().game.winner()?;
        self.players.get(seat).cloned()
    }

    /// Map a seat-addressed notice list to player identities.
    pub fn resolve_recipients(&self, notices: Vec<GameNotice>) -> Vec<(Option<PlayerId>, serde_json::Value)> {
        notices
            .into_iter()
            .map(|n| match n.to {
                crate::notice::Recipients::All => (None, n.body),
                crate::notice::Recipients::Seat(seat) => {
                    (self.players.get(seat).cloned(), n.body)
                }
            })
            .collect()
    }
}
