//! External collaborator seams
//!
//! The core never blocks on network or disk I/O. Push delivery and
//! finished-game persistence happen strictly after a state transition
//! commits; a failure in either must never roll back game state, so
//! both traits are fire-and-forget.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ids::PlayerId;
use crate::notice::Notice;

/// Best-effort group push. At-least-once delivery, no ack required.
pub trait Broadcaster: Send + Sync {
    fn deliver(&self, notice: &Notice);
}

/// Broadcaster that drops everything. Used where transitions can only
/// originate from a caller already draining the notice list.
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn deliver(&self, notice: &Notice) {
        tracing::trace!(?notice.audience, "dropping notice (no transport attached)");
    }
}

/// Record of a terminal session, handed to persistence exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct FinishedGame {
    pub winners: Vec<PlayerId>,
    pub losers: Vec<PlayerId>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// External persistence of finished-game history.
pub trait GameArchive: Send + Sync {
    fn record_finished_game(&self, record: &FinishedGame);
}
