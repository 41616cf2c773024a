//! Outbound notifications
//!
//! State transitions emit a list of notices instead of calling into a
//! push mechanism directly; the transport layer drains the list and
//! delivers each to its audience (best-effort, no ack required).

use serde::Serialize;

use crate::ids::{LobbyKey, PlayerId, SessionKey};

/// Who a notice is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Lobby(LobbyKey),
    Session(SessionKey),
    Player(PlayerId),
}

/// One outbound notification produced by a state transition.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub audience: Audience,
    pub body: NoticeBody,
}

impl Notice {
    pub fn new(audience: Audience, body: NoticeBody) -> Self {
        Self { audience, body }
    }
}

/// Notification payloads.
///
/// Lobby/session lifecycle events are typed; game-specific payloads
/// pass through as JSON built by the game's state machine.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NoticeBody {
    PlayerJoined { player: PlayerId },
    PlayerLeft { player: PlayerId },
    HostChanged { new_host: PlayerId },
    LobbyClosed,
    SessionClosed,
    GameStarted { session: String },
    GameEnded { winner: Option<PlayerId> },
    Game { body: serde_json::Value },
}

/// Recipients of a game-emitted notice, in seat terms.
///
/// The session layer maps seats back to player identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    All,
    Seat(usize),
}

/// A notice emitted by a game state machine, addressed by seat.
#[derive(Debug, Clone)]
pub struct GameNotice {
    pub to: Recipients,
    pub body: serde_json::Value,
}

impl GameNotice {
    pub fn all(body: serde_json::Value) -> Self {
        Self {
            to: Recipients::All,
            body,
        }
    }

    pub fn seat(seat: usize, body: serde_json::Value) -> Self {
        Self {
            to: Recipients::Seat(seat),
            body,
        }
    }
}
