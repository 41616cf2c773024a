//! Top-level facade for one game kind
//!
//! Pairs a lobby manager with a session manager and wires the
//! start-game handoff: the host's lobby roster becomes the session
//! roster. The transport layer talks to this surface.

use std::sync::Arc;

use crate::error::Result;
use crate::ids::{PlayerId, SessionKey};
use crate::lobby_manager::LobbyManager;
use crate::notice::Notice;
use crate::session::GameFactory;
use crate::session_manager::SessionManager;

pub struct GameHub<F: GameFactory> {
    pub lobbies: LobbyManager,
    pub sessions: Arc<SessionManager<F>>,
}

impl<F: GameFactory> GameHub<F> {
    pub fn new(lobbies: LobbyManager, sessions: SessionManager<F>) -> Self {
        Self {
            lobbies,
            sessions: Arc::new(sessions),
        }
    }

    /// Start the game from the host's lobby.
    ///
    /// The lobby closes silently on success; its roster and settings
    /// seed the new session.
    pub fn start_game(&self, host: &PlayerId) -> Result<(SessionKey, Vec<Notice>)> {
        let (roster, mut notices) = self.lobbies.start_game(host)?;
        let (key, started) = self.sessions.try_start(roster.players, &roster.settings)?;
        notices.extend(started);
        Ok((key, notices))
    }
}
