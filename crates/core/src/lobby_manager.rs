//! Lobby lifecycle management
//!
//! Creates, finds, and closes lobbies; enforces one-lobby-per-user;
//! migrates the host role when the host departs and players remain.
//! Every mutating operation returns the notices the transport should
//! deliver to the affected lobby group.

use std::sync::Mutex;

use crate::config::SessionCore;
use crate::error::{Error, Result};
use crate::ids::{ConnectionId, LobbyKey, PlayerId};
use crate::invariants::assert_lobby_invariants;
use crate::lobby::{Lobby, LobbySnapshot};
use crate::notice::{Audience, Notice, NoticeBody};
use crate::registry::ConcurrentRegistry;

/// Roster handed to the session manager when a game starts.
#[derive(Debug, Clone)]
pub struct StartRoster {
    pub players: Vec<PlayerId>,
    pub settings: serde_json::Value,
}

pub struct LobbyManager {
    core: SessionCore<LobbyKey>,
    lobbies: ConcurrentRegistry<Mutex<Lobby>>,
}

impl LobbyManager {
    pub fn new(core: SessionCore<LobbyKey>) -> Self {
        Self {
            core,
            lobbies: ConcurrentRegistry::new(),
        }
    }

    pub fn core(&self) -> &SessionCore<LobbyKey> {
        &self.core
    }

    /// Create a lobby with the caller as host.
    ///
    /// Fails if the caller already occupies a lobby or every room code
    /// is leased.
    pub fn create_lobby(
        &self,
        host: PlayerId,
        conn: ConnectionId,
        is_public: bool,
    ) -> Result<LobbySnapshot> {
        if self.find_of(&host).is_some() {
            return Err(Error::Conflict(format!(
                "player {host} is already in a lobby"
            )));
        }
        let key = self
            .core
            .lease_key()
            .ok_or_else(|| Error::Capacity("no free lobby codes".into()))?;

        let lobby = Lobby::new(key, host.clone(), conn, is_public, self.core.max_players());
        let snapshot = lobby.snapshot(self.core.render_key(key));
        self.lobbies.insert(std::sync::Arc::new(Mutex::new(lobby)));

        tracing::info!(lobby = %self.core.render_key(key), %host, "lobby created");
        Ok(snapshot)
    }

    /// Join an existing lobby by key.
    ///
    /// Entering one's own lobby is a no-op success.
    pub fn enter_lobby(
        &self,
        player: PlayerId,
        conn: ConnectionId,
        key: LobbyKey,
    ) -> Result<(LobbySnapshot, Vec<Notice>)> {
        if let Some(current) = self.find_of(&player) {
            let lobby = current.lock().expect("lobby lock poisoned");
            if lobby.key == key {
                // Re-entering the lobby the player is already in.
                return Ok((lobby.snapshot(self.core.render_key(key)), Vec::new()));
            }
            return Err(Error::Conflict(format!(
                "player {player} is already in a lobby"
            )));
        }

        let entry = self
            .lobbies
            .find(|l| l.lock().expect("lobby lock poisoned").key == key)
            .ok_or_else(|| Error::NotFound(format!("lobby {key}")))?;

        let mut lobby = entry.lock().expect("lobby lock poisoned");
        lobby.add_player(player.clone(), conn)?;
        assert_lobby_invariants(&lobby);

        tracing::info!(lobby = %self.core.render_key(key), %player, "player entered lobby");
        let notices = vec![Notice::new(
            Audience::Lobby(key),
            NoticeBody::PlayerJoined { player },
        )];
        Ok((lobby.snapshot(self.core.render_key(key)), notices))
    }

    /// Leave whichever lobby the player is in.
    ///
    /// A departing host hands the lobby to an arbitrary remaining
    /// player; a host leaving an otherwise empty lobby closes it. The
    /// host-changed notice is only ever emitted for host departure.
    pub fn leave(&self, player: &PlayerId) -> Result<(LobbyKey, Vec<Notice>)> {
        let entry = self
            .find_of(player)
            .ok_or_else(|| Error::NotFound(format!("player {player} is not in a lobby")))?;

        let mut lobby = entry.lock().expect("lobby lock poisoned");
        let key = lobby.key;
        let was_host = lobby.is_host(player);
        lobby.remove_player(player);

        let mut notices = vec![Notice::new(
            Audience::Lobby(key),
            NoticeBody::PlayerLeft {
                player: player.clone(),
            },
        )];

        if lobby.player_count() == 0 {
            drop(lobby);
            self.close_entry(key, &mut notices);
            return Ok((key, notices));
        }

        if was_host {
            let new_host = lobby
                .elect_new_host()
                .ok_or_else(|| Error::Conflict("no player left to host".into()))?;
            assert_lobby_invariants(&lobby);
            tracing::info!(lobby = %self.core.render_key(key), %new_host, "host migrated");
            notices.push(Notice::new(
                Audience::Lobby(key),
                NoticeBody::HostChanged { new_host },
            ));
        }

        Ok((key, notices))
    }

    /// Explicitly close a lobby. Host only.
    pub fn close_lobby(&self, host: &PlayerId) -> Result<(LobbyKey, Vec<Notice>)> {
        let entry = self
            .find_of(host)
            .ok_or_else(|| Error::NotFound(format!("player {host} is not in a lobby")))?;
        let key = {
            let lobby = entry.lock().expect("lobby lock poisoned");
            if !lobby.is_host(host) {
                return Err(Error::Unauthorized(
                    "only the host may close the lobby".into(),
                ));
            }
            lobby.key
        };
        let mut notices = Vec::new();
        self.close_entry(key, &mut notices);
        Ok((key, notices))
    }

    /// Start the game from the caller's lobby. Host only, and only
    /// with enough players.
    ///
    /// Closes the lobby without the "closed" notice so clients do not
    /// see a redundant navigation event on top of the game start.
    pub fn start_game(&self, host: &PlayerId) -> Result<(StartRoster, Vec<Notice>)> {
        let entry = self
            .find_of(host)
            .ok_or_else(|| Error::NotFound(format!("player {host} is not in a lobby")))?;

        let (key, roster) = {
            let lobby = entry.lock().expect("lobby lock poisoned");
            if !lobby.is_host(host) {
                return Err(Error::Unauthorized(
                    "only the host may start the game".into(),
                ));
            }
            if lobby.player_count() < self.core.min_players() {
                return Err(Error::Rejected(format!(
                    "at least {} players are required to start",
                    self.core.min_players()
                )));
            }
            (
                lobby.key,
                StartRoster {
                    players: lobby.player_ids(),
                    settings: lobby.settings.clone(),
                },
            )
        };

        self.lobbies
            .remove(|l| l.lock().expect("lobby lock poisoned").key == key);
        self.core.release_key(key);
        tracing::info!(
            lobby = %self.core.render_key(key),
            players = roster.players.len(),
            "lobby handed off to game start"
        );
        Ok((roster, Vec::new()))
    }

    /// Update the settings blob. Host only.
    pub fn set_settings(&self, host: &PlayerId, settings: serde_json::Value) -> Result<()> {
        let entry = self
            .find_of(host)
            .ok_or_else(|| Error::NotFound(format!("player {host} is not in a lobby")))?;
        let mut lobby = entry.lock().expect("lobby lock poisoned");
        if !lobby.is_host(host) {
            return Err(Error::Unauthorized(
                "only the host may change settings".into(),
            ));
        }
        lobby.settings = settings;
        Ok(())
    }

    /// Public lobbies visible for discovery.
    pub fn list_public(&self) -> Vec<LobbySnapshot> {
        self.lobbies
            .snapshot()
            .iter()
            .filter_map(|entry| {
                let lobby = entry.lock().expect("lobby lock poisoned");
                lobby
                    .is_public
                    .then(|| lobby.snapshot(self.core.render_key(lobby.key)))
            })
            .collect()
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    fn find_of(&self, player: &PlayerId) -> Option<std::sync::Arc<Mutex<Lobby>>> {
        self.lobbies
            .find(|l| l.lock().expect("lobby lock poisoned").contains(player))
    }

    fn close_entry(&self, key: LobbyKey, notices: &mut Vec<Notice>) {
        self.lobbies
            .remove(|l| l.lock().expect("lobby lock poisoned").key == key);
        self.core.release_key(key);
        notices.push(Notice::new(Audience::Lobby(key), NoticeBody::LobbyClosed));
        tracing::info!(lobby = %self.core.render_key(key), "lobby closed");
    }
}
