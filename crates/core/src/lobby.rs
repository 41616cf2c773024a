//! Lobby model - the pre-game room
//!
//! A lobby is created by its host, fills up with players until the
//! game starts or the lobby closes, and holds the settings blob the
//! game will be created with. Player order is irrelevant; connection
//! ids are 1:1 with players.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::ids::{ConnectionId, LobbyKey, PlayerId};

#[derive(Debug)]
pub struct Lobby {
    pub key: LobbyKey,
    pub host_id: PlayerId,
    players: Vec<(PlayerId, ConnectionId)>,
    pub settings: serde_json::Value,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    max_players: usize,
}

impl Lobby {
    pub fn new(
        key: LobbyKey,
        host_id: PlayerId,
        host_conn: ConnectionId,
        is_public: bool,
        max_players: usize,
    ) -> Self {
        Self {
            key,
            host_id: host_id.clone(),
            players: vec![(host_id, host_conn)],
            settings: serde_json::Value::Null,
            is_public,
            created_at: Utc::now(),
            max_players,
        }
    }

    pub fn contains(&self, player: &PlayerId) -> bool {
        self.players.iter().any(|(id, _)| id == player)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.players.iter().map(|(_, conn)| conn.clone()).collect()
    }

    pub fn add_player(&mut self, player: PlayerId, conn: ConnectionId) -> Result<()> {
        if self.is_full() {
            return Err(Error::Conflict(format!("lobby {} is full", self.key)));
        }
        if self.contains(&player) {
            return Err(Error::Conflict(format!(
                "player {player} is already in lobby {}",
                self.key
            )));
        }
        self.players.push((player, conn));
        Ok(())
    }

    /// Remove a player; returns false if they were not present.
    pub fn remove_player(&mut self, player: &PlayerId) -> bool {
        let before = self.players.len();
        self.players.retain(|(id, _)| id != player);
        self.players.len() != before
    }

    /// Hand the host role to an arbitrary remaining player.
    ///
    /// Only meaningful after the previous host was removed.
    pub fn elect_new_host(&mut self) -> Option<PlayerId> {
        let (next, _) = self.players.first()?;
        self.host_id = next.clone();
        Some(self.host_id.clone())
    }

    pub fn is_host(&self, player: &PlayerId) -> bool {
        &self.host_id == player
    }

    pub fn snapshot(&self, key_code: String) -> LobbySnapshot {
        LobbySnapshot {
            key: key_code,
            host_id: self.host_id.clone(),
            players: self.player_ids(),
            player_count: self.player_count(),
            max_players: self.max_players,
            is_public: self.is_public,
        }
    }
}

/// Client-facing view of a lobby.
#[derive(Debug, Clone, Serialize)]
pub struct LobbySnapshot {
    pub key: String,
    pub host_id: PlayerId,
    pub players: Vec<PlayerId>,
    pub player_count: usize,
    pub max_players: usize,
    pub is_public: bool,
}
