//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::ids::PlayerId;
use crate::lobby::Lobby;

/// Validate that a lobby's state is internally consistent
pub fn assert_lobby_invariants(lobby: &Lobby) {
    // The host must be one of the players (unless everyone left).
    debug_assert!(
        lobby.player_count() == 0 || lobby.contains(&lobby.host_id),
        "lobby {} host {} is not a member",
        lobby.key,
        lobby.host_id
    );

    // Connection ids stay 1:1 with players.
    debug_assert_eq!(
        lobby.player_ids().len(),
        lobby.connection_ids().len(),
        "lobby {} has mismatched player/connection lists",
        lobby.key
    );
}

/// Validate that a session roster is usable
pub fn assert_roster_invariants(players: &[PlayerId]) {
    debug_assert!(!players.is_empty(), "session roster is empty");

    let mut seen = std::collections::HashSet::new();
    for player in players {
        debug_assert!(
            seen.insert(player),
            "player {player} appears twice in a roster"
        );
    }
}
