//! Mutable per-game state: players, cell ownership, and the tunable economy.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// Token colors handed to players at game start, in shuffled order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Yellow,
    Purple,
    Orange,
    Teal,
    Pink,
}

const PALETTE: [PlayerColor; 8] = [
    PlayerColor::Red,
    PlayerColor::Blue,
    PlayerColor::Green,
    PlayerColor::Yellow,
    PlayerColor::Purple,
    PlayerColor::Orange,
    PlayerColor::Teal,
    PlayerColor::Pink,
];

/// Returns one distinct color per seat, shuffled.
pub fn assign_colors<R: Rng>(rng: &mut R, seats: usize) -> Vec<PlayerColor> {
    debug_assert!(seats <= PALETTE.len());
    let mut palette = PALETTE;
    palette.shuffle(rng);
    palette[..seats].to_vec()
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerState {
    pub money: i64,
    pub position: usize,
    pub dead: bool,
    pub in_prison: bool,
    /// Failed escape rolls this imprisonment.
    pub free_tries: u8,
    pub color: PlayerColor,
}

impl PlayerState {
    pub fn new(money: i64, position: usize, color: PlayerColor) -> Self {
        Self {
            money,
            position,
            dead: false,
            in_prison: false,
            free_tries: 0,
            color,
        }
    }
}

/// Runtime state of one ownable cell. Non-ownable cells carry `None`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CellState {
    pub owner: Option<usize>,
    /// Build level 0..=5. Only meaningful for upgradable cells.
    pub level: u8,
    /// Mortgaged. Collects no rent and reverts to the bank if not bought back.
    pub sold: bool,
    /// Owner turn-ends left before a mortgaged cell reverts.
    pub moves_left: Option<u8>,
}

/// Economy knobs. Defaults follow the classic rules.
#[derive(Debug, Clone)]
pub struct MonopolyConfig {
    pub starting_money: i64,
    /// Paid each time a player crosses the start cell.
    pub lap_bonus: i64,
    /// Extra bonus for landing exactly on the start cell.
    pub start_bonus: i64,
    /// Both bonuses shrink by this much per award, floored at zero.
    pub bonus_decay: i64,
    pub prison_fine: i64,
    /// Escape rolls allowed before the fine becomes mandatory.
    pub max_free_tries: u8,
    /// Owner turn-ends before a mortgaged cell reverts to the bank.
    pub moves_to_lose_cell: u8,
    /// Chance that a bank cell pays out rather than taxes.
    pub bank_positive_chance: f64,
    pub bank_dividend: i64,
    pub bank_tax: i64,
    /// Capacity of the game event log.
    pub log_capacity: usize,
}

impl Default for MonopolyConfig {
    fn default() -> Self {
        Self {
            starting_money: 1500,
            lap_bonus: 200,
            start_bonus: 100,
            bonus_decay: 10,
            prison_fine: 50,
            max_free_tries: 3,
            moves_to_lose_cell: 7,
            bank_positive_chance: 0.5,
            bank_dividend: 100,
            bank_tax: 100,
            log_capacity: 100,
        }
    }
}
