//! Tabletop Checkers
//!
//! Russian-draughts style rules engine on the generic session
//! framework: mandatory captures, forced capture chains, queening,
//! and loss on stalemate. Plugs into `tabletop_core::SessionManager`
//! through [`CheckersFactory`].

pub mod board;
pub mod game;
pub mod ruler;

pub use board::{Board, Color, Move, Piece, Square, BOARD_SIZE};
pub use game::{CheckersFactory, CheckersGame, BLACK_SEAT, WHITE_SEAT};
pub use ruler::{AppliedMove, Ruler, ValidMove};
