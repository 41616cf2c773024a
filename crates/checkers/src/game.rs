//! Checkers session state machine
//!
//! Seat 0 plays white, seat 1 plays black. The black seat lives in a
//! mirrored world: its incoming moves are de-mirrored before hitting
//! the canonical board, and every outgoing projection is mirrored
//! back, so both clients perceive themselves moving upward from the
//! bottom.

use serde_json::json;

use tabletop_core::{Error, GameFactory, GameNotice, Result, Transition, TurnGame};

use crate::board::{Board, Color, Move, Square};
use crate::ruler::Ruler;

pub const WHITE_SEAT: usize = 0;
pub const BLACK_SEAT: usize = 1;

fn color_of(seat: usize) -> Color {
    if seat == WHITE_SEAT {
        Color::White
    } else {
        Color::Black
    }
}

fn seat_of(color: Color) -> usize {
    match color {
        Color::White => WHITE_SEAT,
        Color::Black => BLACK_SEAT,
    }
}

pub struct CheckersGame {
    board: Board,
    is_white_turn: bool,
    ongoing_capture_from: Option<Square>,
    last_move: Option<Move>,
    winner: Option<usize>,
}

impl CheckersGame {
    pub fn new() -> Self {
        Self::from_position(Board::initial(), true)
    }

    /// Start from an arbitrary position. Used for endgame scenarios
    /// and replays.
    pub fn from_position(board: Board, is_white_turn: bool) -> Self {
        Self {
            board,
            is_white_turn,
            ongoing_capture_from: None,
            last_move: None,
            winner: None,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    fn turn_color(&self) -> Color {
        if self.is_white_turn {
            Color::White
        } else {
            Color::Black
        }
    }

    /// Mirror a coordinate for the black seat's projection.
    fn oriented(&self, seat: usize, sq: Square) -> Square {
        if seat == BLACK_SEAT {
            sq.mirrored()
        } else {
            sq
        }
    }

    fn view(&self, seat: usize) -> serde_json::Value {
        let mirrored = seat == BLACK_SEAT;
        json!({
            "board": self.board.project(mirrored),
            "your_color": color_of(seat),
            "is_your_turn": self.winner.is_none() && self.is_player_turn(seat),
            "last_move": self.last_move.map(|m| if mirrored { m.mirrored() } else { m }),
            "ongoing_capture_from": self.ongoing_capture_from.map(|sq| self.oriented(seat, sq)),
            "winner": self.winner.map(color_of),
        })
    }

    fn state_notices(&self, event: &str) -> Vec<GameNotice> {
        (0..2)
            .map(|seat| {
                let mut body = self.view(seat);
                body["event"] = json!(event);
                GameNotice::seat(seat, body)
            })
            .collect()
    }

    fn finish(&mut self, winner_seat: usize) {
        self.winner = Some(winner_seat);
        self.ongoing_capture_from = None;
        tracing::info!(winner = ?color_of(winner_seat), "checkers game over");
    }
}

impl Default for CheckersGame {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnGame for CheckersGame {
    fn player_count(&self) -> usize {
        2
    }

    fn is_player_turn(&self, seat: usize) -> bool {
        self.winner.is_none() && seat_of(self.turn_color()) == seat
    }

    fn relative_state(&self, seat: usize) -> serde_json::Value {
        self.view(seat)
    }

    fn apply_action(&mut self, seat: usize, payload: &serde_json::Value) -> Result<Transition> {
        if self.winner.is_some() {
            return Err(Error::Conflict("the game has already ended".into()));
        }
        let color = color_of(seat);
        if color != self.turn_color() {
            return Err(Error::Rejected("it is not your turn".into()));
        }

        let submitted: Move = serde_json::from_value(payload.clone())?;
        // De-mirror the black seat's move into canonical coordinates.
        let mv = if seat == BLACK_SEAT {
            submitted.mirrored()
        } else {
            submitted
        };

        let valid = Ruler::validate(&self.board, color, mv, self.ongoing_capture_from)?;
        let applied = Ruler::apply(&mut self.board, valid);
        self.last_move = Some(mv);

        if applied.chain_continues {
            // Same player moves again, same piece, from the landing
            // square.
            self.ongoing_capture_from = Some(mv.to);
        } else {
            self.ongoing_capture_from = None;
            self.is_white_turn = !self.is_white_turn;
        }

        // Loss check after every applied move: out of pieces, or no
        // legal move left.
        let enemy = color.enemy();
        if self.board.count(enemy) == 0 || !Ruler::has_any_legal_move(&self.board, enemy) {
            self.finish(seat);
        }

        Ok(Transition::advanced(self.state_notices("move_applied")))
    }

    fn surrender(&mut self, seat: usize) -> Transition {
        if self.winner.is_none() {
            self.finish(1 - seat);
        }
        Transition::advanced(self.state_notices("game_over"))
    }

    fn winner(&self) -> Option<usize> {
        self.winner
    }

    fn uses_turn_timer(&self) -> bool {
        true
    }
}

/// Factory plugged into the generic session manager.
pub struct CheckersFactory;

impl GameFactory for CheckersFactory {
    type Game = CheckersGame;

    fn create(&self, players: usize, _settings: &serde_json::Value) -> Result<CheckersGame> {
        if players != 2 {
            return Err(Error::Rejected("checkers is a two-player game".into()));
        }
        Ok(CheckersGame::new())
    }
}
