//! Move validation and rules
//!
//! Two-stage validation: structural (occupancy, bounds, diagonality)
//! then semantic (distances, capture legality, mandatory capture).
//! "Eat if you can" is a first-class rule: whenever any of the
//! mover's pieces has a legal capture, a non-capturing move is
//! rejected no matter how structurally sound it is.

use tabletop_core::{Error, Result};

use crate::board::{Board, Color, Move, Piece, Square};

/// Diagonal step directions.
const DIRS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// A move that passed validation, in canonical coordinates.
#[derive(Debug, Clone, Copy)]
pub struct ValidMove {
    pub mv: Move,
    pub captured: Option<Square>,
}

/// What applying a move did to the board.
#[derive(Debug, Clone, Copy)]
pub struct AppliedMove {
    pub promoted: bool,
    /// The same piece must capture again from the landing square.
    pub chain_continues: bool,
}

pub struct Ruler;

impl Ruler {
    /// Validate a canonical-coordinate move for `color`.
    ///
    /// `ongoing_capture_from` constrains the origin while a capture
    /// chain is mid-sequence.
    pub fn validate(
        board: &Board,
        color: Color,
        mv: Move,
        ongoing_capture_from: Option<Square>,
    ) -> Result<ValidMove> {
        // Structural stage.
        if !mv.from.in_bounds() || !mv.to.in_bounds() {
            return Err(Error::Rejected("move is off the board".into()));
        }
        let piece = match board.get(mv.from) {
            Some(p) if p.color == color => p,
            Some(_) => return Err(Error::Rejected("that piece is not yours".into())),
            None => return Err(Error::Rejected("no piece on the origin square".into())),
        };
        if board.get(mv.to).is_some() {
            return Err(Error::Rejected("destination square is occupied".into()));
        }
        let dx = mv.to.x - mv.from.x;
        let dy = mv.to.y - mv.from.y;
        if dx.abs() != dy.abs() || dx == 0 {
            return Err(Error::Rejected("moves go strictly diagonally".into()));
        }

        // Semantic stage.
        if let Some(chain_from) = ongoing_capture_from {
            if mv.from != chain_from {
                return Err(Error::Rejected(
                    "a capture chain is in progress; continue with the same piece".into(),
                ));
            }
        }

        let distance = dx.abs();
        if !piece.is_queen && distance > 2 {
            return Err(Error::Rejected("a draught moves at most two squares".into()));
        }

        // Scan strictly between origin and destination.
        let step = (dx.signum(), dy.signum());
        let mut captured = None;
        let mut cursor = Square::new(mv.from.x + step.0, mv.from.y + step.1);
        while cursor != mv.to {
            if let Some(blocking) = board.get(cursor) {
                if blocking.color == color {
                    return Err(Error::Rejected(
                        "cannot jump over your own piece".into(),
                    ));
                }
                if captured.is_some() {
                    return Err(Error::Rejected(
                        "cannot capture two pieces in one segment".into(),
                    ));
                }
                captured = Some(cursor);
            }
            cursor = Square::new(cursor.x + step.0, cursor.y + step.1);
        }

        if captured.is_none() {
            if ongoing_capture_from.is_some() {
                return Err(Error::Rejected(
                    "the capture chain must continue capturing".into(),
                ));
            }
            if !piece.is_queen && distance == 2 {
                return Err(Error::Rejected(
                    "a two-square draught move must capture".into(),
                ));
            }
            if !piece.is_queen && dy != color.forward() {
                return Err(Error::Rejected(
                    "draughts only advance toward the enemy baseline".into(),
                ));
            }
            if Self::has_any_capture(board, color) {
                return Err(Error::Rejected("capture is mandatory".into()));
            }
        }

        Ok(ValidMove { mv, captured })
    }

    /// Apply a validated move. Promotion happens here, at apply time,
    /// and is sticky thereafter.
    pub fn apply(board: &mut Board, valid: ValidMove) -> AppliedMove {
        let mut piece = board
            .get(valid.mv.from)
            .expect("validated move originates from an occupied square");
        board.set(valid.mv.from, None);
        if let Some(square) = valid.captured {
            board.set(square, None);
        }

        let mut promoted = false;
        if !piece.is_queen && valid.mv.to.y == piece.color.promotion_row() {
            piece = Piece::queen(piece.color);
            promoted = true;
        }
        board.set(valid.mv.to, Some(piece));

        AppliedMove {
            promoted,
            chain_continues: valid.captured.is_some()
                && Self::can_capture_from(board, valid.mv.to),
        }
    }

    /// Does the piece on `sq` have a capture available?
    pub fn can_capture_from(board: &Board, sq: Square) -> bool {
        let Some(piece) = board.get(sq) else {
            return false;
        };

        for (dx, dy) in DIRS {
            if piece.is_queen {
                // Walk the diagonal; the first piece met must be an
                // enemy with an empty landing square right behind it.
                let mut cursor = Square::new(sq.x + dx, sq.y + dy);
                while cursor.in_bounds() {
                    match board.get(cursor) {
                        None => {}
                        Some(other) if other.color == piece.color => break,
                        Some(_) => {
                            let landing = Square::new(cursor.x + dx, cursor.y + dy);
                            if landing.in_bounds() && board.get(landing).is_none() {
                                return true;
                            }
                            break;
                        }
                    }
                    cursor = Square::new(cursor.x + dx, cursor.y + dy);
                }
            } else {
                let over = Square::new(sq.x + dx, sq.y + dy);
                let landing = Square::new(sq.x + 2 * dx, sq.y + 2 * dy);
                let jumps_enemy = matches!(
                    board.get(over),
                    Some(other) if other.color != piece.color
                );
                if jumps_enemy && landing.in_bounds() && board.get(landing).is_none() {
                    return true;
                }
            }
        }
        false
    }

    pub fn has_any_capture(board: &Board, color: Color) -> bool {
        board
            .squares_of(color)
            .any(|sq| Self::can_capture_from(board, sq))
    }

    /// A color with no legal move for any piece loses immediately.
    pub fn has_any_legal_move(board: &Board, color: Color) -> bool {
        if Self::has_any_capture(board, color) {
            return true;
        }
        for sq in board.squares_of(color) {
            let piece = match board.get(sq) {
                Some(p) => p,
                None => continue,
            };
            for (dx, dy) in DIRS {
                if !piece.is_queen && dy != color.forward() {
                    continue;
                }
                let next = Square::new(sq.x + dx, sq.y + dy);
                if next.in_bounds() && board.get(next).is_none() {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(fx: i32, fy: i32, tx: i32, ty: i32) -> Move {
        Move {
            from: Square::new(fx, fy),
            to: Square::new(tx, ty),
        }
    }

    #[test]
    fn capture_over_adjacent_enemy() {
        let mut board = Board::empty();
        board.set(Square::new(1, 1), Some(Piece::draught(Color::White)));
        board.set(Square::new(2, 2), Some(Piece::draught(Color::Black)));

        let valid = Ruler::validate(&board, Color::White, mv(1, 1, 3, 3), None).unwrap();
        assert_eq!(valid.captured, Some(Square::new(2, 2)));

        Ruler::apply(&mut board, valid);
        assert_eq!(board.get(Square::new(2, 2)), None);
        assert_eq!(
            board.get(Square::new(3, 3)),
            Some(Piece::draught(Color::White))
        );
    }

    #[test]
    fn non_capturing_two_square_move_rejected() {
        let mut board = Board::empty();
        board.set(Square::new(1, 1), Some(Piece::draught(Color::White)));
        let err = Ruler::validate(&board, Color::White, mv(1, 1, 3, 3), None).unwrap_err();
        assert!(err.to_string().contains("must capture"));
    }

    #[test]
    fn capture_is_mandatory_board_wide() {
        let mut board = Board::empty();
        // This piece could step quietly...
        board.set(Square::new(6, 2), Some(Piece::draught(Color::White)));
        // ...but another white piece has a capture available.
        board.set(Square::new(1, 1), Some(Piece::draught(Color::White)));
        board.set(Square::new(2, 2), Some(Piece::draught(Color::Black)));

        let err = Ruler::validate(&board, Color::White, mv(6, 2, 7, 3), None).unwrap_err();
        assert!(err.to_string().contains("mandatory"));
    }

    #[test]
    fn draughts_cannot_retreat() {
        let mut board = Board::empty();
        board.set(Square::new(3, 3), Some(Piece::draught(Color::White)));
        let err = Ruler::validate(&board, Color::White, mv(3, 3, 2, 2), None).unwrap_err();
        assert!(err.to_string().contains("advance"));

        board.set(Square::new(4, 4), Some(Piece::draught(Color::Black)));
        let err = Ruler::validate(&board, Color::Black, mv(4, 4, 5, 5), None).unwrap_err();
        assert!(err.to_string().contains("advance"));
    }

    #[test]
    fn own_piece_on_path_is_illegal() {
        let mut board = Board::empty();
        board.set(Square::new(1, 1), Some(Piece::draught(Color::White)));
        board.set(Square::new(2, 2), Some(Piece::draught(Color::White)));
        let err = Ruler::validate(&board, Color::White, mv(1, 1, 3, 3), None).unwrap_err();
        assert!(err.to_string().contains("your own piece"));
    }

    #[test]
    fn queen_moves_any_distance_and_backwards() {
        let mut board = Board::empty();
        board.set(Square::new(6, 6), Some(Piece::queen(Color::White)));
        let valid = Ruler::validate(&board, Color::White, mv(6, 6, 1, 1), None).unwrap();
        assert_eq!(valid.captured, None);
    }

    #[test]
    fn queen_cannot_jump_two_in_one_segment() {
        let mut board = Board::empty();
        board.set(Square::new(0, 0), Some(Piece::queen(Color::White)));
        board.set(Square::new(2, 2), Some(Piece::draught(Color::Black)));
        board.set(Square::new(4, 4), Some(Piece::draught(Color::Black)));
        let err = Ruler::validate(&board, Color::White, mv(0, 0, 5, 5), None).unwrap_err();
        assert!(err.to_string().contains("two pieces"));
    }

    #[test]
    fn promotion_happens_at_apply_time() {
        let mut board = Board::empty();
        board.set(Square::new(2, 6), Some(Piece::draught(Color::White)));
        let valid = Ruler::validate(&board, Color::White, mv(2, 6, 3, 7), None).unwrap();
        let applied = Ruler::apply(&mut board, valid);
        assert!(applied.promoted);
        assert_eq!(
            board.get(Square::new(3, 7)),
            Some(Piece::queen(Color::White))
        );
    }

    #[test]
    fn chain_continues_when_landing_square_can_capture() {
        let mut board = Board::empty();
        board.set(Square::new(2, 2), Some(Piece::draught(Color::White)));
        board.set(Square::new(3, 3), Some(Piece::draught(Color::Black)));
        board.set(Square::new(5, 5), Some(Piece::draught(Color::Black)));
        board.set(Square::new(0, 0), Some(Piece::draught(Color::White)));

        let valid = Ruler::validate(&board, Color::White, mv(2, 2, 4, 4), None).unwrap();
        let applied = Ruler::apply(&mut board, valid);
        assert!(applied.chain_continues);

        // Chain move must originate from the landing square, even when
        // another friendly piece has a plain move available.
        let err = Ruler::validate(
            &board,
            Color::White,
            mv(0, 0, 1, 1),
            Some(Square::new(4, 4)),
        )
        .unwrap_err();
        assert!(err.to_string().contains("same piece"));
    }

    #[test]
    fn blocked_color_has_no_legal_move() {
        let mut board = Board::empty();
        // White draught wedged in the corner behind its own piece.
        board.set(Square::new(7, 7), Some(Piece::draught(Color::White)));
        board.set(Square::new(6, 6), Some(Piece::draught(Color::White)));
        // 7,7 is on the promotion row and cannot advance; 6,6 can.
        assert!(Ruler::has_any_legal_move(&board, Color::White));

        let mut stuck = Board::empty();
        stuck.set(Square::new(0, 7), Some(Piece::draught(Color::White)));
        // Forward is off-board; no captures anywhere.
        assert!(!Ruler::has_any_legal_move(&stuck, Color::White));
    }
}
