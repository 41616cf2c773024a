//! Canonical checkers board
//!
//! 8x8 grid, white on rows 0-2 and black on rows 5-7 at setup. The
//! canonical orientation is load-bearing: the black player's client
//! sees a mirrored projection, and their incoming moves are
//! de-mirrored before validation (`Square::mirrored`).

use serde::{Deserialize, Serialize};

pub const BOARD_SIZE: i32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn enemy(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Forward direction toward the enemy baseline.
    pub fn forward(self) -> i32 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    /// Baseline row that promotes this color's draughts.
    pub fn promotion_row(self) -> i32 {
        match self {
            Color::White => BOARD_SIZE - 1,
            Color::Black => 0,
        }
    }
}

/// A single draught, or a queen once promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub is_queen: bool,
}

impl Piece {
    pub fn draught(color: Color) -> Self {
        Self {
            color,
            is_queen: false,
        }
    }

    pub fn queen(color: Color) -> Self {
        Self {
            color,
            is_queen: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Square {
    pub x: i32,
    pub y: i32,
}

impl Square {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(self) -> bool {
        (0..BOARD_SIZE).contains(&self.x) && (0..BOARD_SIZE).contains(&self.y)
    }

    /// Point reflection through the board center; applied to every
    /// coordinate crossing the black player's boundary.
    pub fn mirrored(self) -> Square {
        Square {
            x: BOARD_SIZE - 1 - self.x,
            y: BOARD_SIZE - 1 - self.y,
        }
    }
}

/// A move as submitted by a client, in that client's orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
}

impl Move {
    pub fn mirrored(self) -> Move {
        Move {
            from: self.from.mirrored(),
            to: self.to.mirrored(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Board {
    cells: [[Option<Piece>; BOARD_SIZE as usize]; BOARD_SIZE as usize],
}

impl Board {
    pub fn empty() -> Self {
        Self {
            cells: [[None; BOARD_SIZE as usize]; BOARD_SIZE as usize],
        }
    }

    /// Standard setup: twelve draughts per color on the dark squares,
    /// white on rows 0-2, black on rows 5-7.
    pub fn initial() -> Self {
        let mut board = Self::empty();
        for y in 0..BOARD_SIZE {
            for x in 0..BOARD_SIZE {
                if (x + y) % 2 != 0 {
                    continue;
                }
                let piece = match y {
                    0..=2 => Some(Piece::draught(Color::White)),
                    5..=7 => Some(Piece::draught(Color::Black)),
                    _ => None,
                };
                board.cells[y as usize][x as usize] = piece;
            }
        }
        board
    }

    pub fn get(&self, sq: Square) -> Option<Piece> {
        if !sq.in_bounds() {
            return None;
        }
        self.cells[sq.y as usize][sq.x as usize]
    }

    pub fn set(&mut self, sq: Square, piece: Option<Piece>) {
        debug_assert!(sq.in_bounds(), "set out of bounds: {sq:?}");
        self.cells[sq.y as usize][sq.x as usize] = piece;
    }

    pub fn count(&self, color: Color) -> usize {
        self.squares_of(color).count()
    }

    pub fn squares_of(&self, color: Color) -> impl Iterator<Item = Square> + '_ {
        (0..BOARD_SIZE).flat_map(move |y| {
            (0..BOARD_SIZE).filter_map(move |x| {
                let sq = Square::new(x, y);
                match self.get(sq) {
                    Some(p) if p.color == color => Some(sq),
                    _ => None,
                }
            })
        })
    }

    /// Rows of cells for a state view, optionally mirrored for the
    /// black player's orientation.
    pub fn project(&self, mirrored: bool) -> Vec<Vec<Option<Piece>>> {
        (0..BOARD_SIZE)
            .map(|y| {
                (0..BOARD_SIZE)
                    .map(|x| {
                        let sq = Square::new(x, y);
                        self.get(if mirrored { sq.mirrored() } else { sq })
                    })
                    .collect()
            })
            .collect()
    }
}
