//! Board layout schema and loader
//!
//! Defines the TOML-parseable board format. A board is an ordered list of
//! cells; play proceeds through them by index, wrapping at the end. The
//! default 40-cell board ships embedded in the crate.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Number of rent tiers an upgradable cell must define (levels 0 through 5).
pub const RENT_TIERS: usize = 6;

/// One cell of the board as written in TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellSpec {
    /// Lap origin. Crossing it pays the lap bonus.
    Start { name: String },
    /// Prison cell. Landing here by movement is just a visit.
    Prison { name: String },
    /// Teleport destination for travel events. Landing here does nothing.
    Portal { name: String },
    /// Sends the player who lands here straight to prison.
    GoToPrison { name: String },
    /// Draws a random incident.
    Event { name: String },
    /// Random bank payout or tax.
    Bank { name: String },
    /// Ownable street. Rent grows with the build level (0..=5).
    Upgrade {
        name: String,
        group: String,
        cost: i64,
        upgrade_cost: i64,
        rent: Vec<i64>,
    },
    /// Ownable cell whose rent depends on how many of its group the owner holds.
    Count {
        name: String,
        group: String,
        cost: i64,
        rent: Vec<i64>,
    },
    /// Ownable cell whose toll is the dice sum times a per-holding multiplier.
    Dice {
        name: String,
        group: String,
        cost: i64,
        multiplier: Vec<i64>,
    },
}

impl CellSpec {
    pub fn name(&self) -> &str {
        match self {
            CellSpec::Start { name }
            | CellSpec::Prison { name }
            | CellSpec::Portal { name }
            | CellSpec::GoToPrison { name }
            | CellSpec::Event { name }
            | CellSpec::Bank { name }
            | CellSpec::Upgrade { name, .. }
            | CellSpec::Count { name, .. }
            | CellSpec::Dice { name, .. } => name,
        }
    }

    /// Purchase price, for ownable cells.
    pub fn cost(&self) -> Option<i64> {
        match self {
            CellSpec::Upgrade { cost, .. }
            | CellSpec::Count { cost, .. }
            | CellSpec::Dice { cost, .. } => Some(*cost),
            _ => None,
        }
    }

    pub fn group(&self) -> Option<&str> {
        match self {
            CellSpec::Upgrade { group, .. }
            | CellSpec::Count { group, .. }
            | CellSpec::Dice { group, .. } => Some(group),
            _ => None,
        }
    }

    pub fn is_ownable(&self) -> bool {
        self.cost().is_some()
    }
}

/// Raw TOML document shape
#[derive(Debug, Deserialize)]
struct LayoutDoc {
    cells: Vec<CellSpec>,
}

/// Error type for board loading
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("Failed to read board file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse board TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Board file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Board has no cells")]
    Empty,
    #[error("Board has no start cell")]
    MissingStart,
    #[error("Board has no prison cell")]
    MissingPrison,
    #[error("Cell {index} ('{name}') must define exactly six rent tiers")]
    BadRentTiers { index: usize, name: String },
    #[error("Cell {index} ('{name}') defines an empty rate table")]
    EmptyRates { index: usize, name: String },
}

/// A validated board: ordered cells plus the resolved landmark indices.
#[derive(Debug, Clone)]
pub struct BoardLayout {
    cells: Vec<CellSpec>,
    start_index: usize,
    prison_index: usize,
    portal_index: Option<usize>,
}

static BUILTIN: OnceLock<BoardLayout> = OnceLock::new();

impl BoardLayout {
    /// Parse and validate a board from TOML content.
    pub fn parse(content: &str) -> Result<Self, LayoutError> {
        let doc: LayoutDoc = toml::from_str(content)?;
        Self::from_cells(doc.cells)
    }

    /// Load a board from a TOML file on disk.
    pub fn load_file(path: &Path) -> Result<Self, LayoutError> {
        if !path.exists() {
            return Err(LayoutError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// The embedded default board.
    pub fn builtin() -> &'static BoardLayout {
        BUILTIN.get_or_init(|| {
            Self::parse(include_str!("../assets/board.toml"))
                .expect("embedded board layout is valid")
        })
    }

    fn from_cells(cells: Vec<CellSpec>) -> Result<Self, LayoutError> {
        if cells.is_empty() {
            return Err(LayoutError::Empty);
        }
        for (index, cell) in cells.iter().enumerate() {
            match cell {
                CellSpec::Upgrade { name, rent, .. } if rent.len() != RENT_TIERS => {
                    return Err(LayoutError::BadRentTiers {
                        index,
                        name: name.clone(),
                    });
                }
                CellSpec::Count { name, rent, .. } if rent.is_empty() => {
                    return Err(LayoutError::EmptyRates {
                        index,
                        name: name.clone(),
                    });
                }
                CellSpec::Dice {
                    name, multiplier, ..
                } if multiplier.is_empty() => {
                    return Err(LayoutError::EmptyRates {
                        index,
                        name: name.clone(),
                    });
                }
                _ => {}
            }
        }
        let position_of = |pred: fn(&CellSpec) -> bool| cells.iter().position(pred);
        let start_index =
            position_of(|c| matches!(c, CellSpec::Start { .. })).ok_or(LayoutError::MissingStart)?;
        let prison_index = position_of(|c| matches!(c, CellSpec::Prison { .. }))
            .ok_or(LayoutError::MissingPrison)?;
        let portal_index = position_of(|c| matches!(c, CellSpec::Portal { .. }));
        Ok(Self {
            cells,
            start_index,
            prison_index,
            portal_index,
        })
    }

    pub fn cell(&self, index: usize) -> &CellSpec {
        &self.cells[index]
    }

    pub fn cells(&self) -> &[CellSpec] {
        &self.cells
    }

    pub fn total_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn prison_index(&self) -> usize {
        self.prison_index
    }

    pub fn portal_index(&self) -> Option<usize> {
        self.portal_index
    }

    /// Indices of every cell belonging to the given group.
    pub fn group_cells(&self, group: &str) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.group() == Some(group))
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn builtin_board_is_valid() {
        let board = BoardLayout::builtin();
        assert_eq!(board.total_cells(), 40);
        assert_eq!(board.start_index(), 0);
        assert_eq!(board.prison_index(), 10);
        assert_eq!(board.portal_index(), Some(20));
        assert!(board.cell(4).is_ownable());
        assert!(board.cell(7).is_ownable());
        assert_eq!(board.group_cells("rail").len(), 4);
        assert_eq!(board.group_cells("power").len(), 2);
    }

    #[test]
    fn parse_minimal_board() {
        let board = BoardLayout::parse(
            r#"
            [[cells]]
            kind = "start"
            name = "Go"

            [[cells]]
            kind = "upgrade"
            name = "First Street"
            group = "a"
            cost = 100
            upgrade_cost = 50
            rent = [5, 10, 20, 40, 80, 160]

            [[cells]]
            kind = "prison"
            name = "Jail"
            "#,
        )
        .unwrap();
        assert_eq!(board.total_cells(), 3);
        assert_eq!(board.prison_index(), 2);
        assert_eq!(board.cell(1).cost(), Some(100));
        assert_eq!(board.portal_index(), None);
    }

    #[test]
    fn missing_prison_is_rejected() {
        let err = BoardLayout::parse(
            r#"
            [[cells]]
            kind = "start"
            name = "Go"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::MissingPrison));
    }

    #[test]
    fn missing_start_is_rejected() {
        let err = BoardLayout::parse(
            r#"
            [[cells]]
            kind = "prison"
            name = "Jail"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::MissingStart));
    }

    #[test]
    fn wrong_rent_tier_count_is_rejected() {
        let err = BoardLayout::parse(
            r#"
            [[cells]]
            kind = "start"
            name = "Go"

            [[cells]]
            kind = "prison"
            name = "Jail"

            [[cells]]
            kind = "upgrade"
            name = "Short Street"
            group = "a"
            cost = 100
            upgrade_cost = 50
            rent = [5, 10]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::BadRentTiers { index: 2, .. }));
    }

    #[test]
    fn load_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [[cells]]
            kind = "start"
            name = "Go"

            [[cells]]
            kind = "prison"
            name = "Jail"
            "#
        )
        .unwrap();
        let board = BoardLayout::load_file(file.path()).unwrap();
        assert_eq!(board.total_cells(), 2);

        let err = BoardLayout::load_file(Path::new("/nonexistent/board.toml")).unwrap_err();
        assert!(matches!(err, LayoutError::FileNotFound(_)));
    }
}
