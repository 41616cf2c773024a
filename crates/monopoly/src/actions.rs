//! Player action wire format and the expected-action set
//!
//! Every turn the engine publishes which actions it will accept next.
//! `Upgrade` and `Downgrade` are side actions: they are always legal for the
//! acting player while any primary action is pending, so they never appear in
//! the expected set themselves.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Roll the dice and move.
    DiceToMove,
    /// Roll the dice hoping for a double to leave prison.
    DiceToExitPrison,
    /// Settle an outstanding payment (rent or prison fine).
    Pay,
    /// Buy the cell just landed on.
    BuyCell,
    /// Decline the purchase offer.
    No,
    /// Side action: raise a cell's build level, or buy back a mortgaged cell.
    Upgrade,
    /// Side action: lower a build level for cash, or mortgage the cell.
    Downgrade,
}

impl ActionKind {
    /// Side actions ride along with whatever primary action is expected.
    pub fn is_side_action(self) -> bool {
        matches!(self, ActionKind::Upgrade | ActionKind::Downgrade)
    }
}

/// An action as received from a player.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionPayload {
    #[serde(rename = "actionType")]
    pub action_type: ActionKind,
    /// Target cell, required for `Upgrade` and `Downgrade`.
    #[serde(rename = "cellID", default)]
    pub cell_id: Option<usize>,
}

/// The set of primary actions the engine will accept next.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExpectedActions(Vec<ActionKind>);

impl ExpectedActions {
    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn set(&mut self, kinds: &[ActionKind]) {
        debug_assert!(kinds.iter().all(|k| !k.is_side_action()));
        self.0.clear();
        self.0.extend_from_slice(kinds);
    }

    pub fn contains(&self, kind: ActionKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn kinds(&self) -> &[ActionKind] {
        &self.0
    }
}
