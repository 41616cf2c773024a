//! Monopoly-style session state machine
//!
//! One turn is a sequence of segments: the player rolls, moves, and resolves
//! whatever the landed cell demands. Doubles grant another segment, three
//! doubles in a row send the player to prison, and the turn ends once no
//! decision is outstanding. Build-level changes (`Upgrade`/`Downgrade`) ride
//! along as side actions at any point of the player's own turn.

use std::collections::VecDeque;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tracing::debug;

use tabletop_core::{Error, GameFactory, GameNotice, Result, Transition, TurnGame};

use crate::actions::{ActionKind, ActionPayload, ExpectedActions};
use crate::incidents::{Incident, IncidentTable};
use crate::layout::{BoardLayout, CellSpec};
use crate::log::EventLog;
use crate::offers::{Offer, OfferBook};
use crate::state::{assign_colors, CellState, MonopolyConfig, PlayerState};

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 8;

/// Build level cap for upgradable cells.
const MAX_LEVEL: u8 = 5;

/// A decision the engine is waiting on before the turn can continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    /// The landed cell is for sale.
    Buy { cell: usize },
    /// Rent owed to another player.
    Rent { to: usize, amount: i64 },
    /// The prison fine.
    PrisonFine,
}

pub struct MonopolyGame {
    layout: Arc<BoardLayout>,
    config: MonopolyConfig,
    incidents: IncidentTable,
    rng: StdRng,
    scripted_dice: VecDeque<(u8, u8)>,
    players: Vec<PlayerState>,
    /// Aligned with the layout; `None` for non-ownable cells.
    cells: Vec<Option<CellState>>,
    current: usize,
    expected: ExpectedActions,
    pending: Pending,
    offers: OfferBook,
    log: EventLog,
    /// Current decayed bonus values.
    lap_bonus: i64,
    start_bonus: i64,
    doubles_streak: u8,
    upgraded_this_turn: bool,
    turn_ended: bool,
    last_dice: Option<(u8, u8)>,
    winner: Option<usize>,
    outbox: Vec<GameNotice>,
}

impl MonopolyGame {
    pub fn new(
        layout: Arc<BoardLayout>,
        config: MonopolyConfig,
        seats: usize,
        mut rng: StdRng,
    ) -> Self {
        let colors = assign_colors(&mut rng, seats);
        let players = colors
            .into_iter()
            .map(|color| PlayerState::new(config.starting_money, layout.start_index(), color))
            .collect();
        let cells = layout
            .cells()
            .iter()
            .map(|c| c.is_ownable().then(CellState::default))
            .collect();
        let current = rng.gen_range(0..seats);
        let mut game = Self {
            lap_bonus: config.lap_bonus,
            start_bonus: config.start_bonus,
            log: EventLog::new(config.log_capacity),
            offers: OfferBook::new(seats),
            incidents: IncidentTable::default(),
            rng,
            scripted_dice: VecDeque::new(),
            players,
            cells,
            current,
            expected: ExpectedActions::default(),
            pending: Pending::None,
            doubles_streak: 0,
            upgraded_this_turn: false,
            turn_ended: false,
            last_dice: None,
            winner: None,
            outbox: Vec::new(),
            layout,
            config,
        };
        game.begin_turn();
        game
    }

    // ---- scenario setup -------------------------------------------------

    /// Queue dice rolls to be consumed before the RNG is consulted.
    pub fn script_dice(&mut self, rolls: &[(u8, u8)]) {
        self.scripted_dice.extend(rolls.iter().copied());
    }

    /// Hand a cell to a seat outright.
    pub fn assign_owner(&mut self, cell: usize, seat: usize) {
        let state = self.cells[cell]
            .as_mut()
            .expect("assigned cell must be ownable");
        state.owner = Some(seat);
    }

    /// Force whose turn it is and restart that turn.
    pub fn set_current_seat(&mut self, seat: usize) {
        self.current = seat;
        self.outbox.clear();
        self.begin_turn();
    }

    // ---- inspection -----------------------------------------------------

    pub fn current_seat(&self) -> usize {
        self.current
    }

    pub fn expected_actions(&self) -> &ExpectedActions {
        &self.expected
    }

    pub fn money_of(&self, seat: usize) -> i64 {
        self.players[seat].money
    }

    pub fn position_of(&self, seat: usize) -> usize {
        self.players[seat].position
    }

    pub fn is_in_prison(&self, seat: usize) -> bool {
        self.players[seat].in_prison
    }

    pub fn cell_owner(&self, cell: usize) -> Option<usize> {
        self.cells[cell].as_ref().and_then(|s| s.owner)
    }

    pub fn cell_level(&self, cell: usize) -> u8 {
        self.cells[cell].as_ref().map(|s| s.level).unwrap_or(0)
    }

    pub fn is_mortgaged(&self, cell: usize) -> bool {
        self.cells[cell].as_ref().is_some_and(|s| s.sold)
    }

    // ---- turn machinery -------------------------------------------------

    fn roll(&mut self) -> (u8, u8) {
        if let Some(roll) = self.scripted_dice.pop_front() {
            return roll;
        }
        (self.rng.gen_range(1..=6), self.rng.gen_range(1..=6))
    }

    fn begin_turn(&mut self) {
        self.doubles_streak = 0;
        self.upgraded_this_turn = false;
        let seat = self.current;
        if self.players[seat].in_prison {
            self.pending = Pending::PrisonFine;
            if self.players[seat].free_tries >= self.config.max_free_tries {
                self.expected.set(&[ActionKind::Pay]);
                self.offer(
                    seat,
                    Offer::Pay {
                        amount: self.config.prison_fine,
                        to: None,
                    },
                );
            } else {
                self.expected
                    .set(&[ActionKind::Pay, ActionKind::DiceToExitPrison]);
                let tries_left = self.config.max_free_tries - self.players[seat].free_tries;
                self.offer(
                    seat,
                    Offer::RollOrPay {
                        amount: self.config.prison_fine,
                        tries_left,
                    },
                );
            }
        } else {
            self.pending = Pending::None;
            self.expected.set(&[ActionKind::DiceToMove]);
            self.offer(seat, Offer::RollDice);
        }
    }

    fn end_turn(&mut self) {
        debug_assert_eq!(self.pending, Pending::None);
        self.expected.clear();
        self.offers.withdraw(self.current);
        self.tick_mortgages(self.current);
        self.turn_ended = true;
        if self.winner.is_some() {
            return;
        }
        let seats = self.players.len();
        let mut next = (self.current + 1) % seats;
        while self.players[next].dead {
            next = (next + 1) % seats;
        }
        self.current = next;
        self.begin_turn();
    }

    /// Count down mortgages held by this seat; expired ones revert to the bank.
    fn tick_mortgages(&mut self, seat: usize) {
        for index in 0..self.cells.len() {
            let Some(state) = self.cells[index].as_mut() else {
                continue;
            };
            if state.owner != Some(seat) || !state.sold {
                continue;
            }
            let left = state.moves_left.unwrap_or(0).saturating_sub(1);
            if left == 0 {
                *state = CellState::default();
                let name = self.layout.cell(index).name().to_owned();
                self.note(format!("{name} reverts to the bank"));
            } else {
                state.moves_left = Some(left);
            }
        }
    }

    /// Decide what happens after a segment's cell effects are settled.
    fn conclude_segment(&mut self) {
        if self.pending != Pending::None {
            return;
        }
        if self.players[self.current].in_prison {
            // Imprisoned mid-segment; the turn is over.
            self.end_turn();
            return;
        }
        if self.doubles_streak > 0 {
            self.expected.set(&[ActionKind::DiceToMove]);
            self.offer(self.current, Offer::RollDice);
            self.note(format!(
                "Player {} rolled a double and goes again",
                self.current
            ));
            return;
        }
        self.end_turn();
    }

    /// Move and resolve the landed cell. May recurse through a portal;
    /// the caller settles the segment afterwards with `conclude_segment`.
    fn move_forward(&mut self, steps: usize) {
        let seat = self.current;
        let total = self.layout.total_cells();
        let from = self.players[seat].position;
        let mut to_start = (self.layout.start_index() + total - from) % total;
        if to_start == 0 {
            to_start = total;
        }
        let landing = (from + steps) % total;
        if steps >= to_start {
            self.award_lap_bonus(seat, landing == self.layout.start_index());
        }
        self.players[seat].position = landing;
        debug!(seat, from, landing, "player moved");
        self.apply_cell_effect(landing);
    }

    fn award_lap_bonus(&mut self, seat: usize, exact_landing: bool) {
        let mut award = self.lap_bonus;
        self.lap_bonus = (self.lap_bonus - self.config.bonus_decay).max(0);
        if exact_landing {
            award += self.start_bonus;
            self.start_bonus = (self.start_bonus - self.config.bonus_decay).max(0);
        }
        self.players[seat].money += award;
        self.note(format!("Player {seat} collects {award} for passing start"));
    }

    fn imprison(&mut self, seat: usize) {
        let player = &mut self.players[seat];
        player.in_prison = true;
        player.free_tries = 0;
        player.position = self.layout.prison_index();
        self.note(format!("Player {seat} is sent to prison"));
    }

    fn apply_cell_effect(&mut self, index: usize) {
        let seat = self.current;
        match self.layout.cell(index).clone() {
            CellSpec::Start { .. } => {}
            CellSpec::Portal { name } => {
                // The portal throws the traveller onward by a fresh roll.
                let (a, b) = self.roll();
                self.last_dice = Some((a, b));
                self.note(format!("Player {seat} surges onward from {name}"));
                self.move_forward((a + b) as usize);
            }
            CellSpec::Prison { name } => {
                self.note(format!("Player {seat} is just visiting {name}"));
            }
            CellSpec::GoToPrison { .. } => {
                self.imprison(seat);
            }
            CellSpec::Event { .. } => {
                let incident = self.incidents.draw(&mut self.rng);
                self.apply_incident(seat, incident);
            }
            CellSpec::Bank { name } => {
                if self.rng.gen_bool(self.config.bank_positive_chance) {
                    self.players[seat].money += self.config.bank_dividend;
                    self.note(format!(
                        "{name} pays player {seat} a dividend of {}",
                        self.config.bank_dividend
                    ));
                } else {
                    self.players[seat].money -= self.config.bank_tax;
                    self.note(format!(
                        "{name} taxes player {seat} for {}",
                        self.config.bank_tax
                    ));
                }
            }
            spec => {
                self.land_on_ownable(seat, index, &spec);
            }
        }
    }

    fn land_on_ownable(&mut self, seat: usize, index: usize, spec: &CellSpec) {
        let (owner, sold) = {
            let state = self.cells[index]
                .as_ref()
                .expect("ownable cell has runtime state");
            (state.owner, state.sold)
        };
        match owner {
            None => {
                let cost = spec.cost().expect("ownable cell has a cost");
                self.pending = Pending::Buy { cell: index };
                self.expected.set(&[ActionKind::BuyCell, ActionKind::No]);
                self.offer(seat, Offer::BuyCell { cell: index, cost });
            }
            Some(owner) if owner == seat || sold => {}
            Some(owner) => {
                let amount = self.toll(index, owner);
                if amount > 0 {
                    self.pending = Pending::Rent { to: owner, amount };
                    self.expected.set(&[ActionKind::Pay]);
                    self.offer(
                        seat,
                        Offer::Pay {
                            amount,
                            to: Some(owner),
                        },
                    );
                }
            }
        }
    }

    /// What landing on an owned, unmortgaged cell costs.
    fn toll(&self, index: usize, owner: usize) -> i64 {
        match self.layout.cell(index) {
            CellSpec::Upgrade { rent, .. } => {
                let level = self.cells[index].as_ref().map(|s| s.level).unwrap_or(0);
                rent[level as usize]
            }
            CellSpec::Count { group, rent, .. } => {
                let held = self.holdings_in_group(owner, group);
                rent[held.saturating_sub(1).min(rent.len() - 1)]
            }
            CellSpec::Dice {
                group, multiplier, ..
            } => {
                let held = self.holdings_in_group(owner, group);
                let factor = multiplier[held.saturating_sub(1).min(multiplier.len() - 1)];
                let sum = self
                    .last_dice
                    .map(|(a, b)| (a + b) as i64)
                    .unwrap_or_default();
                factor * sum
            }
            _ => 0,
        }
    }

    /// Cells of `group` this seat owns outright (not mortgaged).
    fn holdings_in_group(&self, seat: usize, group: &str) -> usize {
        self.layout
            .group_cells(group)
            .into_iter()
            .filter(|&i| {
                self.cells[i]
                    .as_ref()
                    .is_some_and(|s| s.owner == Some(seat) && !s.sold)
            })
            .count()
    }

    fn apply_incident(&mut self, seat: usize, incident: Incident) {
        match incident {
            Incident::Birthday { amount } => {
                let mut received = 0;
                for other in 0..self.players.len() {
                    if other == seat || self.players[other].dead {
                        continue;
                    }
                    self.players[other].money -= amount;
                    received += amount;
                }
                self.players[seat].money += received;
                self.note(format!(
                    "Player {seat} has a birthday and collects {received}"
                ));
            }
            Incident::Repairs { per_level } => {
                let levels: i64 = self
                    .cells
                    .iter()
                    .flatten()
                    .filter(|s| s.owner == Some(seat) && !s.sold)
                    .map(|s| s.level as i64)
                    .sum();
                let bill = levels * per_level;
                self.players[seat].money -= bill;
                self.note(format!("Player {seat} pays {bill} for repairs"));
            }
            Incident::Travel => {
                let destination = self
                    .layout
                    .portal_index()
                    .unwrap_or_else(|| self.layout.start_index());
                self.players[seat].position = destination;
                self.note(format!("Player {seat} is whisked away by a portal"));
            }
            Incident::Arrest => {
                self.imprison(seat);
            }
            Incident::Windfall { amount } => {
                self.players[seat].money += amount;
                self.note(format!("Player {seat} receives a windfall of {amount}"));
            }
            Incident::Fine { amount } => {
                self.players[seat].money -= amount;
                self.note(format!("Player {seat} is fined {amount}"));
            }
        }
    }

    // ---- primary actions ------------------------------------------------

    fn do_dice_to_move(&mut self) {
        self.expected.clear();
        self.offers.withdraw(self.current);
        let (a, b) = self.roll();
        self.last_dice = Some((a, b));
        self.note(format!("Player {} rolls {a} and {b}", self.current));
        if a == b {
            self.doubles_streak += 1;
            if self.doubles_streak >= 3 {
                self.note(format!(
                    "Player {} rolled three doubles in a row",
                    self.current
                ));
                self.imprison(self.current);
                self.end_turn();
                return;
            }
        } else {
            self.doubles_streak = 0;
        }
        self.move_forward((a + b) as usize);
        self.conclude_segment();
    }

    fn do_dice_to_exit_prison(&mut self) {
        self.expected.clear();
        self.offers.withdraw(self.current);
        let (a, b) = self.roll();
        self.last_dice = Some((a, b));
        let seat = self.current;
        if a == b {
            self.pending = Pending::None;
            let player = &mut self.players[seat];
            player.in_prison = false;
            player.free_tries = 0;
            self.note(format!("Player {seat} rolls a double and walks free"));
            // No extra roll for this double; streak stays zero.
            self.move_forward((a + b) as usize);
            self.conclude_segment();
        } else {
            self.players[seat].free_tries += 1;
            self.pending = Pending::None;
            self.note(format!("Player {seat} fails to roll out of prison"));
            self.end_turn();
        }
    }

    fn do_pay(&mut self) -> Result<()> {
        let seat = self.current;
        match self.pending {
            Pending::PrisonFine => {
                let fine = self.config.prison_fine;
                if self.players[seat].money < fine {
                    return Err(Error::Rejected("cannot afford the prison fine".into()));
                }
                self.players[seat].money -= fine;
                let player = &mut self.players[seat];
                player.in_prison = false;
                player.free_tries = 0;
                self.pending = Pending::None;
                self.note(format!("Player {seat} pays the fine and leaves prison"));
                self.expected.set(&[ActionKind::DiceToMove]);
                self.offer(seat, Offer::RollDice);
                Ok(())
            }
            Pending::Rent { to, amount } => {
                if self.players[seat].money < amount {
                    return Err(Error::Rejected("cannot afford the payment".into()));
                }
                self.players[seat].money -= amount;
                self.players[to].money += amount;
                self.pending = Pending::None;
                self.offers.withdraw(seat);
                self.note(format!("Player {seat} pays {amount} to player {to}"));
                self.conclude_segment();
                Ok(())
            }
            _ => Err(Error::Rejected("no payment is due".into())),
        }
    }

    fn do_buy(&mut self) -> Result<()> {
        let seat = self.current;
        let Pending::Buy { cell } = self.pending else {
            return Err(Error::Rejected("nothing is for sale".into()));
        };
        let spec = self.layout.cell(cell);
        let cost = spec.cost().expect("offered cell has a cost");
        if self.players[seat].money < cost {
            return Err(Error::Rejected("cannot afford the cell".into()));
        }
        let name = spec.name().to_owned();
        self.players[seat].money -= cost;
        self.cells[cell]
            .as_mut()
            .expect("offered cell has runtime state")
            .owner = Some(seat);
        self.pending = Pending::None;
        self.offers.withdraw(seat);
        self.note(format!("Player {seat} buys {name} for {cost}"));
        self.conclude_segment();
        Ok(())
    }

    fn do_no(&mut self) -> Result<()> {
        let Pending::Buy { cell } = self.pending else {
            return Err(Error::Rejected("there is no offer to decline".into()));
        };
        let name = self.layout.cell(cell).name().to_owned();
        self.pending = Pending::None;
        self.offers.withdraw(self.current);
        self.note(format!("Player {} declines {name}", self.current));
        self.conclude_segment();
        Ok(())
    }

    // ---- side actions ---------------------------------------------------

    fn do_upgrade(&mut self, cell: usize) -> Result<()> {
        let seat = self.current;
        let state = self
            .cells
            .get(cell)
            .and_then(|s| s.as_ref())
            .ok_or_else(|| Error::Rejected("cell cannot be owned".into()))?;
        if state.owner != Some(seat) {
            return Err(Error::Rejected("cell is not yours".into()));
        }
        if state.sold {
            // Buying back a mortgaged cell, at the mortgage price.
            let price = self.layout.cell(cell).cost().unwrap_or(0) / 2;
            if self.players[seat].money < price {
                return Err(Error::Rejected("cannot afford to redeem the cell".into()));
            }
            self.players[seat].money -= price;
            let state = self.cells[cell].as_mut().expect("cell state checked above");
            state.sold = false;
            state.moves_left = None;
            let name = self.layout.cell(cell).name().to_owned();
            self.note(format!("Player {seat} redeems {name} for {price}"));
            return Ok(());
        }
        let CellSpec::Upgrade {
            name,
            group,
            upgrade_cost,
            ..
        } = self.layout.cell(cell).clone()
        else {
            return Err(Error::Rejected("cell cannot be built up".into()));
        };
        if self.upgraded_this_turn {
            return Err(Error::Rejected("already built this turn".into()));
        }
        if state.level >= MAX_LEVEL {
            return Err(Error::Rejected("cell is fully built".into()));
        }
        let group_indices = self.layout.group_cells(&group);
        let fully_owned = group_indices.iter().all(|&i| {
            self.cells[i]
                .as_ref()
                .is_some_and(|s| s.owner == Some(seat) && !s.sold)
        });
        if !fully_owned {
            return Err(Error::Rejected(
                "the whole group must be owned before building".into(),
            ));
        }
        let min_level = group_indices
            .iter()
            .filter_map(|&i| self.cells[i].as_ref().map(|s| s.level))
            .min()
            .unwrap_or(0);
        if state.level > min_level {
            return Err(Error::Rejected(
                "levels must stay even across the group".into(),
            ));
        }
        if self.players[seat].money < upgrade_cost {
            return Err(Error::Rejected("cannot afford the upgrade".into()));
        }
        self.players[seat].money -= upgrade_cost;
        let state = self.cells[cell].as_mut().expect("cell state checked above");
        state.level += 1;
        let level = state.level;
        self.upgraded_this_turn = true;
        self.note(format!("Player {seat} builds {name} up to level {level}"));
        Ok(())
    }

    fn do_downgrade(&mut self, cell: usize) -> Result<()> {
        let seat = self.current;
        let state = self
            .cells
            .get(cell)
            .and_then(|s| s.as_ref())
            .ok_or_else(|| Error::Rejected("cell cannot be owned".into()))?;
        if state.owner != Some(seat) {
            return Err(Error::Rejected("cell is not yours".into()));
        }
        let spec = self.layout.cell(cell).clone();
        if state.level > 0 {
            let CellSpec::Upgrade {
                name, upgrade_cost, ..
            } = &spec
            else {
                return Err(Error::Rejected("cell has no build levels".into()));
            };
            let group = spec.group().expect("upgrade cell has a group");
            let max_level = self
                .layout
                .group_cells(group)
                .into_iter()
                .filter_map(|i| self.cells[i].as_ref().map(|s| s.level))
                .max()
                .unwrap_or(0);
            if state.level < max_level {
                return Err(Error::Rejected(
                    "levels must stay even across the group".into(),
                ));
            }
            let refund = upgrade_cost / 2;
            let state = self.cells[cell].as_mut().expect("cell state checked above");
            state.level -= 1;
            let level = state.level;
            self.players[seat].money += refund;
            self.note(format!(
                "Player {seat} tears {name} down to level {level} for {refund}"
            ));
            return Ok(());
        }
        if state.sold {
            return Err(Error::Rejected("cell is already mortgaged".into()));
        }
        let refund = spec.cost().unwrap_or(0) / 2;
        let state = self.cells[cell].as_mut().expect("cell state checked above");
        state.sold = true;
        state.moves_left = Some(self.config.moves_to_lose_cell);
        self.players[seat].money += refund;
        let name = spec.name().to_owned();
        self.note(format!("Player {seat} mortgages {name} for {refund}"));
        Ok(())
    }

    // ---- notices and views ----------------------------------------------

    fn offer(&mut self, seat: usize, offer: Offer) {
        let offer = self.offers.issue(seat, offer).clone();
        self.outbox
            .push(GameNotice::seat(seat, json!({ "event": "offer", "offer": offer })));
    }

    fn note(&mut self, text: String) {
        debug!(%text, "game event");
        self.log.push(text);
    }

    fn public_state(&self) -> Value {
        let log: Vec<_> = self.log.entries().collect();
        json!({
            "current_player": self.current,
            "expected": &self.expected,
            "players": &self.players,
            "cells": &self.cells,
            "last_dice": self.last_dice,
            "winner": self.winner,
            "log": log,
        })
    }

    /// Drain accumulated notices, appending a shared state snapshot.
    fn transition(&mut self) -> Transition {
        let mut notices = std::mem::take(&mut self.outbox);
        notices.push(GameNotice::all(
            json!({ "event": "update", "state": self.public_state() }),
        ));
        if std::mem::take(&mut self.turn_ended) {
            Transition::advanced(notices)
        } else {
            Transition::held(notices)
        }
    }

    fn release_holdings(&mut self, seat: usize) {
        for state in self.cells.iter_mut().flatten() {
            if state.owner == Some(seat) {
                *state = CellState::default();
            }
        }
    }
}

impl TurnGame for MonopolyGame {
    fn player_count(&self) -> usize {
        self.players.len()
    }

    fn is_player_turn(&self, seat: usize) -> bool {
        self.winner.is_none() && seat == self.current && !self.players[seat].dead
    }

    fn relative_state(&self, seat: usize) -> Value {
        let mut state = self.public_state();
        state["you"] = json!(seat);
        state["offer"] = json!(self.offers.current(seat));
        state
    }

    fn apply_action(&mut self, seat: usize, payload: &Value) -> Result<Transition> {
        if self.winner.is_some() {
            return Err(Error::Conflict("the game is over".into()));
        }
        if seat != self.current {
            return Err(Error::Rejected("it is not this player's turn".into()));
        }
        let action: ActionPayload = serde_json::from_value(payload.clone())?;
        if action.action_type.is_side_action() {
            let cell = action
                .cell_id
                .ok_or_else(|| Error::Rejected("a cell must be named".into()))?;
            match action.action_type {
                ActionKind::Upgrade => self.do_upgrade(cell)?,
                ActionKind::Downgrade => self.do_downgrade(cell)?,
                _ => unreachable!("side actions are upgrade and downgrade"),
            }
            return Ok(self.transition());
        }
        if !self.expected.contains(action.action_type) {
            return Err(Error::Rejected("that action is not expected now".into()));
        }
        match action.action_type {
            ActionKind::DiceToMove => self.do_dice_to_move(),
            ActionKind::DiceToExitPrison => self.do_dice_to_exit_prison(),
            ActionKind::Pay => self.do_pay()?,
            ActionKind::BuyCell => self.do_buy()?,
            ActionKind::No => self.do_no()?,
            ActionKind::Upgrade | ActionKind::Downgrade => {
                unreachable!("side actions were handled above")
            }
        }
        Ok(self.transition())
    }

    fn surrender(&mut self, seat: usize) -> Transition {
        if self.winner.is_some() || self.players[seat].dead {
            return Transition::held(Vec::new());
        }
        self.players[seat].dead = true;
        self.release_holdings(seat);
        self.offers.withdraw(seat);
        self.note(format!("Player {seat} gives up"));
        let alive: Vec<usize> = (0..self.players.len())
            .filter(|&s| !self.players[s].dead)
            .collect();
        if alive.len() == 1 {
            self.winner = Some(alive[0]);
            self.note(format!("Player {} wins the game", alive[0]));
            self.expected.clear();
            self.pending = Pending::None;
            self.turn_ended = true;
        } else if seat == self.current {
            self.pending = Pending::None;
            self.end_turn();
        } else if matches!(self.pending, Pending::Rent { to, .. } if to == seat) {
            // The creditor is gone; the toll dies with them.
            self.pending = Pending::None;
            self.offers.withdraw(self.current);
            self.note(format!("The toll owed to player {seat} is voided"));
            self.conclude_segment();
        }
        self.transition()
    }

    fn request(&mut self, seat: usize, payload: &Value) -> Result<Transition> {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Rejected("a request type is required".into()))?;
        match kind {
            "repeat_offer" => {
                let body = json!({ "event": "offer", "offer": self.offers.current(seat) });
                Ok(Transition::held(vec![GameNotice::seat(seat, body)]))
            }
            other => Err(Error::Rejected(format!("unknown request '{other}'"))),
        }
    }

    fn winner(&self) -> Option<usize> {
        self.winner
    }
}

/// Builds games on the default board unless another layout is supplied.
pub struct MonopolyFactory {
    layout: Arc<BoardLayout>,
    config: MonopolyConfig,
}

impl MonopolyFactory {
    pub fn new() -> Self {
        Self {
            layout: Arc::new(BoardLayout::builtin().clone()),
            config: MonopolyConfig::default(),
        }
    }

    pub fn with_layout(layout: Arc<BoardLayout>) -> Self {
        Self {
            layout,
            config: MonopolyConfig::default(),
        }
    }

    pub fn config(mut self, config: MonopolyConfig) -> Self {
        self.config = config;
        self
    }
}

impl Default for MonopolyFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl GameFactory for MonopolyFactory {
    type Game = MonopolyGame;

    fn create(&self, players: usize, _settings: &Value) -> Result<MonopolyGame> {
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&players) {
            return Err(Error::Rejected(format!(
                "the game needs {MIN_PLAYERS} to {MAX_PLAYERS} players"
            )));
        }
        Ok(MonopolyGame::new(
            self.layout.clone(),
            self.config.clone(),
            players,
            StdRng::from_entropy(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_game(seats: usize) -> MonopolyGame {
        let mut game = MonopolyGame::new(
            Arc::new(BoardLayout::builtin().clone()),
            MonopolyConfig::default(),
            seats,
            StdRng::seed_from_u64(42),
        );
        game.set_current_seat(0);
        game
    }

    fn act(game: &mut MonopolyGame, seat: usize, payload: Value) -> Result<Transition> {
        game.apply_action(seat, &payload)
    }

    fn roll_action() -> Value {
        json!({ "actionType": "dice_to_move" })
    }

    #[test]
    fn first_segment_expects_a_roll() {
        let game = fresh_game(2);
        assert!(game.expected_actions().contains(ActionKind::DiceToMove));
        assert!(!game.expected_actions().contains(ActionKind::Pay));
    }

    #[test]
    fn landing_on_a_free_cell_offers_a_purchase() {
        let mut game = fresh_game(2);
        game.script_dice(&[(1, 3)]);
        act(&mut game, 0, roll_action()).unwrap();
        // Cell 4 is ownable; a buy-or-pass decision is now pending.
        assert_eq!(game.position_of(0), 4);
        assert!(game.expected_actions().contains(ActionKind::BuyCell));
        assert!(game.expected_actions().contains(ActionKind::No));

        let before = game.money_of(0);
        act(&mut game, 0, json!({ "actionType": "buy_cell" })).unwrap();
        assert_eq!(game.cell_owner(4), Some(0));
        assert_eq!(game.money_of(0), before - 200);
        // Not a double, so the turn has passed on.
        assert_eq!(game.current_seat(), 1);
    }

    #[test]
    fn declining_a_purchase_leaves_the_cell_free() {
        let mut game = fresh_game(2);
        game.script_dice(&[(1, 3)]);
        act(&mut game, 0, roll_action()).unwrap();
        act(&mut game, 0, json!({ "actionType": "no" })).unwrap();
        assert_eq!(game.cell_owner(4), None);
        assert_eq!(game.current_seat(), 1);
    }

    #[test]
    fn unexpected_actions_are_rejected() {
        let mut game = fresh_game(2);
        let err = act(&mut game, 0, json!({ "actionType": "pay" })).unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
        let err = act(&mut game, 1, roll_action()).unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
    }

    #[test]
    fn rent_is_demanded_and_paid() {
        let mut game = fresh_game(2);
        game.assign_owner(4, 1);
        game.script_dice(&[(1, 3)]);
        act(&mut game, 0, roll_action()).unwrap();
        assert!(game.expected_actions().contains(ActionKind::Pay));
        assert!(!game.expected_actions().contains(ActionKind::BuyCell));

        let payer = game.money_of(0);
        let owner = game.money_of(1);
        act(&mut game, 0, json!({ "actionType": "pay" })).unwrap();
        // One rail held: base rent of 25.
        assert_eq!(game.money_of(0), payer - 25);
        assert_eq!(game.money_of(1), owner + 25);
        assert_eq!(game.current_seat(), 1);
    }

    #[test]
    fn rent_owed_to_a_surrendered_player_is_voided() {
        let mut game = fresh_game(3);
        game.assign_owner(4, 1);
        game.script_dice(&[(1, 3)]);
        act(&mut game, 0, roll_action()).unwrap();
        assert!(game.expected_actions().contains(ActionKind::Pay));

        game.surrender(1);
        assert_eq!(game.cell_owner(4), None);
        assert_eq!(game.pending, Pending::None);
        assert!(!game.expected_actions().contains(ActionKind::Pay));
        // No double was rolled, so the debtor's turn ends; seat 1 is
        // skipped and seat 1's balance never moved.
        assert_eq!(game.current_seat(), 2);
        assert_eq!(game.money_of(0), 1500);
        assert_eq!(game.money_of(1), 1500);
    }

    #[test]
    fn landing_on_your_own_cell_costs_nothing() {
        let mut game = fresh_game(2);
        game.assign_owner(4, 0);
        game.script_dice(&[(1, 3)]);
        let before = game.money_of(0);
        act(&mut game, 0, roll_action()).unwrap();
        assert_eq!(game.money_of(0), before);
        assert_eq!(game.current_seat(), 1);
    }

    #[test]
    fn doubles_grant_an_extra_roll() {
        let mut game = fresh_game(2);
        game.assign_owner(4, 0);
        game.assign_owner(15, 0);
        game.script_dice(&[(2, 2), (5, 6)]);
        act(&mut game, 0, roll_action()).unwrap();
        // Landed on an owned cell after a double, so the same seat rolls again.
        assert_eq!(game.current_seat(), 0);
        assert!(game.expected_actions().contains(ActionKind::DiceToMove));
        act(&mut game, 0, roll_action()).unwrap();
        assert_eq!(game.position_of(0), 15);
        assert_eq!(game.current_seat(), 1);
    }

    #[test]
    fn three_doubles_in_a_row_mean_prison() {
        let mut game = fresh_game(2);
        game.assign_owner(4, 0);
        game.script_dice(&[(2, 2), (3, 3), (1, 1)]);
        act(&mut game, 0, roll_action()).unwrap();
        assert_eq!(game.position_of(0), 4);
        act(&mut game, 0, roll_action()).unwrap();
        // Cell 10 is the prison, but landing there is only a visit.
        assert_eq!(game.position_of(0), 10);
        assert!(!game.is_in_prison(0));
        act(&mut game, 0, roll_action()).unwrap();
        assert!(game.is_in_prison(0));
        assert_eq!(game.position_of(0), 10);
        assert_eq!(game.current_seat(), 1);
    }

    #[test]
    fn prison_offers_roll_or_pay_then_fine_only() {
        let mut game = fresh_game(2);
        game.assign_owner(4, 0);
        game.script_dice(&[(2, 2), (3, 3), (1, 1)]);
        act(&mut game, 0, roll_action()).unwrap();
        act(&mut game, 0, roll_action()).unwrap();
        act(&mut game, 0, roll_action()).unwrap();
        assert!(game.is_in_prison(0));

        game.set_current_seat(0);
        assert!(game.expected_actions().contains(ActionKind::Pay));
        assert!(game
            .expected_actions()
            .contains(ActionKind::DiceToExitPrison));

        // Fail three escape rolls; only the fine remains afterwards.
        for _ in 0..3 {
            game.script_dice(&[(1, 2)]);
            act(&mut game, 0, json!({ "actionType": "dice_to_exit_prison" })).unwrap();
            assert!(game.is_in_prison(0));
            assert_eq!(game.current_seat(), 1);
            game.set_current_seat(0);
        }
        assert!(game.expected_actions().contains(ActionKind::Pay));
        assert!(!game
            .expected_actions()
            .contains(ActionKind::DiceToExitPrison));
    }

    #[test]
    fn paying_the_fine_frees_and_lets_the_player_roll() {
        let mut game = fresh_game(2);
        game.assign_owner(4, 0);
        game.script_dice(&[(2, 2), (3, 3), (1, 1)]);
        act(&mut game, 0, roll_action()).unwrap();
        act(&mut game, 0, roll_action()).unwrap();
        act(&mut game, 0, roll_action()).unwrap();
        assert!(game.is_in_prison(0));
        game.set_current_seat(0);

        let before = game.money_of(0);
        act(&mut game, 0, json!({ "actionType": "pay" })).unwrap();
        assert!(!game.is_in_prison(0));
        assert_eq!(game.money_of(0), before - 50);
        assert_eq!(game.current_seat(), 0);
        assert!(game.expected_actions().contains(ActionKind::DiceToMove));
    }

    #[test]
    fn escaping_with_a_double_moves_without_an_extra_roll() {
        let mut game = fresh_game(2);
        game.assign_owner(4, 0);
        game.script_dice(&[(2, 2), (3, 3), (1, 1)]);
        act(&mut game, 0, roll_action()).unwrap();
        act(&mut game, 0, roll_action()).unwrap();
        act(&mut game, 0, roll_action()).unwrap();
        game.set_current_seat(0);
        game.assign_owner(14, 0);

        game.script_dice(&[(2, 2)]);
        act(&mut game, 0, json!({ "actionType": "dice_to_exit_prison" })).unwrap();
        assert!(!game.is_in_prison(0));
        assert_eq!(game.position_of(0), 14);
        // The escape double does not earn another roll.
        assert_eq!(game.current_seat(), 1);
    }

    /// Drives seat 0 to cell 39 through quiet cells only, stealing the turn
    /// back whenever it passes. Landed cells are declined, never bought.
    fn walk_to_39(game: &mut MonopolyGame) {
        for roll in [(4, 6), (5, 6), (4, 6), (4, 4)] {
            game.script_dice(&[roll]);
            act(game, 0, roll_action()).unwrap();
            if game.expected_actions().contains(ActionKind::No) {
                act(game, 0, json!({ "actionType": "no" })).unwrap();
            }
            if game.current_seat() != 0 {
                game.set_current_seat(0);
            }
        }
        assert_eq!(game.position_of(0), 39);
    }

    #[test]
    fn lap_bonus_is_paid_once_per_crossing_and_decays() {
        let mut game = fresh_game(2);
        let before = game.money_of(0);
        walk_to_39(&mut game);
        // No crossing yet, so no bonus either.
        assert_eq!(game.money_of(0), before);

        game.set_current_seat(0);
        game.script_dice(&[(2, 0)]);
        act(&mut game, 0, roll_action()).unwrap();
        assert_eq!(game.position_of(0), 1);
        assert_eq!(game.money_of(0), before + 200);
        assert_eq!(game.lap_bonus, 190);
        assert_eq!(game.start_bonus, 100);
    }

    #[test]
    fn landing_exactly_on_start_adds_the_start_bonus() {
        let mut game = fresh_game(2);
        walk_to_39(&mut game);
        game.set_current_seat(0);
        let before = game.money_of(0);
        game.script_dice(&[(1, 0)]);
        act(&mut game, 0, roll_action()).unwrap();
        assert_eq!(game.position_of(0), 0);
        // Lap bonus 200 plus start bonus 100, before any decay.
        assert_eq!(game.money_of(0), before + 300);
        assert_eq!(game.lap_bonus, 190);
        assert_eq!(game.start_bonus, 90);
    }

    #[test]
    fn building_requires_the_whole_group_and_even_levels() {
        let mut game = fresh_game(2);
        game.assign_owner(1, 0);
        let err = act(&mut game, 0, json!({ "actionType": "upgrade", "cellID": 1 })).unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));

        game.assign_owner(3, 0);
        act(&mut game, 0, json!({ "actionType": "upgrade", "cellID": 1 })).unwrap();
        assert_eq!(game.cell_level(1), 1);

        // Only one build per turn.
        let err = act(&mut game, 0, json!({ "actionType": "upgrade", "cellID": 3 })).unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));

        // Next turn, the taller cell may not grow further ahead of its group.
        game.script_dice(&[(1, 2)]);
        act(&mut game, 0, roll_action()).unwrap();
        game.set_current_seat(0);
        let err = act(&mut game, 0, json!({ "actionType": "upgrade", "cellID": 1 })).unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
        act(&mut game, 0, json!({ "actionType": "upgrade", "cellID": 3 })).unwrap();
        assert_eq!(game.cell_level(3), 1);
    }

    #[test]
    fn mortgage_pays_half_and_reverts_after_the_countdown() {
        let mut config = MonopolyConfig::default();
        config.moves_to_lose_cell = 2;
        let mut game = MonopolyGame::new(
            Arc::new(BoardLayout::builtin().clone()),
            config,
            2,
            StdRng::seed_from_u64(42),
        );
        game.set_current_seat(0);
        game.assign_owner(1, 0);

        game.assign_owner(4, 0);

        let before = game.money_of(0);
        act(&mut game, 0, json!({ "actionType": "downgrade", "cellID": 1 })).unwrap();
        assert!(game.is_mortgaged(1));
        assert_eq!(game.money_of(0), before + 30);

        // Two of the owner's turn-ends later the cell reverts to the bank.
        game.script_dice(&[(1, 3)]);
        act(&mut game, 0, roll_action()).unwrap();
        game.set_current_seat(0);
        assert!(game.is_mortgaged(1));
        assert_eq!(game.cell_owner(1), Some(0));
        game.script_dice(&[(2, 4)]);
        act(&mut game, 0, roll_action()).unwrap();
        assert_eq!(game.cell_owner(1), None);
        assert!(!game.is_mortgaged(1));
    }

    #[test]
    fn downgrading_a_level_refunds_half_the_build_cost() {
        let mut game = fresh_game(2);
        game.assign_owner(1, 0);
        game.assign_owner(3, 0);
        act(&mut game, 0, json!({ "actionType": "upgrade", "cellID": 1 })).unwrap();
        let before = game.money_of(0);
        act(&mut game, 0, json!({ "actionType": "downgrade", "cellID": 1 })).unwrap();
        assert_eq!(game.cell_level(1), 0);
        assert_eq!(game.money_of(0), before + 25);
        assert!(!game.is_mortgaged(1));
    }

    #[test]
    fn mortgaged_cells_collect_no_rent() {
        let mut game = fresh_game(2);
        game.assign_owner(4, 1);
        game.cells[4].as_mut().unwrap().sold = true;
        game.script_dice(&[(1, 3)]);
        let before = game.money_of(0);
        act(&mut game, 0, roll_action()).unwrap();
        assert_eq!(game.money_of(0), before);
        assert_eq!(game.current_seat(), 1);
    }

    #[test]
    fn surrender_releases_holdings_and_crowns_the_survivor() {
        let mut game = fresh_game(3);
        game.assign_owner(1, 0);
        game.assign_owner(4, 0);

        let transition = game.surrender(0);
        assert!(!transition.notices.is_empty());
        assert_eq!(game.cell_owner(1), None);
        assert_eq!(game.cell_owner(4), None);
        assert!(game.winner().is_none());
        assert_eq!(game.current_seat(), 1);

        game.surrender(2);
        assert_eq!(game.winner(), Some(1));
    }

    #[test]
    fn finished_games_reject_further_actions() {
        let mut game = fresh_game(2);
        game.surrender(1);
        assert_eq!(game.winner(), Some(0));
        let err = act(&mut game, 0, roll_action()).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn repeat_offer_returns_the_standing_offer() {
        let mut game = fresh_game(2);
        let transition = game
            .request(0, &json!({ "type": "repeat_offer" }))
            .unwrap();
        assert_eq!(transition.notices.len(), 1);
        let body = &transition.notices[0].body;
        assert_eq!(body["event"], "offer");
        assert_eq!(body["offer"]["type"], "roll_dice");

        let err = game.request(0, &json!({ "type": "dance" })).unwrap_err();
        assert!(matches!(err, Error::Rejected(_)));
    }

    #[test]
    fn relative_state_names_the_seat_and_offer() {
        let game = fresh_game(2);
        let state = game.relative_state(0);
        assert_eq!(state["you"], 0);
        assert_eq!(state["current_player"], 0);
        assert_eq!(state["offer"]["type"], "roll_dice");
        assert_eq!(state["players"].as_array().unwrap().len(), 2);
        assert!(state["winner"].is_null());

        let state = game.relative_state(1);
        assert!(state["offer"].is_null());
    }

    #[test]
    fn factory_enforces_the_player_range() {
        let factory = MonopolyFactory::new();
        assert!(factory.create(1, &Value::Null).is_err());
        assert!(factory.create(9, &Value::Null).is_err());
        let game = factory.create(4, &Value::Null).unwrap();
        assert_eq!(game.player_count(), 4);
    }
}
