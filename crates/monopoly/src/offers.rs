//! Offers: what the engine proposes to the acting player
//!
//! Each offer is pushed to the player when issued, and the latest one per
//! seat is kept so a reconnecting client can ask for it again.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Offer {
    /// Roll to move.
    RollDice,
    /// In prison: roll for a double, or pay the fine now.
    RollOrPay { amount: i64, tries_left: u8 },
    /// A payment is due. `to` is the creditor seat, none for the bank.
    Pay { amount: i64, to: Option<usize> },
    /// The landed-on cell is for sale.
    BuyCell { cell: usize, cost: i64 },
}

/// Latest offer issued to each seat.
#[derive(Debug)]
pub struct OfferBook {
    last: Vec<Option<Offer>>,
}

impl OfferBook {
    pub fn new(seats: usize) -> Self {
        Self {
            last: vec![None; seats],
        }
    }

    pub fn issue(&mut self, seat: usize, offer: Offer) -> &Offer {
        self.last[seat] = Some(offer);
        self.last[seat].as_ref().expect("offer was just stored")
    }

    pub fn withdraw(&mut self, seat: usize) {
        self.last[seat] = None;
    }

    pub fn current(&self, seat: usize) -> Option<&Offer> {
        self.last.get(seat).and_then(|o| o.as_ref())
    }
}
