//! Monopoly-style game engine
//!
//! A board of cells loaded from TOML, seats taking dice-driven turns, and an
//! action protocol where the engine tells each client which actions it will
//! accept next. Plugs into the session layer through `MonopolyFactory`.

pub mod actions;
pub mod game;
pub mod incidents;
pub mod layout;
pub mod log;
pub mod offers;
pub mod state;

pub use actions::{ActionKind, ActionPayload, ExpectedActions};
pub use game::{MonopolyFactory, MonopolyGame, MAX_PLAYERS, MIN_PLAYERS};
pub use layout::{BoardLayout, CellSpec, LayoutError};
pub use offers::Offer;
pub use state::MonopolyConfig;
