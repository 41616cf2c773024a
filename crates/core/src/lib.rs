//! Tabletop Core Library
//!
//! Generic turn-based multiplayer session framework: key pools,
//! lobby management, session lifetime, turn routing, and the
//! contract concrete games implement.

pub mod collab;
pub mod config;
pub mod error;
pub mod hub;
pub mod ids;
pub mod invariants;
pub mod keypool;
pub mod lobby;
pub mod lobby_manager;
pub mod notice;
pub mod registry;
pub mod session;
pub mod session_manager;
pub mod timer;

pub use collab::{Broadcaster, FinishedGame, GameArchive, NullBroadcaster};
pub use config::SessionCore;
pub use error::{Error, Result, Status};
pub use hub::GameHub;
pub use ids::{ConnectionId, LobbyKey, PlayerId, PoolKey, SessionKey};
pub use keypool::KeyPool;
pub use lobby::{Lobby, LobbySnapshot};
pub use lobby_manager::{LobbyManager, StartRoster};
pub use notice::{Audience, GameNotice, Notice, NoticeBody, Recipients};
pub use registry::ConcurrentRegistry;
pub use session::{GameFactory, Session, Transition, TurnGame};
pub use session_manager::SessionManager;
pub use timer::TurnTimer;
