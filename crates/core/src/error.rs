//! Error types for Tabletop Core
//!
//! Every rejected operation carries a human-readable reason plus an
//! implicit status classification the transport layer can map onto
//! its own response codes. Rejections never mutate game state.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Capacity exhausted: {0}")]
    Capacity(String),

    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Status classification exposed alongside the reason string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Unauthorized,
    NotFound,
    BadRequest,
    Conflict,
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Error::Unauthorized(_) => Status::Unauthorized,
            Error::NotFound(_) => Status::NotFound,
            Error::Rejected(_) | Error::Payload(_) => Status::BadRequest,
            Error::Conflict(_) | Error::Capacity(_) => Status::Conflict,
        }
    }

    /// Human-readable reason without the classification prefix.
    pub fn reason(&self) -> String {
        match self {
            Error::Unauthorized(r)
            | Error::NotFound(r)
            | Error::Rejected(r)
            | Error::Conflict(r)
            | Error::Capacity(r) => r.clone(),
            Error::Payload(e) => e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
