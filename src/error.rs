//! Error types for helpdesk-autoassign.

use crate::model::TeamId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The team has no entry in the current registry snapshot: it is not
    /// round-robin, was deleted, or has not been loaded yet.
    #[error("team {0} not found in assignment registry")]
    TeamNotFound(TeamId),

    /// The team is round-robin but has no members to rotate through.
    #[error("team {0} has no members in its rotation pool")]
    EmptyPool(TeamId),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("engine already started")]
    AlreadyStarted,

    #[error("engine has been stopped")]
    Stopped,

    #[error("assignment interval must be greater than zero")]
    InvalidInterval,

    #[error("config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
