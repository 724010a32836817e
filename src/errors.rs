// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! These errors only describe misuse of the manager API or configuration
//! problems. Anything that goes wrong while *running* a command is reported
//! as a normal [`CommandResponse`](crate::types::CommandResponse) instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("command manager must be started from within a tokio runtime")]
    NoRuntime,

    #[error("command manager is shutting down")]
    ShutdownInProgress,

    #[error("invalid command name: {0:?}")]
    InvalidCommandName(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
