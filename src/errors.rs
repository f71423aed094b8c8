// src/errors.rs

//! Errors surfaced to callers of the config loader and the orchestrator API.
//!
//! Task failures never show up here: the executor absorbs them into stats,
//! notifications and the action log.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FarmhandError {
    #[error("invalid config: {0}")]
    ConfigError(String),

    #[error("reading config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("malformed config TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    /// No account record for the given id.
    #[error("unknown account '{0}'")]
    AccountNotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FarmhandError>;
