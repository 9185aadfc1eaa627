// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Admission rejections and unknown ids are *not* errors: they are reported
//! through [`crate::types::LaunchOutcome`] and `Option` respectively.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProchubError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to execute '{binary}': {source}")]
    ExecutionError {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot make '{binary}' executable: {reason}")]
    PermissionError { binary: String, reason: String },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Protocol error: {0}")]
    ProtocolError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ProchubError>;
