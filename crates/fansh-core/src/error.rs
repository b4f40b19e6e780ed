//! Core error types for fansh-core

use std::path::PathBuf;

use thiserror::Error;

use crate::state::RunState;

/// Errors raised while preparing a run
///
/// Nothing here is produced by an individual host; host failures only ever
/// show up in the tally.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid state transition attempted
    #[error("invalid run state transition from {from} to {to}")]
    InvalidTransition {
        /// Current state
        from: RunState,
        /// Attempted target state
        to: RunState,
    },

    /// Parallelism of zero would never make progress
    #[error("parallelism must be at least 1")]
    InvalidParallelism,

    /// No command to send to the hosts
    #[error("no command given")]
    EmptyCommand,

    /// Configuration file could not be read
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed
    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl From<fansh_exec::ExecError> for CoreError {
    fn from(e: fansh_exec::ExecError) -> Self {
        CoreError::ConfigError(e.to_string())
    }
}
