//! Error types for fansh-exec

use thiserror::Error;

/// Reasons a single host execution can fail
///
/// Every variant is recorded as a failed host in the run tally. None of them
/// abort the run as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// The remote-shell process could not be started
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// The remote-shell process exited with a non-zero status
    #[error("exit status {code}")]
    NonZeroExit {
        /// Observed exit code
        code: i32,
    },

    /// The remote-shell process was terminated by a signal
    #[error("terminated by signal")]
    KilledBySignal,

    /// The run was cancelled while this host was in flight
    #[error("interrupted")]
    Cancelled,

    /// I/O error while waiting on the process
    #[error("I/O error: {0}")]
    IoError(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::IoError(e.to_string())
    }
}
