//! Result types for host execution

use std::time::Duration;

use crate::error::ExecError;

/// How a single host execution ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Remote shell exited with status 0
    Success,
    /// Anything else: start failure, non-zero exit, signal, cancellation
    Failure(ExecError),
}

/// Result of running the command template against one host
///
/// Produced exactly once per dequeued hostname and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Host the command was dispatched to
    pub hostname: String,
    /// Classified outcome
    pub outcome: Outcome,
    /// Time taken from spawn to reap
    pub duration: Duration,
}

impl ExecutionResult {
    /// Create a successful result
    pub fn success(hostname: impl Into<String>, duration: Duration) -> Self {
        Self {
            hostname: hostname.into(),
            outcome: Outcome::Success,
            duration,
        }
    }

    /// Create a failed result
    pub fn failure(hostname: impl Into<String>, error: ExecError, duration: Duration) -> Self {
        Self {
            hostname: hostname.into(),
            outcome: Outcome::Failure(error),
            duration,
        }
    }

    /// Result for a host that was dequeued after the run was cancelled
    pub fn cancelled(hostname: impl Into<String>) -> Self {
        Self::failure(hostname, ExecError::Cancelled, Duration::ZERO)
    }

    /// Check if the host succeeded (exit code 0)
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success)
    }

    /// Failure reason, if any
    #[must_use]
    pub fn error(&self) -> Option<&ExecError> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Failure(e) => Some(e),
        }
    }
}
