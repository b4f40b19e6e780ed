//! Run coordinator state machine types

use std::fmt;

/// Lifecycle of a single run
///
/// `Idle → Running → Draining → Done`. Cancellation never skips a state:
/// a cancelled run still drains before it is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Draining,
    Done,
}

impl RunState {
    /// Check whether moving to `next` is a legal transition
    #[must_use]
    pub fn can_transition_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::Idle, RunState::Running)
                | (RunState::Running, RunState::Draining)
                | (RunState::Draining, RunState::Done)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == RunState::Done
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Draining => "draining",
            RunState::Done => "done",
        };
        f.write_str(s)
    }
}
