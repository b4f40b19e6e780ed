//! `RunCoordinator`: wires source, pool and aggregator into one run
//!
//! One feeder task moves hostnames from the source into a bounded queue,
//! `parallelism` workers drain it, and the aggregator consumes results
//! until the last worker is gone. A run-wide cancellation token reaches the
//! feeder and every in-flight execution; the run still drains to `Done`.

use std::sync::Arc;

use fansh_exec::HostExecutor;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::{self, Tally};
use crate::error::CoreError;
use crate::pool::WorkerPool;
use crate::source::HostSource;
use crate::state::RunState;

/// Hostnames buffered between the feeder and the workers
const HOST_QUEUE_CAPACITY: usize = 1;

/// Drives a single run from input to tally
pub struct RunCoordinator {
    pool: WorkerPool,
    state: Arc<watch::Sender<RunState>>,
}

impl std::fmt::Debug for RunCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunCoordinator")
            .field("pool", &self.pool)
            .field("state", &self.state())
            .finish()
    }
}

impl RunCoordinator {
    /// Create a coordinator in the `Idle` state
    ///
    /// # Errors
    /// Returns `CoreError::InvalidParallelism` if `parallelism` is zero
    pub fn new(executor: Arc<dyn HostExecutor>, parallelism: usize) -> Result<Self, CoreError> {
        if parallelism == 0 {
            return Err(CoreError::InvalidParallelism);
        }
        let (state, _) = watch::channel(RunState::Idle);
        Ok(Self {
            pool: WorkerPool::new(executor, parallelism),
            state: Arc::new(state),
        })
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Watch state transitions
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// Run the command against every host from `source`
    ///
    /// Returns once every started host has produced its result. Host
    /// failures are only reflected in the returned tally.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidTransition` if this coordinator already ran
    pub async fn run<R>(
        &self,
        source: HostSource<R>,
        cancel: CancellationToken,
    ) -> Result<Tally, CoreError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        transition(&self.state, RunState::Running)?;
        info!(parallelism = self.pool.parallelism(), "run starting");

        let (host_tx, host_rx) = mpsc::channel(HOST_QUEUE_CAPACITY);
        let (result_tx, result_rx) = mpsc::channel(self.pool.parallelism());

        let mut workers = self.pool.spawn(host_rx, result_tx, cancel.clone());
        let feeder = tokio::spawn(feed(
            source,
            host_tx,
            cancel.clone(),
            Arc::clone(&self.state),
        ));

        let tally = aggregator::drain(result_rx).await;

        if let Err(e) = feeder.await {
            error!(error = %e, "host feeder panicked");
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker panicked");
            }
        }

        if self.state() == RunState::Running {
            transition(&self.state, RunState::Draining)?;
        }
        transition(&self.state, RunState::Done)?;

        info!(
            total = tally.total(),
            ok = tally.ok,
            failed = tally.failed,
            cancelled = cancel.is_cancelled(),
            "run finished"
        );

        Ok(tally)
    }
}

/// Push hostnames into the queue until input ends or the run is cancelled
///
/// Dropping `hosts` closes the queue, which lets idle workers exit.
async fn feed<R>(
    mut source: HostSource<R>,
    hosts: mpsc::Sender<String>,
    cancel: CancellationToken,
    state: Arc<watch::Sender<RunState>>,
) where
    R: AsyncRead + Unpin,
{
    let mut fed = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = source.next_host() => next,
        };
        let Some(hostname) = next else {
            break;
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            sent = hosts.send(hostname) => {
                if sent.is_err() {
                    break;
                }
                fed += 1;
            }
        }
    }

    if cancel.is_cancelled() {
        warn!(fed, "run cancelled, no further hosts will start");
    } else {
        debug!(fed, "input exhausted");
    }

    if let Err(e) = transition(&state, RunState::Draining) {
        error!(error = %e, "feeder could not enter draining");
    }
    drop(hosts);
}

/// Move to `next` if the transition is legal
fn transition(state: &watch::Sender<RunState>, next: RunState) -> Result<(), CoreError> {
    let mut rejected = None;
    state.send_if_modified(|current| {
        if current.can_transition_to(next) {
            info!(from = %current, to = %next, "run state transition");
            *current = next;
            true
        } else {
            rejected = Some(CoreError::InvalidTransition {
                from: *current,
                to: next,
            });
            false
        }
    });
    rejected.map_or(Ok(()), Err)
}
