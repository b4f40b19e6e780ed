//! Fixed-size pool of host workers
//!
//! Workers share one hostname receiver and one result sender. A worker
//! pulls the next host only when it is free, so at most `parallelism`
//! executions are ever in flight.

use std::sync::Arc;

use fansh_exec::{ExecutionResult, HostExecutor};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Pool of `parallelism` workers driving one executor
#[derive(Clone)]
pub struct WorkerPool {
    parallelism: usize,
    executor: Arc<dyn HostExecutor>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("parallelism", &self.parallelism)
            .field("executor", &self.executor.executor_type())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(executor: Arc<dyn HostExecutor>, parallelism: usize) -> Self {
        Self {
            parallelism,
            executor,
        }
    }

    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Start every worker
    ///
    /// All `parallelism` workers start regardless of how many hosts will
    /// arrive. Each exits once `hosts` is closed and empty; the result
    /// channel closes when the last worker drops its sender.
    pub fn spawn(
        &self,
        hosts: mpsc::Receiver<String>,
        results: mpsc::Sender<ExecutionResult>,
        cancel: CancellationToken,
    ) -> JoinSet<()> {
        let hosts = Arc::new(Mutex::new(hosts));
        let mut workers = JoinSet::new();

        for id in 0..self.parallelism {
            workers.spawn(worker(
                id,
                Arc::clone(&hosts),
                results.clone(),
                Arc::clone(&self.executor),
                cancel.clone(),
            ));
        }

        workers
    }
}

async fn worker(
    id: usize,
    hosts: Arc<Mutex<mpsc::Receiver<String>>>,
    results: mpsc::Sender<ExecutionResult>,
    executor: Arc<dyn HostExecutor>,
    cancel: CancellationToken,
) {
    loop {
        let next = hosts.lock().await.recv().await;
        let Some(hostname) = next else {
            break;
        };

        // queued before cancellation but not started: never spawn it
        let result = if cancel.is_cancelled() {
            ExecutionResult::cancelled(hostname)
        } else {
            executor.run(&hostname, &cancel).await
        };

        if results.send(result).await.is_err() {
            warn!(worker = id, "result channel closed, worker stopping");
            break;
        }
    }

    debug!(worker = id, "worker finished");
}
