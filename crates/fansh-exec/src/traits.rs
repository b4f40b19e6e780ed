//! Host executor trait

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::result::ExecutionResult;

/// Runs the command template against a single host
///
/// Implementations never return an error: every failure mode is folded into
/// the [`ExecutionResult`] so a worker slot is always released.
#[async_trait]
pub trait HostExecutor: Send + Sync {
    /// Run the command for `hostname`, honouring the run-wide `cancel` token
    async fn run(&self, hostname: &str, cancel: &CancellationToken) -> ExecutionResult;

    /// Short name of the executor kind, used in logs
    fn executor_type(&self) -> &'static str;
}
