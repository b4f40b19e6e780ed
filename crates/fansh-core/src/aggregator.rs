//! Tally of per-host outcomes

use fansh_exec::{ConsoleSink, ExecutionResult};
use tokio::sync::mpsc;
use tracing::debug;

/// Final ok/failed counts of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub ok: usize,
    pub failed: usize,
}

impl Tally {
    /// Count one result
    pub fn record(&mut self, result: &ExecutionResult) {
        if result.is_success() {
            self.ok += 1;
        } else {
            self.failed += 1;
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.ok + self.failed
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.failed > 0
    }

    /// `total hosts: <n> (<ok>/<failed>)`, counts painted with the sink colors
    #[must_use]
    pub fn summary(&self, ok: &ConsoleSink, failed: &ConsoleSink) -> String {
        format!(
            "total hosts: {} ({}/{})",
            self.total(),
            ok.paint(&self.ok.to_string()),
            failed.paint(&self.failed.to_string()),
        )
    }
}

/// Consume every result until the channel closes
///
/// Returns only after all senders are gone, so the tally is final.
pub async fn drain(mut results: mpsc::Receiver<ExecutionResult>) -> Tally {
    let mut tally = Tally::default();
    while let Some(result) = results.recv().await {
        debug!(
            host = %result.hostname,
            success = result.is_success(),
            duration = ?result.duration,
            "host finished"
        );
        tally.record(&result);
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use fansh_exec::{Console, ExecError, MemoryWriter, StreamClass};

    #[tokio::test]
    async fn test_drain_counts_until_closed() {
        let (tx, rx) = mpsc::channel(4);

        tokio::spawn(async move {
            tx.send(ExecutionResult::success("a", Duration::ZERO))
                .await
                .unwrap();
            tx.send(ExecutionResult::failure(
                "b",
                ExecError::NonZeroExit { code: 1 },
                Duration::ZERO,
            ))
            .await
            .unwrap();
            tx.send(ExecutionResult::cancelled("c")).await.unwrap();
        });

        let tally = drain(rx).await;
        assert_eq!(tally, Tally { ok: 1, failed: 2 });
        assert_eq!(tally.total(), 3);
        assert!(tally.has_errors());
    }

    #[tokio::test]
    async fn test_drain_empty() {
        let (tx, rx) = mpsc::channel::<ExecutionResult>(1);
        drop(tx);

        let tally = drain(rx).await;
        assert_eq!(tally.total(), 0);
        assert!(!tally.has_errors());
    }

    #[test]
    fn test_summary_format() {
        let console = Console::new(MemoryWriter::new(), MemoryWriter::new(), false);
        let ok = console.sink(StreamClass::Normal, None);
        let failed = console.sink(StreamClass::Error, None);

        let tally = Tally { ok: 3, failed: 0 };
        assert_eq!(tally.summary(&ok, &failed), "total hosts: 3 (3/0)");

        let tally = Tally { ok: 0, failed: 1 };
        assert_eq!(tally.summary(&ok, &failed), "total hosts: 1 (0/1)");
    }
}
