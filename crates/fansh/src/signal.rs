//! Interrupt handling: the first SIGINT/SIGTERM cancels the run

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Exit status used when a second interrupt aborts the run
const ABORT_EXIT_CODE: i32 = 130;

/// Cancel `cancel` on the first shutdown signal
///
/// A second signal exits immediately without waiting for the drain.
pub fn cancel_on_shutdown(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested, interrupting running hosts");
        cancel.cancel();

        shutdown_signal().await;
        warn!("second shutdown request, aborting");
        std::process::exit(ABORT_EXIT_CODE);
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}
