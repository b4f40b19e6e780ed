//! fansh
//!
//! Runs one command on every host read from stdin, at most `--fanout` at a
//! time, prefixing each output line with the host it came from.

mod cli;
mod factory;
mod signal;

use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use eyre::WrapErr;
use fansh_core::{HostSource, RunCoordinator};
use fansh_exec::Console;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::Cli;

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let config = cli
        .resolve_config()
        .wrap_err("failed to load configuration")?;
    debug!(?config, "resolved configuration");

    let console = Console::stdio(config.color.enabled);
    let parts = factory::build(&config, cli.command, &console)
        .wrap_err("failed to prepare run")?;

    let coordinator = RunCoordinator::new(Arc::new(parts.executor), config.parallelism)?;

    let cancel = CancellationToken::new();
    let listener = signal::cancel_on_shutdown(cancel.clone());

    let tally = coordinator.run(HostSource::stdin(), cancel).await?;
    listener.abort();

    parts.err.emit_plain("");
    parts.err.emit_plain(&tally.summary(&parts.out, &parts.err));

    Ok(i32::from(tally.has_errors()))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.debug);

    let code = run(cli).await?;

    // The stdin reader may still be parked on a blocking read; leave
    // without waiting for the runtime to shut it down.
    std::process::exit(code);
}
