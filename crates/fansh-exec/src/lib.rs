//! fansh-exec: Per-host remote command execution
//!
//! Builds the remote-shell argv for a host, runs it as its own process group,
//! streams its output through the shared console and classifies the exit.

pub mod console;
pub mod error;
pub mod group;
pub mod options;
pub mod result;
pub mod ssh;
pub mod traits;

pub use console::{Console, ConsoleSink, MemoryWriter, StreamClass, parse_color};
pub use error::ExecError;
pub use options::{CommandTemplate, OptionSet, PREAMBLE, SshOptions, build_argv, ssh_option};
pub use result::{ExecutionResult, Outcome};
pub use ssh::SshExecutor;
pub use traits::HostExecutor;
