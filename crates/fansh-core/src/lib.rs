//! fansh-core: Concurrent fan-out engine
//!
//! Feeds hostnames from an input stream to a bounded pool of workers, each
//! running the remote command for one host at a time, and tallies the
//! outcomes once every worker has drained.

pub mod aggregator;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod pool;
pub mod source;
pub mod state;

pub use aggregator::{Tally, drain};
pub use config::{ColorConfig, RunConfig, SshConfig};
pub use coordinator::RunCoordinator;
pub use error::CoreError;
pub use pool::WorkerPool;
pub use source::HostSource;
pub use state::RunState;
