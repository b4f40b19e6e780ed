//! Remote-shell option set and argv construction
//!
//! The option set is built once before a run starts and shared read-only by
//! every executor. The argv for one host is always
//! `<options...> <hostname> <preamble...> <command...>`.

use std::fmt;
use std::sync::Arc;

/// Shell fragment that opportunistically sources proxy variables on the
/// remote host before running the command
pub const PREAMBLE: [&str; 4] = [".", "/etc/profile.d/proxy.sh", "2>/dev/null", ";"];

/// Value of an `-o Name=value` option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(true) => f.write_str("yes"),
            OptionValue::Bool(false) => f.write_str("no"),
            OptionValue::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<u32> for OptionValue {
    fn from(v: u32) -> Self {
        OptionValue::Int(i64::from(v))
    }
}

/// Render a single `-o Name=value` pair
pub fn ssh_option(name: &str, value: impl Into<OptionValue>) -> [String; 2] {
    ["-o".to_string(), format!("{name}={}", value.into())]
}

/// Immutable, shareable list of remote-shell flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSet(Arc<[String]>);

impl OptionSet {
    /// Wrap an already-built option list
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    /// Options as a slice
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Immutable command and arguments sent to every host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate(Arc<[String]>);

impl CommandTemplate {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builder for the remote-shell option set
///
/// Options added through the builder keep their call order. `build` then
/// appends `-q` (unless verbose), `PasswordAuthentication=no` and
/// `BatchMode=yes`, so the remote shell never prompts.
#[derive(Debug, Clone, Default)]
pub struct SshOptions {
    args: Vec<String>,
    verbose: bool,
}

impl SshOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Login name; ignored when empty
    #[must_use]
    pub fn login(mut self, login: &str) -> Self {
        if !login.is_empty() {
            self.args.push("-l".to_string());
            self.args.push(login.to_string());
        }
        self
    }

    /// Number of connection attempts the remote shell makes
    #[must_use]
    pub fn connection_attempts(mut self, n: u32) -> Self {
        self.args.extend(ssh_option("ConnectionAttempts", n));
        self
    }

    #[must_use]
    pub fn strict_host_key_checking(mut self, strict: bool) -> Self {
        self.args.extend(ssh_option("StrictHostKeyChecking", strict));
        self
    }

    /// Turn off quiet mode
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    #[must_use]
    pub fn build(self) -> OptionSet {
        let mut args = self.args;
        if !self.verbose {
            args.push("-q".to_string());
        }
        args.extend(ssh_option("PasswordAuthentication", false));
        args.extend(ssh_option("BatchMode", true));
        OptionSet::from_args(args)
    }
}

/// Build the full argument vector for one host
#[must_use]
pub fn build_argv(options: &OptionSet, hostname: &str, command: &CommandTemplate) -> Vec<String> {
    let mut argv =
        Vec::with_capacity(options.as_slice().len() + 1 + PREAMBLE.len() + command.as_slice().len());
    argv.extend_from_slice(options.as_slice());
    argv.push(hostname.to_string());
    argv.extend(PREAMBLE.iter().map(|s| (*s).to_string()));
    argv.extend_from_slice(command.as_slice());
    argv
}
