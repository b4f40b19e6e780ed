//! Command-line flags and their merge onto the run configuration

use std::path::PathBuf;

use clap::Parser;
use fansh_core::{CoreError, RunConfig};

/// Run a command on many hosts in parallel over ssh
///
/// Hostnames are read from standard input, separated by whitespace.
#[derive(Parser, Debug)]
#[command(name = "fansh", version, about)]
pub struct Cli {
    /// Hosts to run in parallel
    #[arg(short, long)]
    pub fanout: Option<usize>,

    /// Disable colors
    #[arg(short = 'n', long)]
    pub no_color: bool,

    /// Color to use for stdout
    #[arg(long, value_name = "COLOR")]
    pub ok_color: Option<String>,

    /// Color to use for stderr
    #[arg(long = "fail-color", value_name = "COLOR")]
    pub failed_color: Option<String>,

    /// Verbose output (turns off ssh quiet mode)
    #[arg(short, long, help_heading = "SSH Options")]
    pub verbose: bool,

    /// Strict host key checking
    #[arg(short, long, help_heading = "SSH Options")]
    pub strict: bool,

    /// Number of ssh connection attempts
    #[arg(short, long, value_name = "N", help_heading = "SSH Options")]
    pub retries: Option<u32>,

    /// Login name to use for ssh
    #[arg(short, long, help_heading = "SSH Options")]
    pub login: Option<String>,

    /// Remote-shell program to invoke
    #[arg(long, value_name = "PROGRAM", help_heading = "SSH Options")]
    pub ssh_program: Option<String>,

    /// Config file (defaults to $FANSH_CONFIG, ./fansh.toml, then the user config dir)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(long)]
    pub debug: bool,

    /// Command and arguments to run on every host
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    pub command: Vec<String>,
}

impl Cli {
    /// Load the config file and apply flags on top of it
    ///
    /// # Errors
    /// Returns error if the config file cannot be loaded or the result is invalid
    pub fn resolve_config(&self) -> Result<RunConfig, CoreError> {
        let base = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::load_default()?,
        };
        let config = self.apply(base);
        config.validate()?;
        Ok(config)
    }

    /// Flags override file values; boolean switches only turn things on
    #[must_use]
    pub fn apply(&self, mut config: RunConfig) -> RunConfig {
        if let Some(fanout) = self.fanout {
            config.parallelism = fanout;
        }
        if self.no_color {
            config.color.enabled = false;
        }
        if let Some(color) = &self.ok_color {
            config.color.ok.clone_from(color);
        }
        if let Some(color) = &self.failed_color {
            config.color.failed.clone_from(color);
        }
        if self.verbose {
            config.ssh.verbose = true;
        }
        if self.strict {
            config.ssh.strict_host_key_checking = true;
        }
        if let Some(retries) = self.retries {
            config.ssh.connection_attempts = retries;
        }
        if let Some(login) = &self.login {
            config.ssh.login.clone_from(login);
        }
        if let Some(program) = &self.ssh_program {
            config.program.clone_from(program);
        }
        config
    }
}
