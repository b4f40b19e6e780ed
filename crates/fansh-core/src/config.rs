//! Run configuration and the optional defaults file
//!
//! Values come from built-in defaults, then `fansh.toml` if one is found,
//! then command-line flags applied by the binary.

use std::path::{Path, PathBuf};

use fansh_exec::console::Color;
use fansh_exec::{OptionSet, SshOptions, parse_color};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "FANSH_CONFIG";

/// Top-level configuration for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Hosts to run in parallel
    pub parallelism: usize,
    /// Remote-shell program
    pub program: String,
    /// Console coloring
    pub color: ColorConfig,
    /// Remote-shell connection options
    pub ssh: SshConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallelism: 50,
            program: fansh_exec::ssh::DEFAULT_PROGRAM.to_string(),
            color: ColorConfig::default(),
            ssh: SshConfig::default(),
        }
    }
}

/// Console coloring settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Color host labels and summary counts
    pub enabled: bool,
    /// Color for stdout labels and the ok count
    pub ok: String,
    /// Color for stderr labels and the failed count
    pub failed: String,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ok: "#A8CC8C".to_string(),
            failed: "#E88388".to_string(),
        }
    }
}

/// Remote-shell connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Login name, empty for the remote shell's default
    pub login: String,
    /// Connection attempts per host
    pub connection_attempts: u32,
    /// Strict host key checking
    pub strict_host_key_checking: bool,
    /// Turn off quiet mode
    pub verbose: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            login: String::new(),
            connection_attempts: 1,
            strict_host_key_checking: false,
            verbose: false,
        }
    }
}

impl RunConfig {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| CoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `$FANSH_CONFIG` or the default paths, else use defaults
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be loaded
    pub fn load_default() -> Result<Self, CoreError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        for path in default_paths() {
            if path.exists() {
                debug!(path = %path.display(), "loading config");
                return Self::load(&path);
            }
        }

        debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Check values that would make the run meaningless
    ///
    /// # Errors
    /// Returns error on zero parallelism, an empty program or a bad color
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.parallelism == 0 {
            return Err(CoreError::InvalidParallelism);
        }
        if self.program.trim().is_empty() {
            return Err(CoreError::ConfigError("remote-shell program is empty".into()));
        }
        self.ok_color()?;
        self.failed_color()?;
        Ok(())
    }

    /// Build the option set shared by every host
    #[must_use]
    pub fn ssh_options(&self) -> OptionSet {
        SshOptions::new()
            .login(&self.ssh.login)
            .verbose(self.ssh.verbose)
            .connection_attempts(self.ssh.connection_attempts)
            .strict_host_key_checking(self.ssh.strict_host_key_checking)
            .build()
    }

    /// Parsed ok color
    ///
    /// # Errors
    /// Returns error if the color specification is invalid
    pub fn ok_color(&self) -> Result<Option<Color>, CoreError> {
        Ok(parse_color(&self.color.ok)?)
    }

    /// Parsed failed color
    ///
    /// # Errors
    /// Returns error if the color specification is invalid
    pub fn failed_color(&self) -> Result<Option<Color>, CoreError> {
        Ok(parse_color(&self.color.failed)?)
    }
}

fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("fansh.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("fansh/fansh.toml"));
    }
    paths
}
