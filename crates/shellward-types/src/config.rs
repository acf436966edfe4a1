//! Daemon configuration.
//!
//! [`DaemonConfig`] is explicit startup configuration passed into the daemon
//! constructor. It can be loaded from a TOML file and overridden by CLI
//! flags; the core never reads process-wide state on its own.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ShellwardError;

/// Prefix marking a typed line as natural language rather than a literal
/// command.
pub const DEFAULT_DIRECTIVE_PREFIX: &str = "/e ";

/// Top-level configuration for the Shellward daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Path of the unix domain socket the daemon listens on.
    #[serde(default = "DaemonConfig::default_socket_path")]
    pub socket_path: PathBuf,
    /// Interaction records retained per session; oldest evicted first.
    #[serde(default = "defaults::history_capacity")]
    pub history_capacity: usize,
    /// Maximum replan rounds per pending candidate before the user is told
    /// to intervene manually.
    #[serde(default = "defaults::replan_bound")]
    pub replan_bound: u32,
    /// Seconds allowed per translator/fixer call before the stage aborts.
    #[serde(default = "defaults::collaborator_timeout_secs")]
    pub collaborator_timeout_secs: u64,
    /// Requests allowed to queue behind an in-flight evaluation for the same
    /// session; beyond this the daemon answers "busy" immediately.
    #[serde(default = "defaults::queue_depth")]
    pub queue_depth: usize,
    /// Prefix that marks a preexec line as a natural-language directive.
    #[serde(default = "defaults::directive_prefix")]
    pub directive_prefix: String,
    /// History lines included in the context snapshot handed to collaborators.
    #[serde(default = "defaults::snapshot_lines")]
    pub snapshot_lines: usize,
}

mod defaults {
    pub fn history_capacity() -> usize {
        100
    }
    pub fn replan_bound() -> u32 {
        3
    }
    pub fn collaborator_timeout_secs() -> u64 {
        30
    }
    pub fn queue_depth() -> usize {
        4
    }
    pub fn directive_prefix() -> String {
        super::DEFAULT_DIRECTIVE_PREFIX.to_string()
    }
    pub fn snapshot_lines() -> usize {
        10
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: Self::default_socket_path(),
            history_capacity: defaults::history_capacity(),
            replan_bound: defaults::replan_bound(),
            collaborator_timeout_secs: defaults::collaborator_timeout_secs(),
            queue_depth: defaults::queue_depth(),
            directive_prefix: defaults::directive_prefix(),
            snapshot_lines: defaults::snapshot_lines(),
        }
    }
}

impl DaemonConfig {
    /// Per-user socket path under `/tmp`, matching the adapter's default.
    pub fn default_socket_path() -> PathBuf {
        let user = std::env::var("USER").unwrap_or_else(|_| "unknown".into());
        PathBuf::from(format!("/tmp/shellward-{user}.sock"))
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ShellwardError> {
        toml::from_str(content).map_err(|e| ShellwardError::Config(e.to_string()))
    }

    /// The collaborator timeout as a [`Duration`].
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_secs(self.collaborator_timeout_secs)
    }

    /// Reject values that would wedge the daemon.
    pub fn validate(&self) -> Result<(), ShellwardError> {
        if self.history_capacity == 0 {
            return Err(ShellwardError::Config(
                "history_capacity must be at least 1".into(),
            ));
        }
        if self.collaborator_timeout_secs == 0 {
            return Err(ShellwardError::Config(
                "collaborator_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
