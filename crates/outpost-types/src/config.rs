//! Configuration for an Outpost agent instance.
//!
//! [`OutpostConfig`] is the top-level configuration loaded from
//! `outpost.toml`. It is resolved fully at startup and handed to the
//! runtime at construction time; nothing re-reads configuration during the
//! run loop (reload requires restart).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::OutpostError;

/// Default configuration filename.
pub const CONFIG_FILENAME: &str = "outpost.toml";

/// Agent-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Human-readable name for this agent instance.
    pub name: String,
    /// Seconds between pending-command polls while connected.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Whether to keep running (accepting local commands, re-probing) when
    /// the remote boundary is unreachable. When false, losing connectivity
    /// halts the agent.
    #[serde(default)]
    pub offline_mode: bool,
}

fn default_poll_interval() -> u64 {
    1
}

/// Remote boundary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Base URL of the remote command endpoint.
    pub endpoint: String,
    /// Optional bearer credential sent with every request.
    #[serde(default)]
    pub api_key: Option<String>,
    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Per-request timeout in seconds (independent of the command timeout).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

/// Security policy settings. Loaded once; read-only for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Blocked patterns, matched case-insensitively as substrings of a
    /// command's realized operation string. Empty means "use the built-in
    /// default set".
    #[serde(default)]
    pub blocked_patterns: Vec<String>,
    /// When set, commands that pass the pattern check still require
    /// out-of-band approval before executing.
    #[serde(default)]
    pub require_confirmation: bool,
    /// Seconds to wait for confirmation before auto-denying.
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    /// Per-command execution time budget in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_confirmation_timeout() -> u64 {
    30
}

fn default_command_timeout() -> u64 {
    300
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            blocked_patterns: Vec::new(),
            require_confirmation: false,
            confirmation_timeout_secs: default_confirmation_timeout(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl SecurityConfig {
    /// The per-command execution budget as a `Duration`.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// The confirmation wait budget as a `Duration`.
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

/// Browser session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Explicit path to the Chrome/Chromium binary. When absent, well-known
    /// install locations are probed.
    #[serde(default)]
    pub binary: Option<PathBuf>,
    /// Run the browser headless.
    #[serde(default)]
    pub headless: bool,
    /// DevTools debugging port the launched browser listens on.
    #[serde(default = "default_devtools_port")]
    pub devtools_port: u16,
    /// Optional profile directory handed to the browser.
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
}

fn default_devtools_port() -> u16 {
    9222
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            binary: None,
            headless: false,
            devtools_port: default_devtools_port(),
            user_data_dir: None,
        }
    }
}

/// Transport poller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Connectivity probe attempts before giving up on initial connect.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// Consecutive fetch/report failures while degraded before going offline.
    #[serde(default = "default_degraded_threshold")]
    pub degraded_threshold: u32,
    /// Initial retry backoff in milliseconds.
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    /// Maximum retry backoff in seconds.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
    /// Seconds between connectivity re-probes while offline.
    #[serde(default = "default_offline_probe_secs")]
    pub offline_probe_secs: u64,
}

fn default_connect_attempts() -> u32 {
    3
}

fn default_degraded_threshold() -> u32 {
    5
}

fn default_backoff_initial_ms() -> u64 {
    500
}

fn default_backoff_max_secs() -> u64 {
    60
}

fn default_offline_probe_secs() -> u64 {
    30
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_attempts: default_connect_attempts(),
            degraded_threshold: default_degraded_threshold(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_secs: default_backoff_max_secs(),
            offline_probe_secs: default_offline_probe_secs(),
        }
    }
}

/// Top-level configuration for an Outpost agent instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutpostConfig {
    pub agent: AgentConfig,
    pub cloud: CloudConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl OutpostConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, OutpostError> {
        toml::from_str(content).map_err(|e| OutpostError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, OutpostError> {
        toml::to_string_pretty(self).map_err(|e| OutpostError::Config(e.to_string()))
    }

    /// Load a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self, OutpostError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OutpostError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Create a default configuration for a named agent. The endpoint is a
    /// placeholder the operator must fill in before running.
    pub fn default_for(name: &str) -> Self {
        Self {
            agent: AgentConfig {
                name: name.to_string(),
                poll_interval_secs: default_poll_interval(),
                offline_mode: false,
            },
            cloud: CloudConfig {
                endpoint: "http://localhost:8000".to_string(),
                api_key: None,
                connect_timeout_secs: default_connect_timeout(),
                request_timeout_secs: default_request_timeout(),
            },
            security: SecurityConfig::default(),
            browser: BrowserConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}
