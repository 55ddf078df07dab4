//! Configuration loading and server address resolution
//!
//! Settings sources, highest priority first:
//! 1. Command-line arguments
//! 2. Environment variables (`MPD_HOST`, `MPD_PORT`)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: the monitor logs a warning and
//! continues with defaults. A present but malformed file is rejected.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the MPD host (or Unix socket path)
pub const ENV_MPD_HOST: &str = "MPD_HOST";
/// Environment variable naming the MPD port
pub const ENV_MPD_PORT: &str = "MPD_PORT";

/// Default MPD address
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:6600";
/// Default MPD port when only a host is given
pub const DEFAULT_PORT: u16 = 6600;

/// How a paused snapshot reports its track identity
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PausedIdentity {
    /// Query the loaded track's metadata, same as when playing
    #[default]
    Resolve,
    /// Report the fixed "paused" identity without querying the track
    Placeholder,
}

/// What the liveness keeper does when a ping fails
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LivenessMode {
    /// Retry with exponential backoff, fail only once retries are exhausted
    #[default]
    Backoff,
    /// Fail on the first unsuccessful ping
    Abort,
}

/// Top-level TOML configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
}

/// `[server]` section
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` or a Unix socket path
    pub address: Option<String>,
}

/// `[monitor]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between liveness pings
    pub keepalive_secs: u64,
    pub paused_identity: PausedIdentity,
    pub liveness: LivenessMode,
    /// Retries before a failing ping becomes fatal (backoff mode only)
    pub liveness_retries: u32,
    /// First backoff delay in milliseconds, doubled per retry
    pub liveness_backoff_ms: u64,
    /// EventBus buffer size
    pub event_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: 30,
            paused_identity: PausedIdentity::default(),
            liveness: LivenessMode::default(),
            liveness_retries: 3,
            liveness_backoff_ms: 1000,
            event_capacity: 100,
        }
    }
}

impl MonitorConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn liveness_backoff(&self) -> Duration {
        Duration::from_millis(self.liveness_backoff_ms)
    }

    /// Reject values the monitor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.keepalive_secs == 0 {
            return Err(Error::Config("keepalive_secs must be at least 1".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.monitor.validate()?;
        Ok(config)
    }

    /// Load configuration from a file that must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from an explicit path or the platform default location
    ///
    /// Falls back to defaults (with a warning) when no file exists.
    /// An explicitly requested file that is missing is an error.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            Some(path) => {
                warn!(
                    "No config file at {}, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Platform config file location (`<config_dir>/halfplay/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("halfplay").join("config.toml"))
}

/// Resolve the MPD address by priority: CLI → environment → TOML → default
pub fn resolve_address(cli_arg: Option<&str>, config: &TomlConfig) -> String {
    // Priority 1: Command-line argument
    if let Some(address) = cli_arg {
        return address.to_string();
    }

    // Priority 2: MPD_HOST / MPD_PORT
    if let Some(address) = address_from_env() {
        return address;
    }

    // Priority 3: TOML config file
    if let Some(address) = &config.server.address {
        return address.clone();
    }

    // Priority 4: compiled default
    DEFAULT_ADDRESS.to_string()
}

fn address_from_env() -> Option<String> {
    let host = std::env::var(ENV_MPD_HOST).ok().filter(|h| !h.is_empty());
    let port = std::env::var(ENV_MPD_PORT)
        .ok()
        .and_then(|p| p.parse::<u16>().ok());

    match (host, port) {
        // Socket paths carry no port
        (Some(host), _) if host.contains('/') => Some(host),
        (Some(host), Some(port)) => Some(format!("{}:{}", host, port)),
        (Some(host), None) => Some(format!("{}:{}", host, DEFAULT_PORT)),
        (None, Some(port)) => Some(format!("127.0.0.1:{}", port)),
        (None, None) => None,
    }
}
