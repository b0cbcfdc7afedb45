//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files and the
//! environment.
//!
//! Every section is optional; a missing file section falls back to built-in
//! defaults. Two environment variables are honoured:
//!
//! - `GAMEPAD_BRIDGE_CONFIG`: path of the TOML file to load
//! - `GAMEPAD_BRIDGE_STABLE_SLOTS`: number of leading slots run in stable mode
//!
//! Log verbosity comes from `RUST_LOG` (see `main`).

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "GAMEPAD_BRIDGE_CONFIG";

/// Environment variable overriding `device.stable_slots`
pub const STABLE_SLOTS_ENV: &str = "GAMEPAD_BRIDGE_STABLE_SLOTS";

/// How a slot materializes its virtual device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotMode {
    /// Device built from each connection's config record
    Dynamic,
    /// Default device built once, before the first connection
    Stable,
}

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub sockets: SocketConfig,

    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Producer socket configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SocketConfig {
    /// Path prefix; slot `i` uses `{base}{i}.sock`
    #[serde(default = "default_socket_base")]
    pub base: String,

    #[serde(default = "default_socket_count")]
    pub count: usize,

    /// Explicit paths, overriding `base`/`count`
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

/// Virtual device configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DeviceSettings {
    /// Number of leading slots run in stable mode
    #[serde(default)]
    pub stable_slots: usize,
}

/// Reconnect and reporting intervals
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_connect_retry_ms")]
    pub connect_retry_ms: u64,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_stats_interval_s")]
    pub stats_interval_s: u64,
}

/// Log sink configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    /// Write logs to this file instead of stdout
    #[serde(default)]
    pub file: Option<PathBuf>,
}

// Default value functions
fn default_socket_base() -> String { "/tmp/selkies_js".to_string() }
fn default_socket_count() -> usize { 4 }

fn default_connect_retry_ms() -> u64 { 1000 }
fn default_reconnect_delay_ms() -> u64 { 500 }
fn default_stats_interval_s() -> u64 { 30 }

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            base: default_socket_base(),
            count: default_socket_count(),
            paths: Vec::new(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_retry_ms: default_connect_retry_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            stats_interval_s: default_stats_interval_s(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gamepad_bridge::config::Config;
    ///
    /// let config = Config::load("/etc/gamepad-bridge.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration the way the binary does
    ///
    /// Reads the file named by `GAMEPAD_BRIDGE_CONFIG` (defaults when unset),
    /// then applies `GAMEPAD_BRIDGE_STABLE_SLOTS`.
    ///
    /// # Errors
    ///
    /// Returns error if the file is unreadable or invalid, or the override is
    /// not a number
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_overrides(std::env::var(STABLE_SLOTS_ENV).ok().as_deref())?;
        Ok(config)
    }

    /// Applies environment overrides and re-validates.
    fn apply_overrides(&mut self, stable_slots: Option<&str>) -> Result<()> {
        if let Some(raw) = stable_slots {
            self.device.stable_slots = raw.trim().parse().map_err(|_| {
                BridgeError::Config(toml::de::Error::custom(format!(
                    "{} must be a non-negative integer, got {:?}",
                    STABLE_SLOTS_ENV, raw
                )))
            })?;
        }
        self.validate()
    }

    /// Socket path of every slot, in slot order
    ///
    /// # Examples
    ///
    /// ```
    /// use gamepad_bridge::config::Config;
    /// use std::path::PathBuf;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.socket_paths()[1], PathBuf::from("/tmp/selkies_js1.sock"));
    /// ```
    pub fn socket_paths(&self) -> Vec<PathBuf> {
        if !self.sockets.paths.is_empty() {
            return self.sockets.paths.clone();
        }
        (0..self.sockets.count)
            .map(|i| PathBuf::from(format!("{}{}.sock", self.sockets.base, i)))
            .collect()
    }

    /// Mode of every slot: the first `stable_slots` are stable
    pub fn slot_modes(&self) -> Vec<SlotMode> {
        (0..self.socket_paths().len())
            .map(|i| {
                if i < self.device.stable_slots {
                    SlotMode::Stable
                } else {
                    SlotMode::Dynamic
                }
            })
            .collect()
    }

    /// Wait between dial attempts while the producer is absent
    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.timing.connect_retry_ms)
    }

    /// Wait after releasing an epoch before reconnecting
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.timing.reconnect_delay_ms)
    }

    /// Interval between stats log lines
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.timing.stats_interval_s)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        let paths = self.socket_paths();

        if paths.is_empty() {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "at least one socket slot must be configured",
            )));
        }

        if paths.iter().any(|path| path.as_os_str().is_empty()) {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "socket paths cannot be empty",
            )));
        }

        if self.sockets.paths.is_empty() && self.sockets.base.is_empty() {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "socket base cannot be empty",
            )));
        }

        if self.device.stable_slots > paths.len() {
            return Err(BridgeError::Config(toml::de::Error::custom(format!(
                "stable_slots ({}) exceeds the number of slots ({})",
                self.device.stable_slots,
                paths.len()
            ))));
        }

        for (name, value) in [
            ("connect_retry_ms", self.timing.connect_retry_ms),
            ("reconnect_delay_ms", self.timing.reconnect_delay_ms),
        ] {
            if value == 0 || value > 60000 {
                return Err(BridgeError::Config(toml::de::Error::custom(format!(
                    "{} must be between 1 and 60000",
                    name
                ))));
            }
        }

        if self.timing.stats_interval_s == 0 {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "stats_interval_s must be greater than 0",
            )));
        }

        Ok(())
    }
}
