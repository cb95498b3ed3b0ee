#![deny(unsafe_code)]

//! Configuration loading and validation for the virtual dock daemon.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! single configuration structure shared by the dispatcher, the daemon and
//! the EC probe. It is built once (defaults, then an optional file, then
//! command-line overrides) and is read-only afterwards.

/// Vendor/product id parsing (decimal, octal and hex).
pub mod ids;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use ids::parse_id;

/// Size of the embedded-controller memory block read by the probe.
pub const EC_MEMORY_SIZE: usize = 256;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid id '{value}': {reason}")]
    InvalidId { value: String, reason: String },
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daemon socket configuration.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Virtual input device identity.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Embedded-controller probe configuration.
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for the daemon socket and its accept loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Path of the Unix-domain socket the daemon listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// How long a connected client may stay silent before it is dropped.
    #[serde(default = "default_client_timeout_ms")]
    pub client_timeout_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            client_timeout_ms: default_client_timeout_ms(),
        }
    }
}

impl DaemonConfig {
    /// The client receive timeout as a [`Duration`](std::time::Duration).
    pub fn client_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.client_timeout_ms)
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/vdockd.socket")
}

fn default_client_timeout_ms() -> u64 {
    250
}

/// Identity of the emulated dock switch device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Display name of the virtual input device.
    #[serde(default = "default_device_name")]
    pub name: String,

    /// USB-style vendor id.
    #[serde(default = "default_device_id")]
    pub vendor: u16,

    /// USB-style product id.
    #[serde(default = "default_device_id")]
    pub product: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            vendor: default_device_id(),
            product: default_device_id(),
        }
    }
}

fn default_device_name() -> String {
    "Virtual Dock".to_string()
}

fn default_device_id() -> u16 {
    0x1337
}

/// Where and how the probe reads the dock bit from EC memory.
///
/// The defaults match a ThinkPad W520; other models keep the dock state
/// elsewhere (or not at all).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// EC memory dump exposed by the `ec_sys` kernel module.
    #[serde(default = "default_ec_path")]
    pub ec_path: PathBuf,

    /// Byte offset of the dock status within the EC block.
    #[serde(default = "default_docked_offset")]
    pub docked_offset: usize,

    /// Bit within that byte that is set while docked.
    #[serde(default = "default_docked_bit")]
    pub docked_bit: u8,

    /// Program the probe replaces itself with, given `DOCK` or `UNDOCK`.
    #[serde(default = "default_dispatcher")]
    pub dispatcher: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ec_path: default_ec_path(),
            docked_offset: default_docked_offset(),
            docked_bit: default_docked_bit(),
            dispatcher: default_dispatcher(),
        }
    }
}

fn default_ec_path() -> PathBuf {
    PathBuf::from("/sys/kernel/debug/ec/ec0/io")
}

fn default_docked_offset() -> usize {
    0x48
}

fn default_docked_bit() -> u8 {
    5
}

fn default_dispatcher() -> String {
    "vdockd".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading configuration");
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daemon.socket_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "daemon.socket_path must not be empty".to_string(),
            ));
        }
        if self.daemon.client_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "daemon.client_timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.device.name.is_empty() {
            return Err(ConfigError::Validation(
                "device.name must not be empty".to_string(),
            ));
        }
        if self.probe.docked_offset >= EC_MEMORY_SIZE {
            return Err(ConfigError::Validation(format!(
                "probe.docked_offset must be below {EC_MEMORY_SIZE}, got {}",
                self.probe.docked_offset
            )));
        }
        if self.probe.docked_bit > 7 {
            return Err(ConfigError::Validation(format!(
                "probe.docked_bit must be in 0..=7, got {}",
                self.probe.docked_bit
            )));
        }
        if self.probe.dispatcher.is_empty() {
            return Err(ConfigError::Validation(
                "probe.dispatcher must not be empty".to_string(),
            ));
        }
        if self.logging.level.is_empty() {
            return Err(ConfigError::Validation(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
