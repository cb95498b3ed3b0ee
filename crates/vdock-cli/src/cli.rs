//! Command-line surface of `vdockd` and its resolution into a config.

use std::path::PathBuf;

use clap::Parser;
use vdock_config::{AppConfig, ConfigError, parse_id};
use vdock_core::Event;
use vdock_core::build_info::LONG_VERSION;
use vdock_core::event::UnknownEvent;

/// Report dock/undock events through a virtual SW_DOCK switch.
///
/// Without --daemon, sends EVENT to a running daemon and exits.
#[derive(Debug, Parser)]
#[command(name = "vdockd", version = LONG_VERSION, about, long_about = None)]
pub struct Cli {
    /// Run as the daemon that owns the virtual device.
    #[arg(short, long)]
    pub daemon: bool,

    /// Daemon socket path.
    #[arg(short, long, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    /// Virtual device name.
    #[arg(short, long, value_name = "STRING")]
    pub name: Option<String>,

    /// Virtual device vendor id (decimal, 0octal or 0xhex).
    #[arg(short = 'e', long, value_name = "INT", value_parser = parse_id)]
    pub vendor: Option<u16>,

    /// Virtual device product id (decimal, 0octal or 0xhex).
    #[arg(short, long, value_name = "INT", value_parser = parse_id)]
    pub product: Option<u16>,

    /// Per-client receive timeout in milliseconds.
    #[arg(short, long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// TOML configuration file, overridden by the flags above.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log every event and connection.
    #[arg(short, long)]
    pub verbose: bool,

    /// DOCK or UNDOCK (case-insensitive); required unless --daemon.
    #[arg(value_name = "EVENT")]
    pub events: Vec<String>,
}

/// What this invocation should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Daemon,
    Dispatch(Event),
}

/// Flag combinations that do not describe a run.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("--daemon takes no EVENT argument")]
    DaemonWithEvent,

    #[error("exactly one EVENT (DOCK or UNDOCK) is required, got {0}")]
    EventCount(usize),

    #[error(transparent)]
    UnknownEvent(#[from] UnknownEvent),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Cli {
    /// Overlay the flags on `base` and pick the run mode.
    ///
    /// Performs no I/O; the caller loads any config file into `base`.
    pub fn resolve(&self, base: AppConfig) -> Result<(AppConfig, RunMode), UsageError> {
        let mode = match (self.daemon, self.events.as_slice()) {
            (true, []) => RunMode::Daemon,
            (true, _) => return Err(UsageError::DaemonWithEvent),
            (false, [event]) => RunMode::Dispatch(event.parse()?),
            (false, events) => return Err(UsageError::EventCount(events.len())),
        };

        let mut config = base;
        if let Some(path) = &self.socket {
            config.daemon.socket_path = path.clone();
        }
        if let Some(ms) = self.timeout {
            config.daemon.client_timeout_ms = ms;
        }
        if let Some(name) = &self.name {
            config.device.name = name.clone();
        }
        if let Some(vendor) = self.vendor {
            config.device.vendor = vendor;
        }
        if let Some(product) = self.product {
            config.device.product = product;
        }
        config.validate()?;

        Ok((config, mode))
    }
}
