#![deny(unsafe_code)]

//! update-dock-status: tell the daemon the dock state found in EC memory.
//!
//! Meant to run once at boot, after `vdockd --daemon` is up. The process is
//! replaced by `<dispatcher> DOCK|UNDOCK`.

use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, ExitCode};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{debug, error, info};
use vdock_config::{AppConfig, LoggingConfig};
use vdock_core::build_info::LONG_VERSION;
use vdock_core::{logging, probe};

/// Read the dock state from embedded-controller memory and report it.
#[derive(Debug, Parser)]
#[command(name = "update-dock-status", version = LONG_VERSION, about, long_about = None)]
struct Args {
    /// TOML configuration file; also passed on to the dispatcher.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// EC memory dump to read.
    #[arg(long, value_name = "PATH")]
    ec_path: Option<PathBuf>,

    /// Program to exec with the event.
    #[arg(long, value_name = "PROGRAM")]
    dispatcher: Option<PathBuf>,

    /// Log the probed state and the dispatcher invocation.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Only returns on failure.
    let Err(e) = run(&args);
    logging::init(&LoggingConfig::default(), args.verbose);
    error!("{e:#}");
    ExitCode::FAILURE
}

fn run(args: &Args) -> Result<std::convert::Infallible> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => AppConfig::default(),
    };
    if let Some(path) = &args.ec_path {
        config.probe.ec_path = path.clone();
    }
    if let Some(program) = &args.dispatcher {
        config.probe.dispatcher = program.display().to_string();
    }
    config.validate()?;
    logging::init(&config.logging, args.verbose);

    let event = probe::probe(&config.probe)?;
    info!(event = %event, "Dock state from EC memory");

    let mut dispatcher = Command::new(&config.probe.dispatcher);
    if let Some(path) = &args.config {
        dispatcher.arg("--config").arg(path);
    }
    if args.verbose {
        dispatcher.arg("--verbose");
    }
    dispatcher.arg(event.name());
    debug!(command = ?dispatcher, "Executing dispatcher");

    let e = dispatcher.exec();
    bail!("failed to execute '{}': {e}", config.probe.dispatcher)
}
