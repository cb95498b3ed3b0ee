#![deny(unsafe_code)]

//! vdockd: dispatcher and daemon for the virtual dock switch.

mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use tracing::{error, info};
use vdock_config::{AppConfig, LoggingConfig};
use vdock_core::{Daemon, DaemonError, SystemdNotifier, logging, send_event, shutdown};

use crate::cli::{Cli, RunMode};

fn main() -> ExitCode {
    // Nothing may interrupt setup; the daemon re-arms once it is listening.
    if let Err(e) = shutdown::ignore() {
        eprintln!("vdockd: failed to ignore termination signals: {e}");
        return ExitCode::FAILURE;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return usage_exit(&e),
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Config errors can surface before the subscriber is installed.
            logging::init(&LoggingConfig::default(), cli.verbose);
            match e.downcast_ref::<DaemonError>() {
                Some(DaemonError::AlreadyRunning(path)) => {
                    info!(path = %path.display(), "Daemon already running, not starting another");
                }
                _ => error!("{e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Help goes to stderr with exit 0; every other parse failure exits 1.
fn usage_exit(e: &clap::Error) -> ExitCode {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            eprint!("{}", e.render());
            ExitCode::SUCCESS
        }
        ErrorKind::DisplayVersion => {
            let _ = e.print();
            ExitCode::SUCCESS
        }
        _ => {
            let _ = e.print();
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let base = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => AppConfig::default(),
    };
    let (config, mode) = cli.resolve(base)?;

    logging::init(&config.logging, cli.verbose);

    match mode {
        RunMode::Dispatch(event) => send_event(&config.daemon.socket_path, event)?,
        RunMode::Daemon => {
            Daemon::new(config).run(&SystemdNotifier)?;
        }
    }
    Ok(())
}
