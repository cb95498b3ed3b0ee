//! Process-wide `tracing` subscriber setup.
//!
//! Everything goes to stderr. `RUST_LOG` takes precedence; otherwise the
//! configured level applies, raised to `debug` by `--verbose`.

use tracing_subscriber::EnvFilter;

use vdock_config::LoggingConfig;

/// The filter directive used when `RUST_LOG` is not set.
pub fn default_directive(config: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        config.level.clone()
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let directive = default_directive(config, verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
