//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = vdock_config::AppConfig::parse(s) {
            // Anything that parses has passed validation.
            assert!(config.daemon.client_timeout_ms > 0);
            assert!(config.probe.docked_bit <= 7);
        }
    }
});
