#![deny(unsafe_code)]

//! Shared test utilities for the vdock workspace.
//!
//! Provides config builders, fakes for the daemon's seams, a log capture
//! layer, and a [`daemon::TestDaemon`] harness that runs the real accept loop
//! over a socket in a temporary directory.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! vdock-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod daemon;
pub mod fakes;
pub mod log_capture;
