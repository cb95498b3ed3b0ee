#![deny(unsafe_code)]

//! vdock core runtime.
//!
//! Reports a laptop's dock/undock transitions to the rest of the system by
//! emulating an `SW_DOCK` hardware switch through uinput. A privileged daemon
//! owns the virtual device and a Unix socket; short-lived dispatcher
//! invocations write one event byte to that socket.

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Daemon lifecycle and the accept/decode/apply loop.
pub mod daemon;
/// The uinput-backed dock switch.
pub mod device;
/// One-shot client that sends an event to the daemon.
pub mod dispatch;
/// Dock events and their wire encoding.
pub mod event;
/// Subscriber setup for `tracing`.
pub mod logging;
/// Service manager readiness notifications.
pub mod notify;
/// Embedded-controller dock state probe.
pub mod probe;
/// Termination signal handling and the shutdown flag.
pub mod shutdown;
/// Singleton daemon socket and blocking acceptor.
pub mod socket;

pub use daemon::{Daemon, DaemonError, ServeSummary};
pub use device::{DeviceWrite, EventSink, VirtualDock};
pub use dispatch::{DispatchError, send_event};
pub use event::Event;
pub use notify::{Notifier, SystemdNotifier};
pub use socket::DaemonSocket;
