//! Readiness notifications to the service manager.

use sd_notify::NotifyState;
use tracing::{trace, warn};

/// Lifecycle announcements made by the daemon.
///
/// `ready` is sent once the device and socket are live, `stopping` once
/// when a termination signal is first observed, before any teardown.
pub trait Notifier {
    fn ready(&self);
    fn stopping(&self);
}

/// Sends `READY=1` / `STOPPING=1` over `$NOTIFY_SOCKET`.
///
/// Does nothing when the daemon was not started by systemd.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemdNotifier;

impl SystemdNotifier {
    fn send(state: NotifyState<'_>, label: &str) {
        match sd_notify::notify(false, &[state]) {
            Ok(()) => trace!(state = label, "Sent service notification"),
            Err(e) => warn!(state = label, error = %e, "Failed to notify service manager"),
        }
    }
}

impl Notifier for SystemdNotifier {
    fn ready(&self) {
        Self::send(NotifyState::Ready, "READY=1");
    }

    fn stopping(&self) {
        Self::send(NotifyState::Stopping, "STOPPING=1");
    }
}
