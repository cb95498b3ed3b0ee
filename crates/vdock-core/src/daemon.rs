//! Core daemon process: startup, the accept/decode/apply loop, and shutdown.
//!
//! Clients are served strictly one at a time:
//!
//! ```text
//! LISTENING ──accept──▶ CLIENT_CONNECTED ──receive (bounded)──▶ ┬ EVENT_APPLIED
//!     ▲                                                         ├ TIMED_OUT
//!     └──────────────────── close connection ◀──────────────────┴ INVALID_EVENT
//! ```
//!
//! The loop is written against [`Acceptor`], [`Connection`] and
//! [`EventSink`] so that it can run over fakes as well as the real socket
//! and uinput device.

use std::io::{self, Read};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use vdock_config::{AppConfig, DeviceConfig};

use crate::build_info;
use crate::device::{EventSink, VirtualDock, writes_for};
use crate::event::Event;
use crate::notify::Notifier;
use crate::shutdown;
use crate::socket::DaemonSocket;

/// Errors from the daemon runtime.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("another instance is running on socket {}", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("socket path '{}' is too long", .path.display())]
    PathTooLong { path: PathBuf },

    #[error("failed to bind socket {}: {source}", .path.display())]
    Bind { path: PathBuf, source: io::Error },

    #[error("failed to listen on socket {}: {source}", .path.display())]
    Listen {
        path: PathBuf,
        source: nix::errno::Errno,
    },

    #[error("failed to restrict permissions on {}: {source}", .path.display())]
    Permissions { path: PathBuf, source: io::Error },

    #[error("failed to remove stale socket {}: {source}", .path.display())]
    Unlink { path: PathBuf, source: io::Error },

    #[error("failed to create uinput device: {0}")]
    Device(#[source] io::Error),

    #[error("failed to change signal disposition: {0}")]
    Signal(#[from] nix::errno::Errno),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A connected client.
pub trait Connection: Read {
    /// Bound how long a single receive may block.
    fn set_receive_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Shut down both directions and release the connection.
    fn close(self);
}

impl Connection for UnixStream {
    fn set_receive_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }

    fn close(self) {
        let _ = self.shutdown(Shutdown::Both);
    }
}

/// Source of client connections.
pub trait Acceptor {
    type Conn: Connection;

    /// Block for the next client. `Ok(None)` means shutdown was requested.
    fn next_client(&mut self) -> io::Result<Option<Self::Conn>>;
}

/// What a single receive produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    Byte(u8),
    TimedOut,
    /// End of stream, a failed read, or the timeout could not be set.
    Closed,
}

/// Terminal state of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied(Event),
    TimedOut,
    Invalid(u8),
    Dropped,
}

impl From<Received> for Outcome {
    fn from(received: Received) -> Self {
        match received {
            Received::Byte(byte) => match Event::try_from(byte) {
                Ok(event) => Outcome::Applied(event),
                Err(_) => Outcome::Invalid(byte),
            },
            Received::TimedOut => Outcome::TimedOut,
            Received::Closed => Outcome::Dropped,
        }
    }
}

/// Pause after a failed accept before waiting for the next client.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Counts of connection outcomes over one daemon lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    pub applied: u64,
    pub timed_out: u64,
    pub invalid: u64,
    pub dropped: u64,
    pub accept_failures: u64,
}

impl ServeSummary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Applied(_) => self.applied += 1,
            Outcome::TimedOut => self.timed_out += 1,
            Outcome::Invalid(_) => self.invalid += 1,
            Outcome::Dropped => self.dropped += 1,
        }
    }
}

/// Read exactly one byte, waiting at most `timeout`.
pub fn receive<C: Connection>(conn: &mut C, timeout: Duration) -> Received {
    if let Err(e) = conn.set_receive_timeout(timeout) {
        error!(error = %e, "Failed to set client receive timeout");
        return Received::Closed;
    }

    let mut byte = [0u8; 1];
    match conn.read(&mut byte) {
        Ok(1) => Received::Byte(byte[0]),
        Ok(_) => Received::Closed,
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            Received::TimedOut
        }
        Err(_) => Received::Closed,
    }
}

/// Serve one client: receive, always close, then decode.
pub fn handle_client<C: Connection>(mut conn: C, timeout: Duration) -> Outcome {
    let received = receive(&mut conn, timeout);
    conn.close();
    Outcome::from(received)
}

/// Report `event` on the device.
///
/// Both writes are attempted even if the first fails; there is no one to
/// report a failure to, so it is only logged.
pub fn apply<S: EventSink + ?Sized>(sink: &mut S, event: Event) {
    for write in writes_for(event) {
        if let Err(e) = sink.write(write) {
            warn!(event = %event, ?write, error = %e, "Device write failed");
        }
    }
}

/// Run the accept/decode/apply loop until the acceptor reports shutdown.
pub fn serve<A, S>(acceptor: &mut A, sink: &mut S, timeout: Duration) -> ServeSummary
where
    A: Acceptor,
    S: EventSink + ?Sized,
{
    let mut summary = ServeSummary::default();

    loop {
        let conn = match acceptor.next_client() {
            Ok(Some(conn)) => conn,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "Accept failed");
                summary.accept_failures += 1;
                // Errors like EMFILE persist; don't spin on them.
                std::thread::sleep(ACCEPT_RETRY_DELAY);
                continue;
            }
        };

        let outcome = handle_client(conn, timeout);
        match outcome {
            Outcome::Applied(event) => {
                debug!(event = %event, "Received event '{event}'");
                apply(sink, event);
            }
            Outcome::TimedOut => warn!("Client timed out"),
            Outcome::Invalid(byte) => debug!(byte, "Received invalid event {byte}"),
            Outcome::Dropped => {}
        }
        summary.record(outcome);
    }

    summary
}

/// The virtual dock daemon.
pub struct Daemon {
    config: AppConfig,
}

impl Daemon {
    /// Create a new daemon instance with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Get a reference to the daemon's configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run until a termination signal is received.
    ///
    /// Termination signals must already be ignored (see
    /// [`shutdown::ignore`]). On every exit path the device is destroyed
    /// before the socket is closed and unlinked; a detected live peer is
    /// reported as [`DaemonError::AlreadyRunning`] and its socket left alone.
    pub fn run<N: Notifier>(&self, notifier: &N) -> Result<ServeSummary, DaemonError> {
        self.run_with(notifier, VirtualDock::create)
    }

    /// [`run`](Self::run) with the device supplied by `create_device`.
    ///
    /// The device is created once the socket is listening and before
    /// readiness is announced.
    pub fn run_with<N, S, F>(
        &self,
        notifier: &N,
        create_device: F,
    ) -> Result<ServeSummary, DaemonError>
    where
        N: Notifier,
        S: EventSink,
        F: FnOnce(&DeviceConfig) -> Result<S, DaemonError>,
    {
        info!(version = build_info::LONG_VERSION, "vdock daemon starting");

        let socket = DaemonSocket::bind(&self.config.daemon.socket_path)?;
        let mut device = create_device(&self.config.device)?;

        shutdown::arm()?;
        notifier.ready();
        info!(path = %socket.path().display(), "Ready to accept connections");

        let summary = serve(
            &mut socket.acceptor(shutdown::flag()),
            &mut device,
            self.config.daemon.client_timeout(),
        );

        notifier.stopping();
        info!(?summary, "Shutdown signal received, stopping daemon");
        shutdown::ignore()?;

        drop(device);
        drop(socket);
        info!("Daemon stopped");
        Ok(summary)
    }
}
