//! Daemon test harness.
//!
//! [`TestDaemon`] binds a real [`DaemonSocket`] in a temporary directory and
//! runs the production accept loop on a background thread, recording device
//! writes instead of touching uinput.

use std::io::{self, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use vdock_core::daemon::{Acceptor, serve};
use vdock_core::{DaemonSocket, DeviceWrite, Event, ServeSummary};

use crate::fakes::RecordingSink;

/// Default receive timeout for harness daemons.
pub const TEST_CLIENT_TIMEOUT: Duration = Duration::from_millis(100);

/// How long [`TestDaemon::stop`] waits for queued clients to be accepted.
const DRAIN_DEADLINE: Duration = Duration::from_secs(5);

/// Counts accepted connections so the harness knows when queued clients
/// have been picked up.
struct Counting<A> {
    inner: A,
    accepted: Arc<AtomicUsize>,
}

impl<A: Acceptor> Acceptor for Counting<A> {
    type Conn = A::Conn;

    fn next_client(&mut self) -> io::Result<Option<A::Conn>> {
        let next = self.inner.next_client()?;
        if next.is_some() {
            self.accepted.fetch_add(1, Ordering::SeqCst);
        }
        Ok(next)
    }
}

/// What the daemon did over its lifetime.
#[derive(Debug)]
pub struct Stopped {
    pub writes: Vec<DeviceWrite>,
    /// `dropped` may include the connection used to wake the acceptor.
    pub summary: ServeSummary,
    /// Whether the socket file was gone once the daemon exited.
    pub socket_removed: bool,
}

/// A daemon serving on a temp-dir socket until [`stop`](Self::stop).
///
/// The temp directory is deleted when this value is dropped.
pub struct TestDaemon {
    socket_path: PathBuf,
    shutdown: &'static AtomicBool,
    accepted: Arc<AtomicUsize>,
    clients: usize,
    handle: Option<JoinHandle<(RecordingSink, ServeSummary)>>,
    _temp_dir: TempDir,
}

impl TestDaemon {
    pub fn start() -> Self {
        Self::with_timeout(TEST_CLIENT_TIMEOUT)
    }

    /// Start a daemon that gives each client `timeout` to send its byte.
    pub fn with_timeout(timeout: Duration) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let socket_path = temp_dir.path().join("vdockd.sock");
        let socket = DaemonSocket::bind(&socket_path).expect("failed to bind test socket");

        // Each harness gets its own flag; the acceptor needs a 'static one.
        let shutdown: &'static AtomicBool = Box::leak(Box::new(AtomicBool::new(false)));
        let accepted = Arc::new(AtomicUsize::new(0));

        let thread_accepted = Arc::clone(&accepted);
        let handle = thread::spawn(move || {
            let mut acceptor = Counting {
                inner: socket.acceptor(shutdown),
                accepted: thread_accepted,
            };
            let mut sink = RecordingSink::default();
            let summary = serve(&mut acceptor, &mut sink, timeout);
            drop(acceptor);
            drop(socket);
            (sink, summary)
        });

        Self {
            socket_path,
            shutdown,
            accepted,
            clients: 0,
            handle: Some(handle),
            _temp_dir: temp_dir,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Connect and send `event` the way the dispatcher does.
    pub fn send(&mut self, event: Event) {
        self.send_raw(&[event.wire_byte()]);
    }

    /// Connect, write `bytes` verbatim, and hang up.
    pub fn send_raw(&mut self, bytes: &[u8]) {
        let mut stream = self.connect();
        stream.write_all(bytes).expect("failed to write to test daemon");
    }

    /// Open a connection that the caller keeps open without writing.
    pub fn connect(&mut self) -> UnixStream {
        let stream = UnixStream::connect(&self.socket_path).expect("failed to connect to test daemon");
        self.clients += 1;
        stream
    }

    /// Account for `n` clients that connect without going through the
    /// harness, so [`stop`](Self::stop) waits for them too.
    pub fn expect_clients(&mut self, n: usize) {
        self.clients += n;
    }

    /// Wait for every client so far to be accepted, then shut down.
    pub fn stop(mut self) -> Stopped {
        let deadline = Instant::now() + DRAIN_DEADLINE;
        while self.accepted.load(Ordering::SeqCst) < self.clients && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        self.shutdown.store(true, Ordering::SeqCst);
        // The acceptor only re-checks the flag once its wait returns.
        let _ = UnixStream::connect(&self.socket_path);

        let (sink, summary) = self
            .handle
            .take()
            .expect("daemon already stopped")
            .join()
            .expect("daemon thread panicked");

        Stopped {
            writes: sink.writes,
            summary,
            socket_removed: !self.socket_path.exists(),
        }
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shutdown.store(true, Ordering::SeqCst);
            let _ = UnixStream::connect(&self.socket_path);
            let _ = handle.join();
        }
    }
}
