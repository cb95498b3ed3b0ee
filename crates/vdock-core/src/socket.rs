//! Daemon socket: singleton bind, permissions, and the blocking acceptor.
//!
//! The socket is bound, restricted to mode 0600, and only then put into
//! the listening state, so no client can queue a connection while the file
//! is still reachable through the umask's looser mode.
//!
//! Only one daemon may listen on a given path. A bind that fails with
//! `EADDRINUSE` probes the path with a connect: a live peer means another
//! instance owns it and we back off without touching the file; a refused
//! connect means the file is stale, so it is unlinked and the bind retried
//! exactly once.

use std::io;
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, ppoll};
use nix::sys::signal::SigSet;
use nix::sys::socket::{
    AddressFamily, Backlog, SockFlag, SockType, UnixAddr, bind, listen, socket,
};
use tracing::{debug, info, warn};

use crate::daemon::{Acceptor, DaemonError};

/// Capacity of `sockaddr_un::sun_path` on Linux, including the NUL.
pub const SUN_PATH_MAX: usize = 108;

/// Reject paths that do not fit in a `sockaddr_un`.
pub fn check_path_len(path: &Path) -> Result<(), DaemonError> {
    if path.as_os_str().len() >= SUN_PATH_MAX {
        return Err(DaemonError::PathTooLong {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

/// A nonblocking stream socket bound to `path` but not yet listening.
fn bind_unlistened(path: &Path) -> nix::Result<OwnedFd> {
    let fd = socket(
        AddressFamily::Unix,
        SockType::Stream,
        SockFlag::SOCK_CLOEXEC | SockFlag::SOCK_NONBLOCK,
        None,
    )?;
    bind(fd.as_raw_fd(), &UnixAddr::new(path)?)?;
    Ok(fd)
}

/// A listening socket owned by this daemon.
///
/// The socket file is unlinked when the value is dropped. A value only
/// exists when this process created the file, so a detected live peer never
/// loses its socket.
#[derive(Debug)]
pub struct DaemonSocket {
    listener: UnixListener,
    path: PathBuf,
}

impl DaemonSocket {
    /// Bind `path`, taking over a stale socket file if needed, and listen.
    pub fn bind(path: &Path) -> Result<Self, DaemonError> {
        let socket = Self::bind_restricted(path)?;
        listen(&socket.listener, Backlog::MAXCONN).map_err(|source| DaemonError::Listen {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), "Listening on socket");
        Ok(socket)
    }

    /// Bind and chmod `path` without listening yet.
    fn bind_restricted(path: &Path) -> Result<Self, DaemonError> {
        check_path_len(path)?;
        let bind_error = |errno: Errno| DaemonError::Bind {
            path: path.to_path_buf(),
            source: errno.into(),
        };

        let fd = match bind_unlistened(path) {
            Ok(fd) => fd,
            Err(Errno::EADDRINUSE) => {
                if UnixStream::connect(path).is_ok() {
                    return Err(DaemonError::AlreadyRunning(path.to_path_buf()));
                }
                info!(path = %path.display(), "Removing stale socket");
                std::fs::remove_file(path).map_err(|source| DaemonError::Unlink {
                    path: path.to_path_buf(),
                    source,
                })?;
                bind_unlistened(path).map_err(bind_error)?
            }
            Err(errno) => return Err(bind_error(errno)),
        };

        // From here on the file is ours; dropping `socket` unlinks it.
        let socket = Self {
            listener: UnixListener::from(fd),
            path: path.to_path_buf(),
        };

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(
            |source| DaemonError::Permissions {
                path: path.to_path_buf(),
                source,
            },
        )?;
        Ok(socket)
    }

    /// Path of the socket file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acceptor that stops once `shutdown` is set.
    pub fn acceptor(&self, shutdown: &'static AtomicBool) -> SocketAcceptor<'_> {
        SocketAcceptor {
            socket: self,
            shutdown,
        }
    }
}

impl Drop for DaemonSocket {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove socket file");
        }
    }
}

/// Blocks for the next client until the shutdown flag is raised.
///
/// The wait uses `ppoll` with an empty signal mask. While termination
/// signals are blocked outside the wait (see [`crate::shutdown::arm`]), a
/// signal can only be taken inside `ppoll`, which then fails with `EINTR`,
/// so there is no window between checking the flag and going to sleep.
pub struct SocketAcceptor<'a> {
    socket: &'a DaemonSocket,
    shutdown: &'static AtomicBool,
}

impl Acceptor for SocketAcceptor<'_> {
    type Conn = UnixStream;

    fn next_client(&mut self) -> io::Result<Option<UnixStream>> {
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return Ok(None);
            }

            let mut fds = [PollFd::new(self.socket.listener.as_fd(), PollFlags::POLLIN)];
            match ppoll(&mut fds, None, Some(SigSet::empty())) {
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(errno) => return Err(errno.into()),
            }

            match self.socket.listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(false)?;
                    return Ok(Some(stream));
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
