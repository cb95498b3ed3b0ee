//! Dispatcher: the one-shot client that tells the daemon about an event.
//!
//! Delivery is fire-and-forget. The daemon never answers, so success only
//! means the byte was accepted by the transport.

use std::io::{self, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::event::Event;
use crate::socket::SUN_PATH_MAX;

/// Errors from the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("socket path '{}' is too long", .0.display())]
    PathTooLong(PathBuf),

    #[error("failed to connect to daemon at {}: {source}", .path.display())]
    Connect { path: PathBuf, source: io::Error },

    #[error("failed to send event to daemon: {0}")]
    Send(#[source] io::Error),

    #[error("daemon accepted {0} bytes instead of 1")]
    ShortWrite(usize),
}

/// Connect to the daemon at `path` and send `event`.
pub fn send_event(path: &Path, event: Event) -> Result<(), DispatchError> {
    if path.as_os_str().len() >= SUN_PATH_MAX {
        return Err(DispatchError::PathTooLong(path.to_path_buf()));
    }

    let mut stream = UnixStream::connect(path).map_err(|source| DispatchError::Connect {
        path: path.to_path_buf(),
        source,
    })?;

    let result = match stream.write(&[event.wire_byte()]) {
        Ok(1) => Ok(()),
        Ok(n) => Err(DispatchError::ShortWrite(n)),
        Err(e) => Err(DispatchError::Send(e)),
    };
    let _ = stream.shutdown(Shutdown::Both);

    if result.is_ok() {
        debug!(event = %event, "Sent event '{event}' to daemon");
    }
    result
}
