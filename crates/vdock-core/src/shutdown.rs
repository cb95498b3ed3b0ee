//! Termination-signal dispositions and the process-wide shutdown flag.
//!
//! `SIGINT` and `SIGTERM` start out ignored so that resource acquisition is
//! never cut short. [`arm`] installs a handler that only raises the flag and
//! blocks both signals on the calling thread; they are then taken solely
//! inside the acceptor's `ppoll`, which returns `EINTR`. [`ignore`] restores
//! the ignored disposition before teardown.

// sigaction is unsafe in nix; the handler below only touches an atomic.
#![allow(unsafe_code)]

use std::ffi::c_int;
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

/// Signals that request daemon shutdown.
pub const TERMINATION_SIGNALS: [Signal; 2] = [Signal::SIGINT, Signal::SIGTERM];

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn on_termination(_signal: c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// The flag raised by the termination handler.
pub fn flag() -> &'static AtomicBool {
    &SHUTDOWN
}

/// Whether a termination signal has been received since [`arm`].
pub fn requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

fn termination_set() -> SigSet {
    let mut set = SigSet::empty();
    for signal in TERMINATION_SIGNALS {
        set.add(signal);
    }
    set
}

fn install(handler: SigHandler) -> nix::Result<()> {
    let action = SigAction::new(handler, SaFlags::empty(), SigSet::empty());
    for signal in TERMINATION_SIGNALS {
        // SAFETY: the handler is either SIG_IGN or `on_termination`, which is
        // async-signal-safe (a single atomic store).
        unsafe { sigaction(signal, &action) }?;
    }
    Ok(())
}

/// Ignore termination signals and discard any that are pending.
pub fn ignore() -> nix::Result<()> {
    install(SigHandler::SigIgn)?;
    termination_set().thread_unblock()
}

/// Clear the flag and route termination signals to the handler.
///
/// The signals stay blocked on this thread until the acceptor waits.
pub fn arm() -> nix::Result<()> {
    SHUTDOWN.store(false, Ordering::SeqCst);
    termination_set().thread_block()?;
    install(SigHandler::Handler(on_termination))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_termination_set_contains_both_signals() {
        let set = termination_set();
        assert!(set.contains(Signal::SIGINT));
        assert!(set.contains(Signal::SIGTERM));
        assert!(!set.contains(Signal::SIGHUP));
    }

    #[test]
    fn test_flag_is_the_shared_static() {
        assert!(std::ptr::eq(flag(), &SHUTDOWN));
    }
}
