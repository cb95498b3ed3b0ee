//! Full daemon lifecycle ending in SIGTERM.
//!
//! Kept in its own test binary: it installs process-wide signal handlers.

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use nix::sys::pthread::{pthread_kill, pthread_self};
use nix::sys::signal::{Signal, raise};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use vdock_core::{Daemon, DeviceWrite, Event, EventSink, Notifier, send_event, shutdown};
use vdock_test_utils::config::TestConfigBuilder;

/// Everything observable about the daemon, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    DeviceCreated,
    Notified(&'static str),
    Wrote(DeviceWrite),
    DeviceDropped { socket_present: bool },
}

struct ChannelNotifier(Sender<Step>);

impl Notifier for ChannelNotifier {
    fn ready(&self) {
        let _ = self.0.send(Step::Notified("READY=1"));
    }

    fn stopping(&self) {
        let _ = self.0.send(Step::Notified("STOPPING=1"));
    }
}

struct ChannelDevice {
    steps: Sender<Step>,
    socket_path: PathBuf,
}

impl EventSink for ChannelDevice {
    fn write(&mut self, write: DeviceWrite) -> io::Result<()> {
        let _ = self.steps.send(Step::Wrote(write));
        Ok(())
    }
}

impl Drop for ChannelDevice {
    fn drop(&mut self) {
        let _ = self.steps.send(Step::DeviceDropped {
            socket_present: self.socket_path.exists(),
        });
    }
}

fn next(steps: &Receiver<Step>) -> Step {
    steps
        .recv_timeout(Duration::from_secs(5))
        .expect("daemon made no progress")
}

#[test_log::test]
fn sigterm_stops_daemon_in_order() {
    shutdown::ignore().unwrap();

    let tmp = TempDir::new().unwrap();
    let socket_path = tmp.path().join("t.sock");
    let config = TestConfigBuilder::new().socket_path(&socket_path).build();

    let (tx, steps) = mpsc::channel();
    let (thread_tx, thread_id) = mpsc::channel();
    let device_path = socket_path.clone();
    let daemon = thread::spawn(move || {
        thread_tx.send(pthread_self()).unwrap();
        let notifier = ChannelNotifier(tx.clone());
        Daemon::new(config).run_with(&notifier, |_device| {
            let _ = tx.send(Step::DeviceCreated);
            Ok(ChannelDevice {
                steps: tx.clone(),
                socket_path: device_path,
            })
        })
    });
    let serving_thread = thread_id.recv().unwrap();

    let mut seen = vec![next(&steps), next(&steps)];
    assert_eq!(seen, vec![Step::DeviceCreated, Step::Notified("READY=1")]);
    assert!(socket_path.exists());

    send_event(&socket_path, Event::Dock).unwrap();
    seen.push(next(&steps));
    seen.push(next(&steps));

    // The handler is armed and the client handled; the daemon is back in ppoll.
    pthread_kill(serving_thread, Signal::SIGTERM).unwrap();
    seen.push(next(&steps));
    seen.push(next(&steps));

    let summary = daemon.join().unwrap().unwrap();
    assert_eq!(
        seen,
        vec![
            Step::DeviceCreated,
            Step::Notified("READY=1"),
            Step::Wrote(DeviceWrite::DockSwitch(true)),
            Step::Wrote(DeviceWrite::SyncReport),
            Step::Notified("STOPPING=1"),
            Step::DeviceDropped {
                socket_present: true
            },
        ]
    );
    assert_eq!(summary.applied, 1);
    assert!(shutdown::requested());
    assert!(!socket_path.exists());

    // Termination signals are ignored again once the daemon is done.
    raise(Signal::SIGTERM).unwrap();
}
