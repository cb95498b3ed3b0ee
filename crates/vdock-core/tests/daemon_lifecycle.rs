//! End-to-end daemon behaviour over a real socket in a temp directory.

use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixStream;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use vdock_core::{Daemon, DaemonError, DaemonSocket, DeviceWrite, Event, send_event};
use vdock_test_utils::config::TestConfigBuilder;
use vdock_test_utils::daemon::TestDaemon;
use vdock_test_utils::fakes::RecordingNotifier;

#[test_log::test]
fn dock_then_undock_reach_the_device() {
    let mut daemon = TestDaemon::start();
    daemon.send(Event::Dock);
    daemon.send(Event::Undock);

    let stopped = daemon.stop();
    assert_eq!(
        stopped.writes,
        vec![
            DeviceWrite::DockSwitch(true),
            DeviceWrite::SyncReport,
            DeviceWrite::DockSwitch(false),
            DeviceWrite::SyncReport,
        ]
    );
    assert_eq!(stopped.summary.applied, 2);
}

#[test_log::test]
fn dispatcher_client_is_understood() {
    let mut daemon = TestDaemon::start();
    send_event(daemon.socket_path(), Event::Dock).unwrap();
    daemon.expect_clients(1);

    let stopped = daemon.stop();
    assert_eq!(
        stopped.writes,
        vec![DeviceWrite::DockSwitch(true), DeviceWrite::SyncReport]
    );
}

#[test_log::test]
fn invalid_byte_is_ignored() {
    let mut daemon = TestDaemon::start();
    daemon.send_raw(&[2]);
    daemon.send(Event::Undock);

    let stopped = daemon.stop();
    assert_eq!(
        stopped.writes,
        vec![DeviceWrite::DockSwitch(false), DeviceWrite::SyncReport]
    );
    assert_eq!(stopped.summary.invalid, 1);
}

#[test_log::test]
fn only_the_first_byte_counts() {
    let mut daemon = TestDaemon::start();
    daemon.send_raw(&[0, 1, 1]);

    let stopped = daemon.stop();
    assert_eq!(
        stopped.writes,
        vec![DeviceWrite::DockSwitch(true), DeviceWrite::SyncReport]
    );
}

#[test_log::test]
fn silent_client_times_out_and_is_closed() {
    let mut daemon = TestDaemon::with_timeout(Duration::from_millis(50));
    let mut silent = daemon.connect();
    daemon.send(Event::Dock);

    // The daemon hangs up on us once the timeout fires.
    silent
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut buf = [0u8; 1];
    assert_eq!(silent.read(&mut buf).unwrap(), 0);

    let stopped = daemon.stop();
    assert_eq!(stopped.summary.timed_out, 1);
    assert_eq!(
        stopped.writes,
        vec![DeviceWrite::DockSwitch(true), DeviceWrite::SyncReport]
    );
}

#[test_log::test]
fn socket_is_unlinked_after_stop() {
    let daemon = TestDaemon::start();
    let path = daemon.socket_path().to_path_buf();
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);

    let stopped = daemon.stop();
    assert!(stopped.socket_removed);
    assert!(UnixStream::connect(&path).is_err());
}

#[test_log::test]
fn second_instance_leaves_live_socket_alone() {
    let mut daemon = TestDaemon::start();

    let second = DaemonSocket::bind(daemon.socket_path());
    assert!(matches!(second, Err(DaemonError::AlreadyRunning(_))));
    assert!(daemon.socket_path().exists());
    // The liveness probe is itself a client.
    daemon.expect_clients(1);

    daemon.send(Event::Undock);
    let stopped = daemon.stop();
    assert_eq!(
        stopped.writes,
        vec![DeviceWrite::DockSwitch(false), DeviceWrite::SyncReport]
    );
}

#[test_log::test]
fn stale_socket_file_is_taken_over() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("vdockd.sock");

    // A listener that went away without unlinking leaves a dead socket file.
    drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
    assert!(path.exists());

    let socket = DaemonSocket::bind(&path).unwrap();
    assert!(UnixStream::connect(socket.path()).is_ok());
    drop(socket);
    assert!(!path.exists());
}

#[test_log::test]
fn daemon_refuses_live_socket_without_announcing() {
    let mut running = TestDaemon::start();
    let config = TestConfigBuilder::new()
        .socket_path(running.socket_path())
        .build();

    let notifier = RecordingNotifier::default();
    let result = Daemon::new(config).run(&notifier);

    assert!(matches!(result, Err(DaemonError::AlreadyRunning(_))));
    assert!(notifier.states.borrow().is_empty());
    running.expect_clients(1);

    running.send(Event::Dock);
    let stopped = running.stop();
    assert_eq!(
        stopped.writes,
        vec![DeviceWrite::DockSwitch(true), DeviceWrite::SyncReport]
    );
}

#[test_log::test]
fn daemon_rejects_overlong_socket_path() {
    let config = TestConfigBuilder::new()
        .socket_path(format!("/tmp/{}", "x".repeat(200)))
        .build();

    let notifier = RecordingNotifier::default();
    let result = Daemon::new(config).run(&notifier);

    assert!(matches!(result, Err(DaemonError::PathTooLong { .. })));
    assert!(notifier.states.borrow().is_empty());
}
