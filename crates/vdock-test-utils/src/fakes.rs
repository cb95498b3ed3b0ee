//! Fakes for the daemon's seams: device sink, notifier, and scripted
//! connections for driving [`serve`](vdock_core::daemon::serve) without
//! sockets.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read};
use std::rc::Rc;
use std::time::Duration;

use vdock_core::daemon::{Acceptor, Connection};
use vdock_core::{DeviceWrite, EventSink, Notifier};

/// Records every device write in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub writes: Vec<DeviceWrite>,
}

impl EventSink for RecordingSink {
    fn write(&mut self, write: DeviceWrite) -> io::Result<()> {
        self.writes.push(write);
        Ok(())
    }
}

/// Records `READY=1` / `STOPPING=1` announcements.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub states: RefCell<Vec<&'static str>>,
}

impl Notifier for RecordingNotifier {
    fn ready(&self) {
        self.states.borrow_mut().push("READY=1");
    }

    fn stopping(&self) {
        self.states.borrow_mut().push("STOPPING=1");
    }
}

/// What a scripted client does once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientScript {
    /// Sends one byte.
    Send(u8),
    /// Stays connected but silent until the receive timeout fires.
    Silent,
    /// Hangs up without sending anything.
    HangUp,
    /// The connection fails with a reset.
    Reset,
    /// The accept itself fails, as with `EMFILE`.
    AcceptFails,
}

/// A connection that plays back a [`ClientScript`].
#[derive(Debug)]
pub struct ScriptedConn {
    script: Option<ClientScript>,
    log: Rc<RefCell<ConnLog>>,
}

/// What the daemon did with the scripted connections.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnLog {
    pub timeouts: Vec<Duration>,
    pub closed: usize,
}

impl Read for ScriptedConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.script.take() {
            Some(ClientScript::Send(byte)) => {
                buf[0] = byte;
                Ok(1)
            }
            Some(ClientScript::Silent) => Err(io::ErrorKind::WouldBlock.into()),
            Some(ClientScript::Reset) => Err(io::ErrorKind::ConnectionReset.into()),
            Some(ClientScript::HangUp | ClientScript::AcceptFails) | None => Ok(0),
        }
    }
}

impl Connection for ScriptedConn {
    fn set_receive_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.log.borrow_mut().timeouts.push(timeout);
        Ok(())
    }

    fn close(self) {
        self.log.borrow_mut().closed += 1;
    }
}

/// Hands out scripted connections, then reports shutdown.
#[derive(Debug, Default)]
pub struct ScriptedAcceptor {
    clients: VecDeque<ClientScript>,
    log: Rc<RefCell<ConnLog>>,
}

impl ScriptedAcceptor {
    pub fn new(clients: impl IntoIterator<Item = ClientScript>) -> Self {
        Self {
            clients: clients.into_iter().collect(),
            log: Rc::default(),
        }
    }

    /// Snapshot of what happened to the connections so far.
    pub fn log(&self) -> ConnLog {
        self.log.borrow().clone()
    }
}

impl Acceptor for ScriptedAcceptor {
    type Conn = ScriptedConn;

    fn next_client(&mut self) -> io::Result<Option<ScriptedConn>> {
        match self.clients.pop_front() {
            Some(ClientScript::AcceptFails) => Err(io::Error::other("too many open files")),
            next => Ok(next.map(|script| ScriptedConn {
                script: Some(script),
                log: Rc::clone(&self.log),
            })),
        }
    }
}
