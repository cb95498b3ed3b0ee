//! Dock events and their one-byte wire encoding.
//!
//! The wire byte is the enum ordinal. There is no version or magic byte, so
//! new events may only ever be appended.

use std::fmt;
use std::str::FromStr;

/// A dock state transition reported by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Event {
    /// The laptop has been docked.
    Dock = 0,
    /// The laptop has been undocked.
    Undock = 1,
}

/// Event name that matches none of the known events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event '{0}'")]
pub struct UnknownEvent(pub String);

/// Wire byte outside the known event range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid event byte {0}")]
pub struct InvalidEventByte(pub u8);

impl Event {
    /// All events, in wire order.
    pub const ALL: [Event; 2] = [Event::Dock, Event::Undock];

    /// The byte written to the daemon socket for this event.
    pub fn wire_byte(self) -> u8 {
        self as u8
    }

    /// Upper-case name used on the command line and in logs.
    pub fn name(self) -> &'static str {
        match self {
            Event::Dock => "DOCK",
            Event::Undock => "UNDOCK",
        }
    }

    /// Whether the dock switch is asserted after this event.
    pub fn docked(self) -> bool {
        matches!(self, Event::Dock)
    }
}

impl TryFrom<u8> for Event {
    type Error = InvalidEventByte;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Event::ALL
            .into_iter()
            .find(|event| event.wire_byte() == byte)
            .ok_or(InvalidEventByte(byte))
    }
}

impl FromStr for Event {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Event::ALL
            .into_iter()
            .find(|event| event.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_bytes_are_stable() {
        assert_eq!(Event::Dock.wire_byte(), 0);
        assert_eq!(Event::Undock.wire_byte(), 1);
    }

    #[test]
    fn test_decode_known_bytes() {
        assert_eq!(Event::try_from(0), Ok(Event::Dock));
        assert_eq!(Event::try_from(1), Ok(Event::Undock));
    }

    #[test]
    fn test_decode_rejects_every_other_byte() {
        for byte in 2..=u8::MAX {
            assert_eq!(Event::try_from(byte), Err(InvalidEventByte(byte)));
        }
    }

    #[test]
    fn test_parse_names_case_insensitively() {
        assert_eq!("DOCK".parse::<Event>(), Ok(Event::Dock));
        assert_eq!("dock".parse::<Event>(), Ok(Event::Dock));
        assert_eq!("UnDoCk".parse::<Event>(), Ok(Event::Undock));
    }

    #[test]
    fn test_parse_unknown_name() {
        assert_eq!(
            "docked".parse::<Event>(),
            Err(UnknownEvent("docked".to_string()))
        );
        assert!("".parse::<Event>().is_err());
    }

    #[test]
    fn test_display_and_switch_state() {
        assert_eq!(Event::Dock.to_string(), "DOCK");
        assert_eq!(Event::Undock.to_string(), "UNDOCK");
        assert!(Event::Dock.docked());
        assert!(!Event::Undock.docked());
    }
}
