//! Boot-time dock state probe.
//!
//! Reads the embedded-controller memory dump exposed by the `ec_sys` debugfs
//! interface and infers the event the daemon should be told about. The
//! `update-dock-status` binary hands the result to the dispatcher.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::warn;

use vdock_config::{EC_MEMORY_SIZE, ProbeConfig};

use crate::event::Event;

/// Errors from reading EC memory.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to open {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("EC memory holds {len} bytes, dock status lives at offset {offset:#x}")]
    Truncated { len: usize, offset: usize },
}

/// Dock event implied by an EC memory block.
pub fn event_from_ec(memory: &[u8], offset: usize, bit: u8) -> Result<Event, ProbeError> {
    let byte = memory.get(offset).ok_or(ProbeError::Truncated {
        len: memory.len(),
        offset,
    })?;
    let docked = byte
        .checked_shr(u32::from(bit))
        .is_some_and(|shifted| shifted & 1 != 0);
    Ok(if docked {
        Event::Dock
    } else {
        Event::Undock
    })
}

/// Read up to [`EC_MEMORY_SIZE`] bytes of EC memory from `path`.
///
/// A short read is zero-filled to the full block, so bits past the end of
/// the dump read as clear.
pub fn read_ec_memory(path: &Path) -> Result<Vec<u8>, ProbeError> {
    let file = File::open(path).map_err(|source| ProbeError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut memory = Vec::with_capacity(EC_MEMORY_SIZE);
    file.take(EC_MEMORY_SIZE as u64)
        .read_to_end(&mut memory)
        .map_err(|source| ProbeError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    if memory.len() != EC_MEMORY_SIZE {
        warn!(
            expected = EC_MEMORY_SIZE,
            got = memory.len(),
            "Short read of EC memory"
        );
        memory.resize(EC_MEMORY_SIZE, 0);
    }
    Ok(memory)
}

/// Probe the current dock state as configured.
pub fn probe(config: &ProbeConfig) -> Result<Event, ProbeError> {
    let memory = read_ec_memory(&config.ec_path)?;
    event_from_ec(&memory, config.docked_offset, config.docked_bit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn ec_block(byte: u8) -> Vec<u8> {
        let mut memory = vec![0u8; EC_MEMORY_SIZE];
        memory[0x48] = byte;
        memory
    }

    #[test]
    fn test_docked_bit_set() {
        assert_eq!(event_from_ec(&ec_block(0b0010_0000), 0x48, 5).unwrap(), Event::Dock);
        assert_eq!(event_from_ec(&ec_block(0xff), 0x48, 5).unwrap(), Event::Dock);
    }

    #[test]
    fn test_docked_bit_clear() {
        assert_eq!(event_from_ec(&ec_block(0), 0x48, 5).unwrap(), Event::Undock);
        assert_eq!(
            event_from_ec(&ec_block(0b1101_1111), 0x48, 5).unwrap(),
            Event::Undock
        );
    }

    #[test]
    fn test_offset_past_end() {
        assert!(matches!(
            event_from_ec(&[0u8; 16], 0x48, 5),
            Err(ProbeError::Truncated { len: 16, offset: 0x48 })
        ));
    }

    #[test]
    fn test_probe_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("io");
        std::fs::write(&path, ec_block(0x20)).unwrap();

        let config = ProbeConfig {
            ec_path: path,
            ..ProbeConfig::default()
        };
        assert_eq!(probe(&config).unwrap(), Event::Dock);
    }

    #[test]
    fn test_read_is_capped_at_block_size() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("io");
        std::fs::write(&path, vec![0u8; EC_MEMORY_SIZE * 2]).unwrap();

        assert_eq!(read_ec_memory(&path).unwrap().len(), EC_MEMORY_SIZE);
    }

    #[test]
    fn test_short_read_still_usable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("io");
        std::fs::write(&path, vec![0xffu8; 0x49]).unwrap();

        let config = ProbeConfig {
            ec_path: path,
            ..ProbeConfig::default()
        };
        assert_eq!(probe(&config).unwrap(), Event::Dock);
    }

    #[test]
    fn test_short_read_before_offset_reports_undocked() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("io");
        std::fs::write(&path, vec![0xffu8; 0x10]).unwrap();

        let memory = read_ec_memory(&path).unwrap();
        assert_eq!(memory.len(), EC_MEMORY_SIZE);
        assert_eq!(&memory[..0x10], &[0xffu8; 0x10]);

        let config = ProbeConfig {
            ec_path: path,
            ..ProbeConfig::default()
        };
        assert_eq!(probe(&config).unwrap(), Event::Undock);
    }

    #[test]
    fn test_missing_file() {
        let config = ProbeConfig {
            ec_path: PathBuf::from("/nonexistent/ec0/io"),
            ..ProbeConfig::default()
        };
        assert!(matches!(probe(&config), Err(ProbeError::Open { .. })));
    }
}
