//! Save/load of finished levels.
//!
//! Uses bincode for a compact binary form of a [`GeneratedLevel`], wrapped in
//! a versioned envelope so stale snapshots are rejected instead of
//! misread.

use pipegen_logic::level::GeneratedLevel;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Version number for the snapshot format (increment when format changes)
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable envelope around a finished level
#[derive(Serialize, Deserialize)]
struct LevelSnapshot {
    version: u32,
    level: GeneratedLevel,
}

/// Write a level to a writer
pub fn encode_level<W: Write>(writer: W, level: &GeneratedLevel) -> Result<(), SnapshotError> {
    let snapshot = LevelSnapshot {
        version: SNAPSHOT_VERSION,
        level: level.clone(),
    };
    bincode::serialize_into(writer, &snapshot)?;
    Ok(())
}

/// Read a level from a reader
pub fn decode_level<R: Read>(reader: R) -> Result<GeneratedLevel, SnapshotError> {
    let snapshot: LevelSnapshot = bincode::deserialize_from(reader)?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::VersionMismatch {
            expected: SNAPSHOT_VERSION,
            found: snapshot.version,
        });
    }

    Ok(snapshot.level)
}

/// Encode a level into a fresh buffer
pub fn level_to_bytes(level: &GeneratedLevel) -> Result<Vec<u8>, SnapshotError> {
    let mut buffer = Vec::new();
    encode_level(&mut buffer, level)?;
    Ok(buffer)
}

/// Errors that can occur during snapshot encode/decode
#[derive(Debug)]
pub enum SnapshotError {
    Io(std::io::Error),
    Bincode(Box<bincode::ErrorKind>),
    VersionMismatch { expected: u32, found: u32 },
}

impl From<std::io::Error> for SnapshotError {
    fn from(e: std::io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SnapshotError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SnapshotError::Bincode(e)
    }
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "IO error: {}", e),
            SnapshotError::Bincode(e) => write!(f, "Serialization error: {}", e),
            SnapshotError::VersionMismatch { expected, found } => {
                write!(f, "Snapshot version mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

#[cfg(test)]
mod tests {
    use super::*;
    use pipegen_logic::prelude::*;

    fn minimal_level() -> GeneratedLevel {
        generate_level(&GenerateOptions {
            level: 1,
            play_space_size: 3,
            max_num_pipes: 1,
            max_junctions: 0,
            max_fixed: 0,
            max_blocks: 0,
            straight_cost: 10,
            corner_cost: 11,
        })
        .expect("minimal level generates")
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let level = minimal_level();
        let bytes = level_to_bytes(&level).expect("encode failed");
        println!("Snapshot size: {} bytes", bytes.len());

        let loaded = decode_level(&bytes[..]).expect("decode failed");
        assert_eq!(loaded, level);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let level = minimal_level();
        let mut bytes = level_to_bytes(&level).unwrap();
        // bincode writes the u32 version little-endian first.
        bytes[0] = bytes[0].wrapping_add(1);

        match decode_level(&bytes[..]) {
            Err(SnapshotError::VersionMismatch { expected, found }) => {
                assert_eq!(expected, SNAPSHOT_VERSION);
                assert_eq!(found, SNAPSHOT_VERSION + 1);
            }
            other => panic!("expected version mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_snapshot_is_an_error() {
        let bytes = level_to_bytes(&minimal_level()).unwrap();
        assert!(decode_level(&bytes[..bytes.len() / 2]).is_err());
    }
}
