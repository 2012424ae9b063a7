//! Reader for the subset of the RDB snapshot format this server supports:
//! short string keys and values with optional expiry opcodes.

use std::path::{Path, PathBuf};

const KEYSPACE_START_OPCODE: u8 = 0xFB;
const STRING_VALUE_OPCODE: u8 = 0x00;
const EXPIRY_MILLISECONDS_OPCODE: u8 = 0xFC;
const EXPIRY_SECONDS_OPCODE: u8 = 0xFD;

const EMPTY_SNAPSHOT_HEX: &str = "524544495330303131fa0972656469732d76657205372e322e30fa0a7265\
6469732d62697473c040fa056374696d65c26d08bc65fa08757365642d6d656dc2b0c41000fa08616f662d62617365c0\
00fff06e3bfec0ff5aa2";

/// Serialized empty snapshot, sent to replicas during a full resync.
pub fn empty_snapshot() -> Vec<u8> {
    hex::decode(EMPTY_SNAPSHOT_HEX).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub key: String,
    pub value: String,
    /// Absolute expiry in epoch milliseconds.
    pub expires_at_milliseconds: Option<u64>,
}

impl SnapshotRecord {
    pub fn is_valid(&self, now_milliseconds: u64) -> bool {
        match self.expires_at_milliseconds {
            Some(expires_at) => now_milliseconds < expires_at,
            None => true,
        }
    }
}

/// Re-reads the snapshot file on every call so concurrent readers never
/// share parser state. A missing or unreadable file is an empty database.
#[derive(Debug)]
pub struct SnapshotReader {
    path: PathBuf,
}

impl SnapshotReader {
    pub fn new(directory: &str, filename: &str) -> Self {
        SnapshotReader {
            path: Path::new(directory).join(filename),
        }
    }

    pub fn read_records(&self) -> Vec<SnapshotRecord> {
        match std::fs::read(&self.path) {
            Ok(bytes) => parse_records(&bytes),
            Err(_) => Vec::new(),
        }
    }

    /// Value for `key`, skipping records whose expiry has passed.
    pub fn read_valid_value(&self, key: &str, now_milliseconds: u64) -> Option<String> {
        self.read_records()
            .into_iter()
            .find(|record| record.key == key)
            .filter(|record| record.is_valid(now_milliseconds))
            .map(|record| record.value)
    }
}

/// Length-prefixed string whose length fits in the low six bits of a single
/// byte. Any other length encoding ends the parse.
fn read_short_string(bytes: &[u8], cursor: usize) -> Option<(String, usize)> {
    let length_byte = *bytes.get(cursor)?;

    if length_byte >> 6 != 0b00 {
        return None;
    }

    let length = (length_byte & 0x3F) as usize;
    let end = cursor + 1 + length;
    let content = bytes.get(cursor + 1..end)?;
    let content = String::from_utf8(content.to_vec()).ok()?;

    Some((content, end))
}

fn parse_records(bytes: &[u8]) -> Vec<SnapshotRecord> {
    // skip header and metadata up to the keyspace marker
    let mut cursor = 0;
    while cursor < bytes.len() && bytes[cursor] != KEYSPACE_START_OPCODE {
        cursor += 1;
    }

    if cursor >= bytes.len() {
        return Vec::new();
    }

    // marker plus the two hash table size bytes
    cursor += 3;

    let mut records = Vec::new();
    let mut pending_expiry: Option<u64> = None;

    while cursor < bytes.len() {
        let opcode = bytes[cursor];
        cursor += 1;

        match opcode {
            STRING_VALUE_OPCODE => {
                let Some((key, after_key)) = read_short_string(bytes, cursor) else {
                    break;
                };
                let Some((value, after_value)) = read_short_string(bytes, after_key) else {
                    break;
                };

                cursor = after_value;
                records.push(SnapshotRecord {
                    key,
                    value,
                    expires_at_milliseconds: pending_expiry.take(),
                });
            }
            EXPIRY_MILLISECONDS_OPCODE => {
                let Some(raw) = bytes.get(cursor..cursor + 8) else {
                    break;
                };
                let Ok(raw) = <[u8; 8]>::try_from(raw) else {
                    break;
                };

                pending_expiry = Some(u64::from_le_bytes(raw));
                cursor += 8;
            }
            EXPIRY_SECONDS_OPCODE => {
                let Some(raw) = bytes.get(cursor..cursor + 4) else {
                    break;
                };
                let Ok(raw) = <[u8; 4]>::try_from(raw) else {
                    break;
                };

                pending_expiry = Some(u64::from(u32::from_le_bytes(raw)) * 1000);
                cursor += 4;
            }
            // anything else is an unsupported section, stop here
            _ => break,
        }
    }

    records
}
