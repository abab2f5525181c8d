//! Store Recovery
//!
//! Rebuilds the in-memory index by replaying a store file.
//!
//! A crash mid-append leaves an incomplete final entry (a torn tail). That
//! entry is dropped and everything before it is kept. Damage anywhere else
//! means the file cannot be trusted and is reported as `StorageCorrupt`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{DeltaError, Result};

use super::{Entry, ENTRY_HEADER_SIZE, FILE_HEADER_SIZE, MAGIC, MAX_ENTRY_SIZE, VERSION};

/// In-memory view of a store: key → value
pub type Index = HashMap<Vec<u8>, Vec<u8>>;

/// Replays store files
pub struct StoreRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries replayed
    pub entries_recovered: u64,

    /// Replayed entries later superseded by a newer entry for the same key
    pub stale_entries: u64,

    /// Length of the valid prefix of the file
    pub valid_len: u64,

    /// Whether a torn tail was found past `valid_len`
    pub torn_tail: bool,
}

impl StoreRecovery {
    /// Replay a store file into an index
    ///
    /// Does not modify the file; the writer cuts the torn tail when it
    /// reopens at `valid_len`.
    pub fn recover(path: &Path) -> Result<(Index, RecoveryResult)> {
        let data = fs::read(path)?;
        Self::replay(&data)
    }

    /// Check a store file without building an index
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Self::recover(path).map(|(_, result)| result)
    }

    /// Replay an in-memory copy of a store file
    pub fn replay(data: &[u8]) -> Result<(Index, RecoveryResult)> {
        Self::check_header(data)?;

        let mut index = Index::new();
        let mut result = RecoveryResult::default();
        let mut pos = FILE_HEADER_SIZE as usize;

        while pos < data.len() {
            let remaining = data.len() - pos;
            if remaining < ENTRY_HEADER_SIZE {
                result.torn_tail = true;
                break;
            }

            let crc = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
            let len = u32::from_le_bytes(data[pos + 4..pos + 8].try_into().unwrap());
            if len > MAX_ENTRY_SIZE {
                return Err(DeltaError::StorageCorrupt(format!(
                    "entry at offset {} claims {} bytes",
                    pos, len
                )));
            }

            let start = pos + ENTRY_HEADER_SIZE;
            let end = start + len as usize;
            if end > data.len() {
                result.torn_tail = true;
                break;
            }

            let payload = &data[start..end];
            if Entry::compute_crc(payload) != crc {
                if end == data.len() {
                    // Final entry only partially reached the disk
                    result.torn_tail = true;
                    break;
                }
                return Err(DeltaError::StorageCorrupt(format!(
                    "CRC mismatch at offset {}",
                    pos
                )));
            }

            let entry = Entry::deserialize(payload).map_err(|e| {
                DeltaError::StorageCorrupt(format!("undecodable entry at offset {}: {}", pos, e))
            })?;

            if index.insert(entry.key, entry.value).is_some() {
                result.stale_entries += 1;
            }
            result.entries_recovered += 1;
            pos = end;
        }

        result.valid_len = pos as u64;
        Ok((index, result))
    }

    fn check_header(data: &[u8]) -> Result<()> {
        if data.len() < FILE_HEADER_SIZE as usize {
            return Err(DeltaError::StorageCorrupt(format!(
                "file is {} bytes, shorter than the header",
                data.len()
            )));
        }

        if &data[0..4] != MAGIC {
            return Err(DeltaError::StorageCorrupt(format!(
                "invalid magic: expected DFKV, got {:?}",
                &data[0..4]
            )));
        }

        let version = u16::from_le_bytes(data[4..6].try_into().unwrap());
        if version != VERSION {
            return Err(DeltaError::StorageCorrupt(format!(
                "unsupported store version: {}",
                version
            )));
        }

        Ok(())
    }
}
