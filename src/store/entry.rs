//! Store entry definitions
//!
//! Defines the structure and framing of individual store entries.

use serde::{Deserialize, Serialize};

use crate::error::{DeltaError, Result};

/// Entry header size: CRC (4) + Len (4) = 8 bytes
pub const ENTRY_HEADER_SIZE: usize = 8;

/// Maximum encoded payload size (16 MB)
pub const MAX_ENTRY_SIZE: u32 = 16 * 1024 * 1024;

/// A single key/value entry in the store file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Borrowed twin of `Entry`, encodes identically
#[derive(Serialize)]
struct EntryRef<'a> {
    key: &'a [u8],
    value: &'a [u8],
}

impl Entry {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    /// Encode a framed entry: [crc(4)][len(4)][data]
    pub fn encode(key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
        let data = bincode::serialize(&EntryRef { key, value })?;
        if data.len() > MAX_ENTRY_SIZE as usize {
            return Err(DeltaError::Serialization(format!(
                "entry of {} bytes exceeds the {} byte limit",
                data.len(),
                MAX_ENTRY_SIZE
            )));
        }

        let mut frame = Vec::with_capacity(ENTRY_HEADER_SIZE + data.len());
        frame.extend_from_slice(&Self::compute_crc(&data).to_le_bytes());
        frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
        frame.extend_from_slice(&data);
        Ok(frame)
    }

    /// Encode this entry as a frame
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Self::encode(&self.key, &self.value)
    }

    /// Decode the data section of a frame (CRC already checked by the caller)
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }

    pub fn compute_crc(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}
