//! Key Store Module
//!
//! Persistent, crash-tolerant mapping from opaque keys to opaque values,
//! one file per crawl.
//!
//! ## Responsibilities
//! - Open/create the store file, with optional reset (truncate)
//! - Self-heal on corruption: delete and recreate instead of failing
//! - Point lookups from an in-memory index, appends for writes
//! - Compaction of superseded entries
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Header (8 bytes)                        │
//! │ ┌──────────┬───────────┬──────────────┐ │
//! │ │Magic (4) │Version (2)│ Reserved (2) │ │
//! │ └──────────┴───────────┴──────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ CRC (4) │ Len (4) │ Data (bincode)  │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2 ...                             │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Later entries for a key supersede earlier ones.

mod entry;
mod keystore;
mod recovery;
mod writer;

pub use entry::{Entry, ENTRY_HEADER_SIZE, MAX_ENTRY_SIZE};
pub use keystore::KeyStore;
pub use recovery::{RecoveryResult, StoreRecovery};
pub use writer::StoreWriter;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying a DeltaFetch store file
pub const MAGIC: &[u8; 4] = b"DFKV";

/// Current store format version
pub const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + Reserved (2) = 8 bytes
pub const FILE_HEADER_SIZE: u64 = 8;

/// Extension of store files
pub const DB_EXTENSION: &str = "db";

/// Encode the fixed file header
pub(crate) fn file_header() -> [u8; FILE_HEADER_SIZE as usize] {
    let mut header = [0u8; FILE_HEADER_SIZE as usize];
    header[0..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&VERSION.to_le_bytes());
    header
}

/// Lifecycle state of a store handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Never opened
    Absent,
    /// Usable for get/put/contains/keys
    Open,
    /// Released; must be reopened as a new handle
    Closed,
}

/// How the store file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Reuse the existing file, creating it when missing
    Create,
    /// Discard any existing content
    Truncate,
}
