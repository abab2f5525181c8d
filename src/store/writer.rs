//! Store Writer
//!
//! Handles appending entries to the store file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::SyncStrategy;
use crate::error::{DeltaError, Result};

use super::{file_header, Entry, FILE_HEADER_SIZE};

/// Appends entries to a store file
pub struct StoreWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    sync_strategy: SyncStrategy,
    /// Entries appended since the last sync
    unsynced: usize,
    /// Logical end of file (including buffered bytes)
    offset: u64,
    /// Set when a failed append could not be rolled back
    poisoned: bool,
}

impl StoreWriter {
    /// Create a fresh store file, discarding any existing content
    pub fn create(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);
        writer.write_all(&file_header())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            sync_strategy,
            unsynced: 0,
            offset: FILE_HEADER_SIZE,
            poisoned: false,
        })
    }

    /// Reopen an existing, already validated store file for appending
    ///
    /// Anything past `valid_len` (a torn tail) is cut off first.
    pub fn open_append(path: &Path, valid_len: u64, sync_strategy: SyncStrategy) -> Result<Self> {
        let mut file = OpenOptions::new().write(true).open(path)?;

        if file.metadata()?.len() != valid_len {
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(valid_len))?;

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            sync_strategy,
            unsynced: 0,
            offset: valid_len,
            poisoned: false,
        })
    }

    /// Append a key/value entry, returns the offset it was written at
    ///
    /// A failed write leaves the file ending at the last complete entry.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<u64> {
        if self.poisoned {
            return Err(DeltaError::StorageUnavailable {
                path: self.path.clone(),
                reason: "an earlier append could not be rolled back".to_string(),
            });
        }

        let frame = Entry::encode(key, value)?;
        let at = self.offset;

        if let Err(e) = self.writer.write_all(&frame) {
            if let Err(rollback) = self.rollback() {
                warn!(path = %self.path.display(), error = %rollback, "Failed to roll back partial append");
                self.poisoned = true;
            }
            return Err(e.into());
        }
        self.offset += frame.len() as u64;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.unsynced >= count.max(1),
        };
        if due {
            self.sync()?;
        }

        Ok(at)
    }

    /// Drop any partial frame, keeping everything up to `offset`
    ///
    /// Buffered bytes that belong to complete entries are written out; the
    /// rest is discarded and the file is cut back to `offset`.
    fn rollback(&mut self) -> Result<()> {
        let file = self.writer.get_ref().try_clone()?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        let (mut file, buffered) = stale.into_parts();
        let buffered = buffered.unwrap_or_else(|panicked| panicked.into_inner());

        let written = file.stream_position()?;
        let keep = (self.offset.saturating_sub(written) as usize).min(buffered.len());
        file.write_all(&buffered[..keep])?;
        file.set_len(self.offset)?;
        file.seek(SeekFrom::Start(self.offset))?;
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Logical size of the file, including unflushed bytes
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Entries written but not yet synced
    pub fn unsynced(&self) -> usize {
        self.unsynced
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
