//! KeyStore
//!
//! The crawl-scoped store handle: lifecycle, recovery and point operations.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::SyncStrategy;
use crate::error::{DeltaError, Result};

use super::recovery::Index;
use super::{OpenMode, RecoveryResult, StoreRecovery, StoreState, StoreWriter, DB_EXTENSION};

/// Compaction on close only kicks in past this many superseded entries
pub const COMPACT_MIN_STALE: u64 = 1024;

/// Persistent key store for one named crawl
///
/// ## Lifecycle
///
/// `open` → get/put/contains/keys → `close`. After `close` every operation
/// fails with `StoreClosed`; reopening means calling `open` again, which
/// returns a new handle.
///
/// ## Ownership
///
/// One handle owns the file. Reads take `&self`, writes take `&mut self`, so
/// the borrow checker enforces the single-writer rule within a process.
pub struct KeyStore {
    crawl_name: String,
    path: PathBuf,
    sync_strategy: SyncStrategy,
    /// What replay found when the handle was opened
    recovery: RecoveryResult,
    /// `None` once closed
    inner: Option<OpenStore>,
}

/// Resources held while the store is open
struct OpenStore {
    writer: StoreWriter,
    index: Index,
    /// Entries in the file shadowed by a later entry for the same key
    stale: u64,
}

impl KeyStore {
    /// Open or create the store for `crawl_name` under `directory`
    ///
    /// Uses the default sync strategy.
    pub fn open(directory: &Path, crawl_name: &str, reset: bool) -> Result<Self> {
        Self::open_with(
            directory,
            crawl_name,
            reset,
            SyncStrategy::EveryNEntries { count: 100 },
        )
    }

    /// Open or create the store with an explicit sync strategy
    ///
    /// On open:
    /// 1. Create `directory` (and parents) if missing
    /// 2. Open `<directory>/<crawl_name>.db`, truncating when `reset`
    /// 3. If that fails for any reason, delete the file and create it empty
    ///
    /// Only a failure of step 1 or of the recreate is returned.
    pub fn open_with(
        directory: &Path,
        crawl_name: &str,
        reset: bool,
        sync_strategy: SyncStrategy,
    ) -> Result<Self> {
        fs::create_dir_all(directory).map_err(|e| DeltaError::StorageUnavailable {
            path: directory.to_path_buf(),
            reason: e.to_string(),
        })?;

        let path = Self::db_path(directory, crawl_name);
        let mode = if reset { OpenMode::Truncate } else { OpenMode::Create };

        let (store, recovery) = match OpenStore::open(&path, mode, sync_strategy) {
            Ok(opened) => opened,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to open DeltaFetch store, trying to recreate it"
                );
                Self::recreate(&path, sync_strategy)?
            }
        };

        if recovery.torn_tail {
            warn!(
                path = %path.display(),
                valid_len = recovery.valid_len,
                "Dropped incomplete entry at end of DeltaFetch store"
            );
        }

        info!(
            crawl = crawl_name,
            path = %path.display(),
            reset,
            keys = store.index.len(),
            "Opened DeltaFetch store"
        );

        Ok(Self {
            crawl_name: crawl_name.to_string(),
            path,
            sync_strategy,
            recovery,
            inner: Some(store),
        })
    }

    /// Path of the store file for a crawl
    pub fn db_path(directory: &Path, crawl_name: &str) -> PathBuf {
        directory.join(format!("{}.{}", crawl_name, DB_EXTENSION))
    }

    fn recreate(path: &Path, sync_strategy: SyncStrategy) -> Result<(OpenStore, RecoveryResult)> {
        let unavailable = |e: DeltaError| DeltaError::StorageUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        if path.exists() {
            fs::remove_file(path).map_err(|e| unavailable(e.into()))?;
        }
        OpenStore::open(path, OpenMode::Create, sync_strategy).map_err(unavailable)
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Get a value by key; an unknown key is `Ok(None)`
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.open_store()?.index.get(key).cloned())
    }

    /// Insert or overwrite a key
    ///
    /// The entry is appended to the file before the index is updated.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let store = self.open_store_mut()?;
        store.writer.append(key, value)?;
        if store.index.insert(key.to_vec(), value.to_vec()).is_some() {
            store.stale += 1;
        }
        Ok(())
    }

    /// Check whether a key is present
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.open_store()?.index.contains_key(key))
    }

    /// All keys, sorted
    pub fn keys(&self) -> Result<BTreeSet<Vec<u8>>> {
        Ok(self.open_store()?.index.keys().cloned().collect())
    }

    /// All entries, sorted by key
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut entries: Vec<_> = self
            .open_store()?
            .index
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort();
        Ok(entries)
    }

    /// Number of live keys
    pub fn len(&self) -> Result<usize> {
        Ok(self.open_store()?.index.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Force buffered entries to disk
    pub fn sync(&mut self) -> Result<()> {
        self.open_store_mut()?.writer.sync()
    }

    /// Rewrite the file with live entries only
    pub fn compact(&mut self) -> Result<()> {
        let path = self.path.clone();
        let sync_strategy = self.sync_strategy;
        self.open_store_mut()?.compact(&path, sync_strategy)
    }

    /// Close the store
    ///
    /// Compacts when superseded entries dominate, then syncs and releases the
    /// file. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut store) = self.inner.take() else {
            return Ok(());
        };

        if store.stale > COMPACT_MIN_STALE && store.stale > store.index.len() as u64 {
            store.compact(&self.path, self.sync_strategy)?;
        }
        store.writer.sync()?;

        debug!(
            crawl = %self.crawl_name,
            keys = store.index.len(),
            "Closed DeltaFetch store"
        );
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> StoreState {
        if self.inner.is_some() {
            StoreState::Open
        } else {
            StoreState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn crawl_name(&self) -> &str {
        &self.crawl_name
    }

    /// Replay statistics from when the handle was opened
    pub fn recovery(&self) -> &RecoveryResult {
        &self.recovery
    }

    /// Superseded entries still present in the file
    pub fn stale_entries(&self) -> Result<u64> {
        Ok(self.open_store()?.stale)
    }

    fn open_store(&self) -> Result<&OpenStore> {
        self.inner.as_ref().ok_or(DeltaError::StoreClosed)
    }

    fn open_store_mut(&mut self) -> Result<&mut OpenStore> {
        self.inner.as_mut().ok_or(DeltaError::StoreClosed)
    }
}

impl Drop for KeyStore {
    fn drop(&mut self) {
        if let Some(store) = self.inner.as_mut() {
            if let Err(e) = store.writer.sync() {
                warn!(path = %self.path.display(), error = %e, "Failed to sync DeltaFetch store on drop");
            }
        }
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("crawl_name", &self.crawl_name)
            .field("path", &self.path)
            .field("state", &self.state())
            .finish()
    }
}

impl OpenStore {
    fn open(path: &Path, mode: OpenMode, sync_strategy: SyncStrategy) -> Result<(Self, RecoveryResult)> {
        if mode == OpenMode::Truncate || !path.exists() {
            let writer = StoreWriter::create(path, sync_strategy)?;
            let recovery = RecoveryResult {
                valid_len: writer.offset(),
                ..RecoveryResult::default()
            };
            let store = Self {
                writer,
                index: Index::new(),
                stale: 0,
            };
            return Ok((store, recovery));
        }

        let (index, recovery) = StoreRecovery::recover(path)?;
        let writer = StoreWriter::open_append(path, recovery.valid_len, sync_strategy)?;
        let store = Self {
            writer,
            index,
            stale: recovery.stale_entries,
        };
        Ok((store, recovery))
    }

    /// Write live entries to a side file, then atomically swap it in
    ///
    /// The side file is removed again if anything fails before the swap.
    fn compact(&mut self, path: &Path, sync_strategy: SyncStrategy) -> Result<()> {
        let before = self.writer.offset();
        self.writer.sync()?;

        let tmp = path.with_extension(format!("{}.compact", DB_EXTENSION));
        let swapped = self
            .write_live_entries(&tmp)
            .and_then(|()| fs::rename(&tmp, path).map_err(DeltaError::from));
        if let Err(e) = swapped {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                warn!(path = %tmp.display(), error = %cleanup, "Failed to remove compaction file");
            }
            return Err(e);
        }
        sync_parent_dir(path)?;

        let len = fs::metadata(path)?.len();
        self.writer = StoreWriter::open_append(path, len, sync_strategy)?;
        self.stale = 0;

        debug!(
            path = %path.display(),
            before,
            after = len,
            "Compacted DeltaFetch store"
        );
        Ok(())
    }

    fn write_live_entries(&self, tmp: &Path) -> Result<()> {
        let mut writer = StoreWriter::create(tmp, SyncStrategy::EveryNEntries { count: usize::MAX })?;
        let mut keys: Vec<&Vec<u8>> = self.index.keys().collect();
        keys.sort();
        for key in keys {
            writer.append(key, &self.index[key])?;
        }
        writer.sync()
    }
}

/// Persist a rename by syncing the directory that holds `path`
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}
