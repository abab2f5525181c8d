//! DeltaFetch Middleware
//!
//! Ties a key store to the lifecycle of a crawl run.
//!
//! ## Lifecycle
//! 1. `from_config`: declines with `NotConfigured` when disabled
//! 2. `open_run`: opens `<directory>/<crawl>.db`, resetting if asked
//! 3. `process_output`: once per processed page
//! 4. `close_run`: releases the store

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::{Config, OptOutFlag, RunConfig, SyncStrategy};
use crate::error::{DeltaError, Result};
use crate::filter::{Classify, CrawlRequest, Fingerprinter, Output};
use crate::stats::StatsSink;
use crate::store::{KeyStore, StoreState};

/// Skips requests to pages already seen by previous runs of the same crawl
pub struct DeltaFetch<F> {
    directory: PathBuf,
    reset: bool,
    sync_strategy: SyncStrategy,
    opt_out: OptOutFlag,
    fingerprinter: F,
    stats: Option<Arc<dyn StatsSink>>,
    /// Open store of the current run
    store: Option<KeyStore>,
    /// Whether a run was ever opened
    opened: bool,
}

impl<F> DeltaFetch<F> {
    /// Create a middleware; the directory is not touched until `open_run`
    pub fn new(
        directory: impl Into<PathBuf>,
        reset: bool,
        fingerprinter: F,
        stats: Option<Arc<dyn StatsSink>>,
    ) -> Self {
        let config = Config::default();
        Self {
            directory: directory.into(),
            reset,
            sync_strategy: config.sync_strategy,
            opt_out: config.opt_out,
            fingerprinter,
            stats,
            store: None,
            opened: false,
        }
    }

    /// Build from settings
    ///
    /// Returns `NotConfigured` when the filter is disabled; the caller should
    /// skip installing it.
    pub fn from_config(
        config: &Config,
        fingerprinter: F,
        stats: Option<Arc<dyn StatsSink>>,
    ) -> Result<Self> {
        if !config.enabled {
            return Err(DeltaError::NotConfigured(
                "DeltaFetch is disabled".to_string(),
            ));
        }

        let mut middleware = Self::new(config.directory.clone(), config.reset, fingerprinter, stats);
        middleware.sync_strategy = config.sync_strategy;
        middleware.opt_out = config.opt_out;
        Ok(middleware)
    }

    /// Open the store for a run
    ///
    /// The run's reset flag is OR'd with the static one. A store left open by
    /// a previous run is closed first.
    pub fn open_run(&mut self, run: &RunConfig) -> Result<()> {
        self.close_run()?;

        let reset = self.reset || run.reset;
        let store = KeyStore::open_with(&self.directory, &run.crawl_name, reset, self.sync_strategy)?;
        self.store = Some(store);
        self.opened = true;
        Ok(())
    }

    /// Close the current run's store, if any
    pub fn close_run(&mut self) -> Result<()> {
        if let Some(mut store) = self.store.take() {
            debug!(crawl = store.crawl_name(), "Closing DeltaFetch run");
            store.close()?;
        }
        Ok(())
    }

    /// Filter the outputs produced while processing `origin`'s response
    ///
    /// Fails with `StoreClosed` outside an open run.
    pub fn process_output<'a, R, T, O, I>(
        &'a mut self,
        origin: &'a R,
        outputs: I,
    ) -> Result<Classify<'a, R, T, O, I::IntoIter, F>>
    where
        R: CrawlRequest,
        F: Fingerprinter<R>,
        I: IntoIterator<Item = Output<R, T, O>>,
    {
        let store = self.store.as_mut().ok_or(DeltaError::StoreClosed)?;
        Ok(Classify::new(
            store,
            &self.fingerprinter,
            self.opt_out,
            self.stats.as_deref(),
            origin,
            outputs.into_iter(),
        ))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn reset(&self) -> bool {
        self.reset
    }

    pub fn opt_out(&self) -> OptOutFlag {
        self.opt_out
    }

    pub fn store(&self) -> Option<&KeyStore> {
        self.store.as_ref()
    }

    pub fn store_state(&self) -> StoreState {
        match (&self.store, self.opened) {
            (Some(_), _) => StoreState::Open,
            (None, true) => StoreState::Closed,
            (None, false) => StoreState::Absent,
        }
    }
}
