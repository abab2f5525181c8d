//! Configuration for DeltaFetch
//!
//! Centralized configuration with sensible defaults.

use std::env;
use std::path::PathBuf;

use crate::error::{DeltaError, Result};

/// Main configuration for a DeltaFetch installation
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Activation
    // -------------------------------------------------------------------------
    /// Whether the filter is installed at all
    pub enabled: bool,

    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory holding one store file per crawl
    /// Internal structure:
    ///   {directory}/
    ///     ├── {crawl}.db           (key store)
    ///     └── {crawl}.db.compact   (only while compacting)
    pub directory: PathBuf,

    /// Truncate every crawl's store when it is opened
    pub reset: bool,

    /// Sync strategy: how often to fsync the store file
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Filter Configuration
    // -------------------------------------------------------------------------
    /// Which request metadata flag exempts a request from suppression
    pub opt_out: OptOutFlag,
}

/// Store sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Polarity of the per-request opt-out flag.
///
/// Both conventions exist in deployed crawlers, so neither is hard-coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptOutFlag {
    /// Dedup is on unless the request sets `dedup_enabled = false`
    #[default]
    DedupEnabledFalse,

    /// Dedup is on unless the request sets `ignore = true`
    IgnoreTrue,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from(Self::DEFAULT_DIR),
            reset: false,
            sync_strategy: SyncStrategy::EveryNEntries { count: 100 },
            opt_out: OptOutFlag::default(),
        }
    }
}

impl Config {
    /// Default store directory, relative to the working directory
    pub const DEFAULT_DIR: &'static str = ".deltafetch";

    pub const ENV_ENABLED: &'static str = "DELTAFETCH_ENABLED";
    pub const ENV_DIR: &'static str = "DELTAFETCH_DIR";
    pub const ENV_RESET: &'static str = "DELTAFETCH_RESET";

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load the settings recognized in the environment on top of the defaults
    ///
    /// Unset variables keep their default; malformed booleans are rejected.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env`, reading values through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(raw) = lookup(Self::ENV_ENABLED) {
            config.enabled = parse_bool(Self::ENV_ENABLED, &raw)?;
        }
        if let Some(raw) = lookup(Self::ENV_DIR) {
            if !raw.trim().is_empty() {
                config.directory = PathBuf::from(raw);
            }
        }
        if let Some(raw) = lookup(Self::ENV_RESET) {
            config.reset = parse_bool(Self::ENV_RESET, &raw)?;
        }

        Ok(config)
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(DeltaError::Config(format!(
            "{} expects a boolean, got {:?}",
            name, other
        ))),
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Enable or disable the filter
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Set the store directory
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.directory = path.into();
        self
    }

    /// Set the static reset flag
    pub fn reset(mut self, reset: bool) -> Self {
        self.config.reset = reset;
        self
    }

    /// Set the store sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the opt-out flag polarity
    pub fn opt_out(mut self, flag: OptOutFlag) -> Self {
        self.config.opt_out = flag;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Per-run settings, resolved once before the store is opened
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Name of the crawl; selects the store file
    pub crawl_name: String,

    /// Reset this crawl's store regardless of `Config::reset`
    pub reset: bool,
}

impl RunConfig {
    pub fn new(crawl_name: impl Into<String>) -> Self {
        Self {
            crawl_name: crawl_name.into(),
            reset: false,
        }
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }
}
