//! # DeltaFetch
//!
//! A persistent deduplication cache for delta crawling:
//! - One crash-tolerant key store file per named crawl
//! - Self-healing open (corrupt files are recreated, torn tails dropped)
//! - A lazy filter that drops requests already seen in previous runs and
//!   records pages that produced data
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Crawl Engine                           │
//! │        (fingerprints, requests, records, run lifecycle)     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ outputs of one page
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                DeltaFetch / DedupFilter                     │
//! │          (lazy classify: skip, store, pass through)         │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ contains / put
//!                       ▼
//!                ┌─────────────┐          ┌─────────────┐
//!                │  KeyStore   │─────────▶│ <crawl>.db  │
//!                │  (index)    │  append  │ (CRC log)   │
//!                └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod store;
pub mod filter;
pub mod stats;
pub mod middleware;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DeltaError, Result};
pub use config::{Config, OptOutFlag, RunConfig, SyncStrategy};
pub use filter::{Classify, CrawlRequest, DedupFilter, DeltaKey, Fingerprinter, Output, Request, RequestMeta};
pub use middleware::DeltaFetch;
pub use stats::{MemoryStats, StatsSink};
pub use store::{KeyStore, StoreState};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of DeltaFetch
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
