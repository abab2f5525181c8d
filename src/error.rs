//! Error types for DeltaFetch
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using DeltaError
pub type Result<T> = std::result::Result<T, DeltaError>;

/// Unified error type for DeltaFetch operations
#[derive(Debug, Error)]
pub enum DeltaError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    /// Raised by recovery when a store file cannot be parsed. `KeyStore::open`
    /// handles it by recreating the file; callers never see it from there.
    #[error("Store corruption detected: {0}")]
    StorageCorrupt(String),

    #[error("Store unavailable at {}: {reason}", .path.display())]
    StorageUnavailable { path: PathBuf, reason: String },

    #[error("Store is closed")]
    StoreClosed,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    /// The filter declined to be installed (e.g. disabled in settings).
    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for DeltaError {
    fn from(e: bincode::Error) -> Self {
        DeltaError::Serialization(e.to_string())
    }
}
