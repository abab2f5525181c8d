//! Filter Module
//!
//! Classifies the outputs of a page-processing step against the key store.
//!
//! ## Rules
//! - Outgoing request: dropped when its key is already stored, unless the
//!   request opts out of dedup
//! - Produced record: the originating request's key is stored with a
//!   timestamp; the record always passes
//! - Anything else passes untouched
//!
//! A request's key is its explicit `deltafetch_key` when set and non-empty,
//! otherwise the caller-supplied fingerprint.

mod classify;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::OptOutFlag;

pub use classify::{Classify, DedupFilter};

/// One output of a page-processing step, tagged by the crawl engine
///
/// Pass-through values may have their own type `O`; it defaults to the
/// record type.
#[derive(Debug, Clone, PartialEq)]
pub enum Output<R, T, O = T> {
    /// A follow-up fetch
    Request(R),
    /// Extracted data
    Record(T),
    /// Anything else; passed through
    Other(O),
}

/// Explicit dedup key carried in request metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaKey {
    Bytes(Vec<u8>),
    Text(String),
}

impl DeltaKey {
    /// Normalize to bytes (text is UTF-8 encoded)
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            DeltaKey::Bytes(bytes) => bytes,
            DeltaKey::Text(text) => text.into_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            DeltaKey::Bytes(bytes) => bytes,
            DeltaKey::Text(text) => text.as_bytes(),
        }
    }
}

impl From<&str> for DeltaKey {
    fn from(s: &str) -> Self {
        DeltaKey::Text(s.to_string())
    }
}

impl From<String> for DeltaKey {
    fn from(s: String) -> Self {
        DeltaKey::Text(s)
    }
}

impl From<Vec<u8>> for DeltaKey {
    fn from(bytes: Vec<u8>) -> Self {
        DeltaKey::Bytes(bytes)
    }
}

impl From<&[u8]> for DeltaKey {
    fn from(bytes: &[u8]) -> Self {
        DeltaKey::Bytes(bytes.to_vec())
    }
}

/// Per-request overrides read by the filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    /// Overrides the fingerprint as the dedup key
    pub deltafetch_key: Option<DeltaKey>,

    /// `Some(false)` opts out under `OptOutFlag::DedupEnabledFalse`
    pub dedup_enabled: Option<bool>,

    /// `Some(true)` opts out under `OptOutFlag::IgnoreTrue`
    pub ignore: Option<bool>,
}

/// A request as seen by the filter
pub trait CrawlRequest {
    fn meta(&self) -> &RequestMeta;
}

/// Canonical fingerprint of a request, supplied by the crawl engine
pub trait Fingerprinter<R: ?Sized> {
    fn fingerprint(&self, request: &R) -> Vec<u8>;
}

impl<R: ?Sized, F> Fingerprinter<R> for F
where
    F: Fn(&R) -> Vec<u8>,
{
    fn fingerprint(&self, request: &R) -> Vec<u8> {
        self(request)
    }
}

/// Key a request is looked up and stored under
pub fn request_key<R, F>(request: &R, fingerprinter: &F) -> Vec<u8>
where
    R: CrawlRequest + ?Sized,
    F: Fingerprinter<R> + ?Sized,
{
    match &request.meta().deltafetch_key {
        Some(key) if !key.as_bytes().is_empty() => key.as_bytes().to_vec(),
        _ => fingerprinter.fingerprint(request),
    }
}

impl OptOutFlag {
    /// Whether `meta` exempts its request from suppression
    pub fn exempts(&self, meta: &RequestMeta) -> bool {
        match self {
            OptOutFlag::DedupEnabledFalse => meta.dedup_enabled == Some(false),
            OptOutFlag::IgnoreTrue => meta.ignore == Some(true),
        }
    }
}

/// Value stored for a key: seconds since the epoch, e.g. `1700000000.123456`
pub fn timestamp_value() -> Vec<u8> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros()).into_bytes()
}

// =============================================================================
// Plain Request
// =============================================================================

/// A minimal request type for callers without their own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub body: Vec<u8>,
    pub meta: RequestMeta,
}

impl Request {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            body: Vec::new(),
            meta: RequestMeta::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the explicit dedup key
    pub fn with_key(mut self, key: impl Into<DeltaKey>) -> Self {
        self.meta.deltafetch_key = Some(key.into());
        self
    }

    pub fn with_dedup_enabled(mut self, enabled: bool) -> Self {
        self.meta.dedup_enabled = Some(enabled);
        self
    }

    pub fn with_ignore(mut self, ignore: bool) -> Self {
        self.meta.ignore = Some(ignore);
        self
    }
}

impl CrawlRequest for Request {
    fn meta(&self) -> &RequestMeta {
        &self.meta
    }
}
