//! Stats Module
//!
//! Counters reported to an optional, externally owned stats sink.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Requests dropped because their key was already stored
pub const SKIPPED: &str = "deltafetch/skipped";

/// Page keys written because the page produced a record
pub const STORED: &str = "deltafetch/stored";

/// Destination for monotonically increasing counters
pub trait StatsSink: Send + Sync {
    fn inc_value(&self, key: &str, count: u64);
}

/// In-memory stats sink
#[derive(Debug, Default)]
pub struct MemoryStats {
    values: Mutex<HashMap<String, u64>>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, `None` if never incremented
    pub fn get_value(&self, key: &str) -> Option<u64> {
        self.values.lock().get(key).copied()
    }

    /// Copy of all counters
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.values.lock().clone()
    }
}

impl StatsSink for MemoryStats {
    fn inc_value(&self, key: &str, count: u64) {
        *self.values.lock().entry(key.to_string()).or_insert(0) += count;
    }
}
