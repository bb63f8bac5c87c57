//! Pipeline Statistics Module
//!
//! Tracks cache effectiveness and generation outcomes for one namespace.

use serde::Serialize;

// == Pipeline Stats ==
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Requests served straight from the cache
    pub hits: u64,
    /// Lookups that found nothing (or were skipped after a lookup error)
    pub misses: u64,
    /// Cache lookups that failed with an I/O error
    pub lookup_errors: u64,
    /// Artifacts produced by the generator
    pub generated: u64,
    /// Generations that had to use the fallback template
    pub fallbacks: u64,
    /// Artifacts written back to the cache
    pub stored: u64,
    pub store_failures: u64,
    /// Re-encodes that failed, causing raw bytes to be stored
    pub compression_failures: u64,
}

impl PipelineStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// A failed lookup also counts as a miss, since the request regenerates.
    pub fn record_lookup_error(&mut self) {
        self.lookup_errors += 1;
        self.misses += 1;
    }

    pub fn record_generated(&mut self) {
        self.generated += 1;
    }

    pub fn record_fallback(&mut self) {
        self.fallbacks += 1;
    }

    pub fn record_stored(&mut self) {
        self.stored += 1;
    }

    pub fn record_store_failure(&mut self) {
        self.store_failures += 1;
    }

    pub fn record_compression_failure(&mut self) {
        self.compression_failures += 1;
    }
}
