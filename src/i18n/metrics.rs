//! Translation metrics and observability module.
//!
//! Counters are owned by a translation engine instance rather than a
//! process global, so tests can assert on exact counts.

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Translation counters for one engine.
#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Number of times a translation was found in cache
    cache_hits: AtomicUsize,

    /// Number of times a translation was not found in cache
    cache_misses: AtomicUsize,

    /// Number of cache operations that errored (backend down or dropped)
    cache_errors: AtomicUsize,

    /// Number of external translation attempts, each retry counted separately
    api_calls: AtomicUsize,

    /// Number of external translation attempts that ended in an error
    api_failures: AtomicUsize,

    /// Number of translations abandoned at the overall timeout
    timeouts: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_error(&self) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_call(&self) {
        self.api_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_api_failure(&self) {
        self.api_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn cache_errors(&self) -> usize {
        self.cache_errors.load(Ordering::Relaxed)
    }

    pub fn api_calls(&self) -> usize {
        self.api_calls.load(Ordering::Relaxed)
    }

    pub fn api_failures(&self) -> usize {
        self.api_failures.load(Ordering::Relaxed)
    }

    pub fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let total_cache_queries = hits + misses;
        let cache_hit_rate = if total_cache_queries > 0 {
            (hits as f64 / total_cache_queries as f64) * 100.0
        } else {
            0.0
        };

        let calls = self.api_calls();
        // Timeouts and failures are disjoint outcomes of a call
        let failed = (self.api_failures() + self.timeouts()).min(calls);
        let api_success_rate = if calls > 0 {
            ((calls - failed) as f64 / calls as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_errors: self.cache_errors(),
            cache_hit_rate,
            api_calls: calls,
            api_failures: self.api_failures(),
            timeouts: self.timeouts(),
            api_success_rate,
        }
    }
}

/// Metrics report containing current translation statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_errors: usize,

    /// Cache hit rate as a percentage (0-100)
    pub cache_hit_rate: f64,

    pub api_calls: usize,
    pub api_failures: usize,
    pub timeouts: usize,

    /// API success rate as a percentage (0-100)
    pub api_success_rate: f64,
}
