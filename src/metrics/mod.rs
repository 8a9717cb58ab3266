//! Metrics collection module
//!
//! Side-channel counters for the dispatch engine. The fail-open fallback is
//! only observable here: a backend failure and a genuine zero-match both
//! return an empty sequence to the caller.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

const LATENCY_WINDOW: usize = 100;

/// Dispatch counters
#[derive(Default)]
pub struct SuggestMetrics {
    requests: AtomicU64,
    short_queries: AtomicU64,
    defaults_served: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_bypass: AtomicU64,
    results_returned: AtomicU64,
    backend_calls: AtomicU64,
    backend_failures: AtomicU64,
    short_circuits: AtomicU64,
    empty_results: AtomicU64,
    selections: AtomicU64,
    rate_limited: AtomicU64,
    /// Last backend latencies in ms
    backend_latency: Mutex<VecDeque<u64>>,
}

impl SuggestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Query below the minimum length
    pub fn inc_short_query(&self) {
        self.short_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_defaults_served(&self) {
        self.defaults_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Caching disabled, backend called directly
    pub fn inc_cache_bypass(&self) {
        self.cache_bypass.fetch_add(1, Ordering::Relaxed);
    }

    /// Suggestions handed back to a caller
    pub fn add_results(&self, count: usize) {
        self.results_returned.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a backend call that returned rows (possibly none)
    pub fn record_backend_success(&self, time_ms: u64, result_count: usize) {
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
        if result_count == 0 {
            self.empty_results.fetch_add(1, Ordering::Relaxed);
        }
        self.record_latency(time_ms);
    }

    /// Record a backend call that failed and fell back to empty
    pub fn record_backend_failure(&self, time_ms: u64) {
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
        self.backend_failures.fetch_add(1, Ordering::Relaxed);
        self.record_latency(time_ms);
    }

    /// Record a call the failure guard rejected without reaching the backend
    pub fn record_short_circuit(&self) {
        self.short_circuits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_selection(&self) {
        self.selections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    fn record_latency(&self, time_ms: u64) {
        let mut window = self.backend_latency.lock();
        if window.len() >= LATENCY_WINDOW {
            window.pop_front();
        }
        window.push_back(time_ms);
    }

    /// Number of fail-open fallbacks so far, short circuits included
    pub fn fallbacks(&self) -> u64 {
        self.backend_failures() + self.short_circuits.load(Ordering::Relaxed)
    }

    pub fn backend_failures(&self) -> u64 {
        self.backend_failures.load(Ordering::Relaxed)
    }

    pub fn backend_calls(&self) -> u64 {
        self.backend_calls.load(Ordering::Relaxed)
    }

    /// Rolling average backend latency
    pub fn avg_backend_latency(&self) -> Option<u64> {
        let window = self.backend_latency.lock();
        if window.is_empty() {
            None
        } else {
            Some(window.iter().sum::<u64>() / window.len() as u64)
        }
    }

    /// Percentage of backend calls that succeeded
    pub fn reliability(&self) -> f64 {
        let calls = self.backend_calls();
        if calls == 0 {
            100.0
        } else {
            ((calls - self.backend_failures()) as f64 / calls as f64) * 100.0
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            short_queries: self.short_queries.load(Ordering::Relaxed),
            defaults_served: self.defaults_served.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_bypass: self.cache_bypass.load(Ordering::Relaxed),
            results_returned: self.results_returned.load(Ordering::Relaxed),
            backend_calls: self.backend_calls(),
            backend_failures: self.backend_failures(),
            short_circuits: self.short_circuits.load(Ordering::Relaxed),
            empty_results: self.empty_results.load(Ordering::Relaxed),
            selections: self.selections.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            avg_backend_latency_ms: self.avg_backend_latency(),
            reliability: self.reliability(),
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub short_queries: u64,
    pub defaults_served: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_bypass: u64,
    pub results_returned: u64,
    pub backend_calls: u64,
    pub backend_failures: u64,
    pub short_circuits: u64,
    pub empty_results: u64,
    pub selections: u64,
    pub rate_limited: u64,
    pub avg_backend_latency_ms: Option<u64>,
    pub reliability: f64,
}
