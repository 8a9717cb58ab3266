//! Suggestion result cache
//!
//! Bounded by entry count (least-recently-used entries go first) and by a
//! time-to-live measured from insertion.

use crate::suggest::{Engine, Mode, Suggestion};
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use std::sync::Arc;
use std::time::Duration;
use unicode_normalization::UnicodeNormalization;

/// Cache identity of a suggestion request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub engine: Engine,
    pub mode: Mode,
    /// NFKC-normalized, lowercased query
    pub query: String,
    pub limit: usize,
}

impl CacheKey {
    pub fn new(engine: Engine, mode: Mode, query: &str, limit: usize) -> Self {
        Self {
            engine,
            mode,
            query: normalize_key_query(query),
            limit,
        }
    }
}

/// NFKC-normalize and lowercase, so full-width and case variants share an entry
pub fn normalize_key_query(query: &str) -> String {
    query.trim().nfkc().collect::<String>().to_lowercase()
}

/// Cache for suggestion sequences
#[derive(Clone)]
pub struct SuggestionCache {
    cache: Cache<CacheKey, Arc<Vec<Suggestion>>>,
    ttl: Duration,
}

impl SuggestionCache {
    /// Create a cache with the given TTL and entry bound
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(ttl)
            .max_capacity(max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self { cache, ttl }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<Vec<Suggestion>>> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, suggestions: Vec<Suggestion>) {
        self.cache.insert(key, Arc::new(suggestions)).await;
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate number of live entries
    pub fn size(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for SuggestionCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(90), 10_000) // 90 seconds TTL, 10k max entries
    }
}
