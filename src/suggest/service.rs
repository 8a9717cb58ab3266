//! Dispatch engine
//!
//! Normalizes the request, serves defaults for short queries, consults the
//! cache and calls the configured backend adapter. Backend failures are
//! recovered here: the caller gets an empty sequence and only the metrics
//! record that something went wrong.

use super::guard::{BackendGuard, CircuitStatus};
use super::models::{Engine, Mode, Suggestion};
use crate::autocomplete::{get_backend, SuggestBackend};
use crate::cache::{CacheKey, SuggestionCache};
use crate::config::{PrewarmSettings, Settings};
use crate::error::{StorageError, SuggestError};
use crate::metrics::SuggestMetrics;
use crate::storage::{IndexMaintenance, SelectionTarget, SuggestStore};
use crate::{DEFAULT_LIMIT, MAX_LIMIT, MIN_QUERY_LEN};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

/// Concurrent lookups while prewarming
const PREWARM_CONCURRENCY: usize = 8;

/// Clamp a requested limit into `1..=50`; absent or non-positive means 10
pub fn clamp_limit(limit: Option<i64>) -> usize {
    match limit {
        Some(n) if n > 0 => (n as u64).min(MAX_LIMIT as u64) as usize,
        _ => DEFAULT_LIMIT,
    }
}

/// Suggestion dispatch engine
pub struct SuggestService {
    store: Arc<dyn SuggestStore>,
    backend: Arc<dyn SuggestBackend>,
    cache: Option<SuggestionCache>,
    defaults_enabled: bool,
    metrics: Arc<SuggestMetrics>,
    guard: Option<BackendGuard>,
}

impl SuggestService {
    /// Service over `store` answering with `engine`; no cache, no defaults,
    /// no guard.
    pub fn new(store: Arc<dyn SuggestStore>, engine: Engine) -> Self {
        Self {
            store,
            backend: get_backend(engine),
            cache: None,
            defaults_enabled: false,
            metrics: Arc::new(SuggestMetrics::new()),
            guard: None,
        }
    }

    /// Build the service described by `settings`
    pub fn from_settings(store: Arc<dyn SuggestStore>, settings: &Settings) -> Self {
        let mut service = Self::new(store, settings.suggest.engine)
            .with_defaults(settings.suggest.defaults_enabled);
        if settings.cache.enabled {
            service = service.with_cache(SuggestionCache::new(
                settings.cache.ttl(),
                settings.cache.max_entries,
            ));
        }
        if settings.resilience.enabled {
            service = service.with_guard(BackendGuard::from_settings(&settings.resilience));
        }
        service
    }

    pub fn with_cache(mut self, cache: SuggestionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_defaults(mut self, enabled: bool) -> Self {
        self.defaults_enabled = enabled;
        self
    }

    pub fn with_guard(mut self, guard: BackendGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<SuggestMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn engine(&self) -> Engine {
        self.backend.engine()
    }

    pub fn metrics(&self) -> &Arc<SuggestMetrics> {
        &self.metrics
    }

    pub fn defaults_enabled(&self) -> bool {
        self.defaults_enabled
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    pub fn circuit_status(&self) -> Option<CircuitStatus> {
        self.guard.as_ref().map(|g| g.status())
    }

    /// Suggestions for `raw_query`. Never fails: backend errors yield an
    /// empty sequence.
    pub async fn suggest(
        &self,
        raw_query: Option<&str>,
        limit: Option<i64>,
        mode: Option<Mode>,
    ) -> Vec<Suggestion> {
        self.metrics.inc_request();
        let query = raw_query.unwrap_or("").trim();
        let limit = clamp_limit(limit);

        if query.chars().count() < MIN_QUERY_LEN {
            self.metrics.inc_short_query();
            return self.default_suggestions(Some(limit as i64)).await;
        }

        let mode = mode.unwrap_or_default();
        let results = self.lookup(query, mode, limit).await.unwrap_or_else(|e| {
            warn!(
                "{} backend failed for {:?} ({}), returning no suggestions: {}",
                self.engine(),
                query,
                mode,
                e
            );
            Vec::new()
        });

        self.metrics.add_results(results.len());
        results
    }

    /// Cache lookup, falling through to the backend on a miss. Failures are
    /// never cached.
    async fn lookup(&self, query: &str, mode: Mode, limit: usize) -> Result<Vec<Suggestion>, StorageError> {
        // backends see the compatibility-normalized form, case preserved
        let query: String = query.nfkc().collect();

        let Some(cache) = &self.cache else {
            self.metrics.inc_cache_bypass();
            return self.call_backend(&query, mode, limit).await;
        };

        let key = CacheKey::new(self.engine(), mode, &query, limit);
        if let Some(hit) = cache.get(&key).await {
            self.metrics.inc_cache_hit();
            debug!("Cache hit for {:?}", key);
            return Ok(hit.as_ref().clone());
        }

        self.metrics.inc_cache_miss();
        let results = self.call_backend(&query, mode, limit).await?;
        cache.insert(key, results.clone()).await;
        Ok(results)
    }

    async fn call_backend(&self, query: &str, mode: Mode, limit: usize) -> Result<Vec<Suggestion>, StorageError> {
        let start = Instant::now();
        let call = self.backend.suggest(self.store.as_ref(), query, mode, limit);
        let result = match &self.guard {
            Some(guard) => guard.call(call).await,
            None => call.await,
        };

        let elapsed = start.elapsed().as_millis() as u64;
        match &result {
            Ok(rows) => self.metrics.record_backend_success(elapsed, rows.len()),
            // rejected by the guard, the backend never saw it
            Err(StorageError::CircuitOpen) => self.metrics.record_short_circuit(),
            Err(_) => self.metrics.record_backend_failure(elapsed),
        }
        result
    }

    /// Globally most popular suggestions, or nothing when defaults are disabled
    pub async fn default_suggestions(&self, limit: Option<i64>) -> Vec<Suggestion> {
        if !self.defaults_enabled {
            return Vec::new();
        }

        let limit = clamp_limit(limit);
        match self.store.top_popular(limit).await {
            Ok(rows) => {
                self.metrics.inc_defaults_served();
                rows.into_iter().map(|row| Suggestion::new(row.name)).collect()
            }
            Err(e) => {
                warn!("Default suggestions unavailable: {}", e);
                Vec::new()
            }
        }
    }

    /// Record that a user picked a suggestion.
    ///
    /// The record is found by `id`, else by case-insensitive `value`. Cached
    /// rankings are not invalidated and go stale until they expire.
    pub async fn track_selection(&self, id: Option<i64>, value: Option<&str>) -> Result<u64, SuggestError> {
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        if id.is_none() && value.is_none() {
            return Err(SuggestError::InvalidArgument(
                "either id or value is required".to_string(),
            ));
        }

        let mut updated = 0;
        if let Some(id) = id {
            updated = self.store.increment_popularity(&SelectionTarget::Id(id)).await?;
        }
        if updated == 0 {
            if let Some(value) = value {
                updated = self
                    .store
                    .increment_popularity(&SelectionTarget::Name(value.to_string()))
                    .await?;
            }
        }

        if updated == 0 {
            return Err(SuggestError::NotFound(match (id, value) {
                (Some(id), Some(value)) => format!("no record with id {} or name {:?}", id, value),
                (Some(id), None) => format!("no record with id {}", id),
                (None, value) => format!("no record named {:?}", value.unwrap_or_default()),
            }));
        }

        self.metrics.inc_selection();
        debug!("Tracked selection id={:?} value={:?} ({} updated)", id, value, updated);
        Ok(updated)
    }

    /// Warm the cache with PREFIX lookups. Returns the number of prefixes
    /// warmed.
    pub async fn prewarm(&self, settings: &PrewarmSettings) -> usize {
        if self.cache.is_none() {
            info!("Cache disabled, skipping prewarm");
            return 0;
        }

        let prefixes = if settings.prefixes.is_empty() {
            match self.store.hot_prefixes(settings.prefix_len, settings.top).await {
                Ok(prefixes) => prefixes,
                Err(e) => {
                    warn!("Could not derive prewarm prefixes: {}", e);
                    return 0;
                }
            }
        } else {
            settings.prefixes.clone()
        };

        let warmed = stream::iter(prefixes)
            .map(|prefix| prefix.trim().to_string())
            .filter(|prefix| futures::future::ready(prefix.chars().count() >= MIN_QUERY_LEN))
            .map(|prefix| async move {
                match self.lookup(&prefix, Mode::Prefix, DEFAULT_LIMIT).await {
                    Ok(_) => true,
                    Err(e) => {
                        debug!("Prewarm failed for prefix {:?}: {}", prefix, e);
                        false
                    }
                }
            })
            .buffer_unordered(PREWARM_CONCURRENCY)
            .filter(|ok| futures::future::ready(*ok))
            .count()
            .await;

        info!("Cache prewarm completed: warmed {} prefixes", warmed);
        warmed
    }

    /// Full-text index maintenance on the underlying store
    pub async fn maintain_index(&self, op: IndexMaintenance) -> Result<(), SuggestError> {
        self.store.maintain(op).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BackendQuery, MemoryStore, NameRow};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    /// Counts backend queries, optionally failing every one
    struct CountingStore {
        inner: MemoryStore,
        queries: AtomicUsize,
        fail: bool,
    }

    impl CountingStore {
        fn new(inner: MemoryStore) -> Arc<Self> {
            Arc::new(Self {
                inner,
                queries: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                inner: corpus(),
                queries: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn queries(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SuggestStore for CountingStore {
        fn name(&self) -> &str {
            "counting"
        }

        async fn query(&self, query: &BackendQuery, limit: usize) -> Result<Vec<NameRow>, StorageError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StorageError::Unavailable("connection refused".into()));
            }
            self.inner.query(query, limit).await
        }

        async fn top_popular(&self, limit: usize) -> Result<Vec<NameRow>, StorageError> {
            self.inner.top_popular(limit).await
        }

        async fn increment_popularity(&self, target: &SelectionTarget) -> Result<u64, StorageError> {
            self.inner.increment_popularity(target).await
        }

        async fn hot_prefixes(&self, len: usize, limit: usize) -> Result<Vec<String>, StorageError> {
            self.inner.hot_prefixes(len, limit).await
        }

        async fn insert(&self, name: &str, popularity: i64) -> Result<i64, StorageError> {
            self.inner.insert(name, popularity).await
        }

        async fn count(&self) -> Result<u64, StorageError> {
            self.inner.count().await
        }
    }

    fn corpus() -> MemoryStore {
        MemoryStore::with_people([
            ("Microsoft", 5),
            ("Microtek", 1),
            ("Microscope", 3),
            ("Macrohard", 9),
            ("Minecraft", 7),
        ])
    }

    fn cached(store: Arc<CountingStore>) -> SuggestService {
        SuggestService::new(store, Engine::PatternMatch)
            .with_cache(SuggestionCache::new(Duration::from_secs(90), 100))
    }

    fn values(suggestions: &[Suggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.value()).collect()
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 10);
        assert_eq!(clamp_limit(Some(0)), 10);
        assert_eq!(clamp_limit(Some(-3)), 10);
        assert_eq!(clamp_limit(Some(1)), 1);
        assert_eq!(clamp_limit(Some(50)), 50);
        assert_eq!(clamp_limit(Some(51)), 50);
        assert_eq!(clamp_limit(Some(i64::MAX)), 50);
    }

    #[tokio::test]
    async fn test_short_query_without_defaults_is_empty() {
        let store = CountingStore::new(corpus());
        let service = cached(store.clone());
        for q in [None, Some(""), Some("   "), Some("m"), Some(" m ")] {
            assert!(service.suggest(q, None, None).await.is_empty());
        }
        assert_eq!(store.queries(), 0);
        assert_eq!(service.metrics().snapshot().short_queries, 5);
    }

    #[tokio::test]
    async fn test_short_query_serves_defaults() {
        let store = CountingStore::new(corpus());
        let service = cached(store.clone()).with_defaults(true);

        let defaults = service.default_suggestions(Some(3)).await;
        assert_eq!(values(&defaults), vec!["Macrohard", "Minecraft", "Microsoft"]);
        assert_eq!(service.suggest(Some("m"), Some(3), None).await, defaults);
        assert_eq!(store.queries(), 0);
    }

    #[tokio::test]
    async fn test_defaults_disabled_returns_empty() {
        let service = cached(CountingStore::new(corpus()));
        assert!(service.default_suggestions(Some(5)).await.is_empty());
    }

    #[tokio::test]
    async fn test_prefix_ranking() {
        let service = cached(CountingStore::new(corpus()));
        let got = service.suggest(Some("micr"), None, None).await;
        assert_eq!(values(&got), vec!["Microtek", "Microsoft", "Microscope"]);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_backend() {
        let store = CountingStore::new(corpus());
        let service = cached(store.clone());

        let first = service.suggest(Some("Micro"), Some(5), Some(Mode::Prefix)).await;
        let second = service.suggest(Some("Micro"), Some(5), Some(Mode::Prefix)).await;
        assert_eq!(first, second);
        assert_eq!(store.queries(), 1);

        // case and compatibility forms share the entry
        service.suggest(Some("MICRO"), Some(5), None).await;
        service.suggest(Some("ＭＩＣＲＯ"), Some(5), None).await;
        assert_eq!(store.queries(), 1);

        // a different limit is a different entry
        service.suggest(Some("micro"), Some(4), None).await;
        assert_eq!(store.queries(), 2);

        let snap = service.metrics().snapshot();
        assert_eq!(snap.cache_hits, 3);
        assert_eq!(snap.cache_misses, 2);
    }

    #[tokio::test]
    async fn test_without_cache_every_call_hits_backend() {
        let store = CountingStore::new(corpus());
        let service = SuggestService::new(store.clone(), Engine::PatternMatch);
        service.suggest(Some("micr"), None, None).await;
        service.suggest(Some("micr"), None, None).await;
        assert_eq!(store.queries(), 2);
        assert_eq!(service.metrics().snapshot().cache_bypass, 2);
    }

    #[tokio::test]
    async fn test_backend_failure_fails_open_and_is_not_cached() {
        let store = CountingStore::failing();
        let service = cached(store.clone());

        assert!(service.suggest(Some("micr"), None, None).await.is_empty());
        assert!(service.suggest(Some("micr"), None, None).await.is_empty());
        assert_eq!(store.queries(), 2);
        assert_eq!(service.metrics().fallbacks(), 2);
    }

    #[tokio::test]
    async fn test_unsupported_expression_fails_open() {
        let store = Arc::new(crate::storage::SqliteStore::in_memory().await.unwrap());
        store.insert("Microsoft", 0).await.unwrap();
        let service = SuggestService::new(store, Engine::CommercialText);
        assert!(service.suggest(Some("micr"), None, None).await.is_empty());
        assert_eq!(service.metrics().fallbacks(), 1);
    }

    #[tokio::test]
    async fn test_open_circuit_stops_backend_calls() {
        let store = CountingStore::failing();
        let service = cached(store.clone()).with_guard(BackendGuard::new(
            Duration::from_secs(1),
            2,
            Duration::from_secs(60),
        ));

        for _ in 0..5 {
            assert!(service.suggest(Some("micr"), None, None).await.is_empty());
        }
        assert_eq!(store.queries(), 2);
        assert_eq!(service.circuit_status(), Some(CircuitStatus::Open));
        assert_eq!(service.metrics().fallbacks(), 5);

        let snap = service.metrics().snapshot();
        assert_eq!(snap.backend_calls, 2);
        assert_eq!(snap.backend_failures, 2);
        assert_eq!(snap.short_circuits, 3);
    }

    #[tokio::test]
    async fn test_cached_case_variants_agree_on_sqlite() {
        let store = Arc::new(crate::storage::SqliteStore::in_memory().await.unwrap());
        store.insert("Émile Zola", 0).await.unwrap();
        let uncached = SuggestService::new(store.clone(), Engine::PatternMatch);
        let service = SuggestService::new(store, Engine::PatternMatch)
            .with_cache(SuggestionCache::new(Duration::from_secs(90), 100));

        let expected = vec![Suggestion::new("Émile Zola")];
        assert_eq!(uncached.suggest(Some("émi"), None, None).await, expected);
        assert_eq!(uncached.suggest(Some("Émi"), None, None).await, expected);

        assert_eq!(service.suggest(Some("émi"), None, None).await, expected);
        assert_eq!(service.suggest(Some("Émi"), None, None).await, expected);
        assert_eq!(service.metrics().snapshot().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_track_selection_validation() {
        let service = cached(CountingStore::new(corpus()));
        let err = assert_err!(service.track_selection(None, None).await);
        assert!(matches!(err, SuggestError::InvalidArgument(_)));
        let err = assert_err!(service.track_selection(None, Some("  ")).await);
        assert!(matches!(err, SuggestError::InvalidArgument(_)));

        let err = assert_err!(service.track_selection(Some(404), None).await);
        assert!(matches!(err, SuggestError::NotFound(_)));
        let err = assert_err!(service.track_selection(None, Some("Nobody")).await);
        assert!(matches!(err, SuggestError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_track_selection_falls_back_to_value() {
        let inner = corpus();
        let store = CountingStore::new(inner);
        let service = cached(store.clone());
        assert_eq!(assert_ok!(service.track_selection(Some(404), Some("microtek")).await), 1);
        assert_eq!(store.inner.popularity(2), Some(2));
    }

    #[tokio::test]
    async fn test_selection_changes_ranking() {
        let store = CountingStore::new(MemoryStore::with_people([
            ("Mara", 0),
            ("Mary", 0),
            ("Marathon", 0),
        ]));
        // no cache so the next query sees the new popularity
        let service = SuggestService::new(store.clone(), Engine::PatternMatch);

        let before = service.suggest(Some("mar"), None, None).await;
        assert_eq!(values(&before), vec!["Mara", "Mary", "Marathon"]);

        assert_eq!(assert_ok!(service.track_selection(Some(2), None).await), 1);
        assert_eq!(store.inner.popularity(2), Some(1));
        assert_eq!(store.inner.popularity(1), Some(0));

        let after = service.suggest(Some("mar"), None, None).await;
        assert_eq!(values(&after), vec!["Mary", "Mara", "Marathon"]);
    }

    #[tokio::test]
    async fn test_cached_ranking_goes_stale_after_selection() {
        let store = CountingStore::new(MemoryStore::with_people([("Mara", 0), ("Mary", 0)]));
        let service = cached(store.clone());

        let before = service.suggest(Some("mar"), None, None).await;
        assert_ok!(service.track_selection(Some(2), None).await);
        assert_eq!(service.suggest(Some("mar"), None, None).await, before);
    }

    #[tokio::test]
    async fn test_prewarm_explicit_prefixes() {
        let store = CountingStore::new(corpus());
        let service = cached(store.clone());
        let settings = PrewarmSettings {
            enabled: true,
            prefixes: vec!["mic".into(), " m ".into(), "mac".into()],
            ..PrewarmSettings::default()
        };

        assert_eq!(service.prewarm(&settings).await, 2);
        assert_eq!(store.queries(), 2);

        service.suggest(Some("MIC"), Some(10), None).await;
        assert_eq!(store.queries(), 2);
    }

    #[tokio::test]
    async fn test_prewarm_derives_hot_prefixes() {
        let store = CountingStore::new(corpus());
        let service = cached(store.clone());
        let settings = PrewarmSettings {
            enabled: true,
            ..PrewarmSettings::default()
        };

        // mic, mac, min
        assert_eq!(service.prewarm(&settings).await, 3);
    }

    #[tokio::test]
    async fn test_prewarm_without_cache_is_noop() {
        let store = CountingStore::new(corpus());
        let service = SuggestService::new(store.clone(), Engine::PatternMatch);
        assert_eq!(service.prewarm(&PrewarmSettings::default()).await, 0);
        assert_eq!(store.queries(), 0);
    }

    #[tokio::test]
    async fn test_from_settings() {
        let mut settings = Settings::default();
        settings.suggest.engine = Engine::InvertedIndex;
        settings.cache.enabled = false;
        let service = SuggestService::from_settings(CountingStore::new(corpus()), &settings);
        assert_eq!(service.engine(), Engine::InvertedIndex);
        assert!(!service.cache_enabled());
        assert_eq!(service.circuit_status(), Some(CircuitStatus::Closed));

        let got = service.suggest(Some("micr"), None, None).await;
        assert_eq!(got.len(), 3);
    }
}
