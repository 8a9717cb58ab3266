//! Backend adapter implementations

use crate::error::StorageError;
use crate::query::{build_index_match, build_pattern_query, build_text_expr, MatchExpr};
use crate::storage::{BackendQuery, NameRow, SuggestStore};
use crate::suggest::{Engine, Mode, Suggestion};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Trait for suggestion backends
///
/// An adapter turns a query into one backend-native read against the store
/// and maps the ranked rows to suggestions. Adapters neither cache nor retry.
#[async_trait]
pub trait SuggestBackend: Send + Sync {
    /// Engine this adapter serves
    fn engine(&self) -> Engine;

    /// Build the backend query, `None` when the input can match nothing
    fn build_query(&self, query: &str, mode: Mode) -> Option<BackendQuery>;

    /// Whether rows carry a native relevance score
    fn ranked(&self) -> bool;

    /// Fetch up to `limit` suggestions
    async fn suggest(
        &self,
        store: &dyn SuggestStore,
        query: &str,
        mode: Mode,
        limit: usize,
    ) -> Result<Vec<Suggestion>, StorageError> {
        let Some(backend_query) = self.build_query(query, mode) else {
            debug!("{}: query {:?} sanitized to nothing", self.engine(), query);
            return Ok(Vec::new());
        };

        let rows = store.query(&backend_query, limit).await?;
        Ok(rows.into_iter().map(|row| to_suggestion(row, self.ranked())).collect())
    }
}

fn to_suggestion(row: NameRow, ranked: bool) -> Suggestion {
    if ranked {
        Suggestion::scored(row.name, row.score)
    } else {
        Suggestion::new(row.name)
    }
}

fn expr_query(expr: MatchExpr, wrap: fn(String) -> BackendQuery) -> Option<BackendQuery> {
    match expr {
        MatchExpr::Expr(expr) => Some(wrap(expr)),
        MatchExpr::Nothing => None,
    }
}

/// Get the adapter for an engine
pub fn get_backend(engine: Engine) -> Arc<dyn SuggestBackend> {
    match engine {
        Engine::PatternMatch => Arc::new(PatternMatch),
        Engine::InvertedIndex => Arc::new(InvertedIndex),
        Engine::CommercialText => Arc::new(CommercialText),
    }
}

/// List available backends
pub fn list_backends() -> Vec<&'static str> {
    Engine::all().iter().map(|e| e.as_str()).collect()
}

/// `LIKE` pattern matching, unranked
pub struct PatternMatch;

#[async_trait]
impl SuggestBackend for PatternMatch {
    fn engine(&self) -> Engine {
        Engine::PatternMatch
    }

    fn build_query(&self, query: &str, mode: Mode) -> Option<BackendQuery> {
        let pattern = build_pattern_query(query, mode);
        if pattern.needle.is_empty() {
            return None;
        }
        Some(BackendQuery::Pattern(pattern))
    }

    fn ranked(&self) -> bool {
        false
    }
}

/// Inverted index with bm25 relevance
pub struct InvertedIndex;

#[async_trait]
impl SuggestBackend for InvertedIndex {
    fn engine(&self) -> Engine {
        Engine::InvertedIndex
    }

    fn build_query(&self, query: &str, mode: Mode) -> Option<BackendQuery> {
        expr_query(build_index_match(query, mode), BackendQuery::Index)
    }

    fn ranked(&self) -> bool {
        true
    }
}

/// Commercial text engine with `CONTAINS` scoring
pub struct CommercialText;

#[async_trait]
impl SuggestBackend for CommercialText {
    fn engine(&self) -> Engine {
        Engine::CommercialText
    }

    fn build_query(&self, query: &str, mode: Mode) -> Option<BackendQuery> {
        expr_query(build_text_expr(query, mode), BackendQuery::Text)
    }

    fn ranked(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn corpus() -> MemoryStore {
        MemoryStore::with_people([
            ("Microsoft", 0),
            ("Microtek", 0),
            ("Microscope", 0),
            ("Macrohard", 0),
            ("Minecraft", 0),
        ])
    }

    fn values(suggestions: &[Suggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.value()).collect()
    }

    #[test]
    fn test_get_backend() {
        for engine in Engine::all() {
            assert_eq!(get_backend(engine).engine(), engine);
        }
        assert_eq!(
            list_backends(),
            vec!["pattern-match", "inverted-index", "commercial-text"]
        );
    }

    #[tokio::test]
    async fn test_pattern_backend_is_unscored() {
        let store = corpus();
        let got = PatternMatch.suggest(&store, "micr", Mode::Prefix, 10).await.unwrap();
        assert_eq!(values(&got), vec!["Microtek", "Microsoft", "Microscope"]);
        assert!(got.iter().all(|s| s.score().is_none()));
    }

    #[tokio::test]
    async fn test_ranked_backends_carry_scores() {
        let store = corpus();
        for backend in [get_backend(Engine::InvertedIndex), get_backend(Engine::CommercialText)] {
            let got = backend.suggest(&store, "micr", Mode::Prefix, 10).await.unwrap();
            assert_eq!(got.len(), 3, "{}", backend.engine());
            assert!(got.iter().all(|s| s.score().is_some()));
        }
    }

    #[tokio::test]
    async fn test_operator_only_input_returns_empty() {
        let store = corpus();
        let got = InvertedIndex.suggest(&store, "\"()\"", Mode::Prefix, 10).await.unwrap();
        assert!(got.is_empty());
        let got = CommercialText.suggest(&store, "%%", Mode::Contains, 10).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn test_limit_respected() {
        let store = corpus();
        let got = PatternMatch.suggest(&store, "m", Mode::Prefix, 2).await.unwrap();
        assert_eq!(got.len(), 2);
    }
}
