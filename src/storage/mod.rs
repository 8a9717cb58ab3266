//! Storage collaborators behind the suggestion backends
//!
//! The [`SuggestStore`] trait is the only way the suggestion core reaches a
//! corpus. Each implementation evaluates the backend-native expressions built
//! by [`crate::query`] and returns rows already ordered by that backend's
//! ranking rules.
//!
//! | Store | pattern-match | inverted-index | commercial-text |
//! |-------|---------------|----------------|-----------------|
//! | [`SqliteStore`] | `LIKE` | FTS5 + `bm25()` | unsupported |
//! | [`MemoryStore`] | in-process | in-process | in-process |

mod memory;
mod ranking;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StorageError;
use crate::query::PatternQuery;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// A corpus record as returned by a backend query
#[derive(Debug, Clone, PartialEq)]
pub struct NameRow {
    pub id: i64,
    pub name: String,
    pub popularity: i64,
    /// Backend-native relevance, absent for unranked backends
    pub score: Option<f64>,
}

/// A backend-specific read query
#[derive(Debug, Clone, PartialEq)]
pub enum BackendQuery {
    /// `LIKE` pattern match
    Pattern(PatternQuery),
    /// FTS5 `MATCH` expression
    Index(String),
    /// Oracle Text `CONTAINS` expression
    Text(String),
}

impl BackendQuery {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pattern(_) => "pattern",
            Self::Index(_) => "index",
            Self::Text(_) => "text",
        }
    }
}

/// Record targeted by a selection report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionTarget {
    Id(i64),
    /// Case-insensitive exact name match
    Name(String),
}

/// Full-text index maintenance operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexMaintenance {
    EnsureTriggers,
    Rebuild,
    Optimize,
}

/// Storage backend for suggestion queries
#[async_trait]
pub trait SuggestStore: Send + Sync {
    /// Store name for logs
    fn name(&self) -> &str;

    /// Run a backend query, returning at most `limit` ranked rows
    async fn query(&self, query: &BackendQuery, limit: usize) -> Result<Vec<NameRow>, StorageError>;

    /// Globally most popular records
    async fn top_popular(&self, limit: usize) -> Result<Vec<NameRow>, StorageError>;

    /// Increment the popularity of the targeted records by one.
    ///
    /// Returns the number of records updated.
    async fn increment_popularity(&self, target: &SelectionTarget) -> Result<u64, StorageError>;

    /// Most frequent lowercase name prefixes of `len` characters
    async fn hot_prefixes(&self, len: usize, limit: usize) -> Result<Vec<String>, StorageError>;

    /// Add a record, returning its id
    async fn insert(&self, name: &str, popularity: i64) -> Result<i64, StorageError>;

    /// Number of records
    async fn count(&self) -> Result<u64, StorageError>;

    /// Run index maintenance; stores without a separate index ignore it
    async fn maintain(&self, _op: IndexMaintenance) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Load one name per line from `path` into an empty store.
///
/// Blank lines and lines starting with `#` are skipped. A store that already
/// holds records is left untouched.
pub async fn load_seed_file<P: AsRef<Path>>(
    store: &dyn SuggestStore,
    path: P,
) -> anyhow::Result<usize> {
    let path = path.as_ref();
    if store.count().await? > 0 {
        info!("Store already populated, skipping seed file {}", path.display());
        return Ok(0);
    }

    let content = tokio::fs::read_to_string(path).await?;
    let mut loaded = 0;
    for line in content.lines() {
        let name = line.trim();
        if name.is_empty() || name.starts_with('#') {
            continue;
        }
        store.insert(name, 0).await?;
        loaded += 1;
    }

    info!("Seeded {} names from {}", loaded, path.display());
    Ok(loaded)
}
