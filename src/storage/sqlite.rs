//! SQLite-backed [`SuggestStore`]
//!
//! Pattern queries run through `LIKE ... ESCAPE` against `name_key`, the
//! NFKC + lowercased name written alongside every row, so matching folds case
//! exactly like the cache key does. Index queries run through an
//! external-content FTS5 table kept in sync by triggers.

use super::{BackendQuery, IndexMaintenance, NameRow, SelectionTarget, SuggestStore};
use crate::cache::normalize_key_query;
use crate::config::StorageSettings;
use crate::error::StorageError;
use crate::query::{build_pattern_query, PatternQuery};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{debug, info};

const PATTERN_SQL: &str = r#"
    SELECT id, name, popularity
    FROM people
    WHERE name_key LIKE ?1 ESCAPE '\'
    ORDER BY
        CASE
            WHEN name_key = ?2 THEN 0
            WHEN name_key LIKE ?3 ESCAPE '\' THEN 1
            ELSE 2
        END,
        length(name) ASC,
        popularity DESC,
        name ASC
    LIMIT ?4
"#;

const INDEX_SQL: &str = r#"
    SELECT p.id, p.name, p.popularity, f.score
    FROM (
        SELECT rowid, bm25(people_fts) AS score
        FROM people_fts
        WHERE people_fts MATCH ?1
    ) f
    JOIN people p ON p.id = f.rowid
    ORDER BY f.score ASC, p.popularity DESC, length(p.name) ASC, p.name ASC
    LIMIT ?2
"#;

// SQLite's lower() folds ASCII only; rows renamed outside the store keep
// that key until the next rebuild refreshes it
const NAME_KEY_TRIGGER: &str = r#"
    CREATE TRIGGER IF NOT EXISTS people_key_au AFTER UPDATE OF name ON people BEGIN
        UPDATE people SET name_key = lower(new.name) WHERE id = new.id;
    END
"#;

const TRIGGERS: &[&str] = &[
    r#"
    CREATE TRIGGER IF NOT EXISTS people_ai AFTER INSERT ON people BEGIN
        INSERT INTO people_fts(rowid, name) VALUES (new.id, new.name);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS people_ad AFTER DELETE ON people BEGIN
        INSERT INTO people_fts(people_fts, rowid, name) VALUES ('delete', old.id, old.name);
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS people_au AFTER UPDATE OF name ON people BEGIN
        INSERT INTO people_fts(people_fts, rowid, name) VALUES ('delete', old.id, old.name);
        INSERT INTO people_fts(rowid, name) VALUES (new.id, new.name);
    END
    "#,
];

/// SQLite corpus store
pub struct SqliteStore {
    pool: SqlitePool,
    manage_fts: bool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and apply the schema
    pub async fn connect(settings: &StorageSettings) -> Result<Self, StorageError> {
        if let Some(parent) = settings.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Unavailable(format!("{}: {}", parent.display(), e)))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&settings.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect_with(options)
            .await?;

        info!("Opened SQLite store at {}", settings.path.display());
        let store = Self {
            pool,
            manage_fts: settings.manage_fts,
        };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. A single connection that never expires
    /// keeps the database alive for the life of the store.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await?;

        let store = Self {
            pool,
            manage_fts: true,
        };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the table, indexes and (when managed) the FTS index
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS people (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                name_key TEXT NOT NULL DEFAULT '',
                popularity INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // databases created before name_key existed
        let has_key: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('people') WHERE name = 'name_key'",
        )
        .fetch_one(&self.pool)
        .await?;
        if !has_key {
            sqlx::query("ALTER TABLE people ADD COLUMN name_key TEXT NOT NULL DEFAULT ''")
                .execute(&self.pool)
                .await?;
            info!("Added name_key column");
        }
        self.refresh_name_keys(true).await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_people_name_key ON people(name_key)")
            .execute(&self.pool)
            .await?;
        sqlx::query(NAME_KEY_TRIGGER).execute(&self.pool).await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_people_popularity ON people(popularity DESC)")
            .execute(&self.pool)
            .await?;

        if self.manage_fts {
            self.ensure_index().await?;
        }
        Ok(())
    }

    async fn ensure_index(&self) -> Result<(), StorageError> {
        // FTS5 CREATE has no IF NOT EXISTS for content tables, check first
        let fts_exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='people_fts'",
        )
        .fetch_one(&self.pool)
        .await?;

        if !fts_exists {
            sqlx::query(
                "CREATE VIRTUAL TABLE people_fts USING fts5(name, content='people', content_rowid='id')",
            )
            .execute(&self.pool)
            .await?;
            // pick up rows written before the index existed
            self.fts_command("rebuild").await?;
            info!("Created people_fts index");
        }

        for trigger in TRIGGERS {
            sqlx::query(trigger).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Recompute `name_key` in Rust. With `missing_only`, only rows that
    /// never had a key are touched.
    async fn refresh_name_keys(&self, missing_only: bool) -> Result<u64, StorageError> {
        let sql = if missing_only {
            "SELECT id, name, name_key FROM people WHERE name_key = ''"
        } else {
            "SELECT id, name, name_key FROM people"
        };
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        let mut tx = self.pool.begin().await?;
        let mut refreshed = 0;
        for row in &rows {
            let id: i64 = row.try_get("id")?;
            let name: String = row.try_get("name")?;
            let current: String = row.try_get("name_key")?;
            let key = normalize_key_query(&name);
            if key != current {
                sqlx::query("UPDATE people SET name_key = ? WHERE id = ?")
                    .bind(&key)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                refreshed += 1;
            }
        }
        tx.commit().await?;

        if refreshed > 0 {
            debug!("Refreshed {} name keys", refreshed);
        }
        Ok(refreshed)
    }

    async fn fts_command(&self, command: &str) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO people_fts(people_fts) VALUES (?)")
            .bind(command)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn pattern_match(&self, query: &PatternQuery, limit: i64) -> Result<Vec<NameRow>, StorageError> {
        // fold before escaping so NFKC cannot produce a bare wildcard
        let query = build_pattern_query(&normalize_key_query(&query.needle), query.mode);
        let rows = sqlx::query(PATTERN_SQL)
            .bind(&query.pattern)
            .bind(&query.needle)
            .bind(&query.prefix_pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| name_row(row, false)).collect()
    }

    async fn index_match(&self, expr: &str, limit: i64) -> Result<Vec<NameRow>, StorageError> {
        let rows = sqlx::query(INDEX_SQL)
            .bind(expr)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(fts_error)?;
        rows.iter().map(|row| name_row(row, true)).collect()
    }
}

fn name_row(row: &SqliteRow, scored: bool) -> Result<NameRow, StorageError> {
    Ok(NameRow {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        popularity: row.try_get("popularity")?,
        score: if scored { Some(row.try_get("score")?) } else { None },
    })
}

/// Report FTS5 parse failures as syntax errors rather than generic database errors
fn fts_error(err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.message().contains("fts5") => {
            StorageError::Syntax(db.message().to_string())
        }
        _ => StorageError::Database(err),
    }
}

fn clamp_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl SuggestStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn query(&self, query: &BackendQuery, limit: usize) -> Result<Vec<NameRow>, StorageError> {
        debug!("sqlite {} query, limit {}", query.kind(), limit);
        match query {
            BackendQuery::Pattern(q) => self.pattern_match(q, clamp_i64(limit)).await,
            BackendQuery::Index(expr) => self.index_match(expr, clamp_i64(limit)).await,
            BackendQuery::Text(_) => Err(StorageError::Unsupported(
                "CONTAINS expressions need an Oracle Text store".to_string(),
            )),
        }
    }

    async fn top_popular(&self, limit: usize) -> Result<Vec<NameRow>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, popularity
            FROM people
            ORDER BY popularity DESC, length(name) ASC, name ASC
            LIMIT ?
            "#,
        )
        .bind(clamp_i64(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|row| name_row(row, false)).collect()
    }

    async fn increment_popularity(&self, target: &SelectionTarget) -> Result<u64, StorageError> {
        let result = match target {
            SelectionTarget::Id(id) => {
                sqlx::query("UPDATE people SET popularity = popularity + 1 WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await?
            }
            SelectionTarget::Name(name) => {
                sqlx::query("UPDATE people SET popularity = popularity + 1 WHERE name_key = ?")
                    .bind(normalize_key_query(name))
                    .execute(&self.pool)
                    .await?
            }
        };
        Ok(result.rows_affected())
    }

    async fn hot_prefixes(&self, len: usize, limit: usize) -> Result<Vec<String>, StorageError> {
        let len = clamp_i64(len);
        let rows = sqlx::query(
            r#"
            SELECT substr(name_key, 1, ?1) AS prefix, COUNT(*) AS hits
            FROM people
            WHERE length(name_key) >= ?1
            GROUP BY prefix
            ORDER BY hits DESC, prefix ASC
            LIMIT ?2
            "#,
        )
        .bind(len)
        .bind(clamp_i64(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("prefix").map_err(StorageError::from))
            .collect()
    }

    async fn insert(&self, name: &str, popularity: i64) -> Result<i64, StorageError> {
        let result = sqlx::query("INSERT INTO people (name, name_key, popularity) VALUES (?, ?, ?)")
            .bind(name)
            .bind(normalize_key_query(name))
            .bind(popularity)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM people")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn maintain(&self, op: IndexMaintenance) -> Result<(), StorageError> {
        if op == IndexMaintenance::Rebuild {
            self.refresh_name_keys(false).await?;
        }
        if !self.manage_fts {
            debug!("FTS index is managed externally, skipping {:?}", op);
            return Ok(());
        }
        match op {
            IndexMaintenance::EnsureTriggers => self.ensure_index().await?,
            IndexMaintenance::Rebuild => self.fts_command("rebuild").await?,
            IndexMaintenance::Optimize => self.fts_command("optimize").await?,
        }
        info!("FTS maintenance {:?} complete", op);
        Ok(())
    }
}
