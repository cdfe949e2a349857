//! Sync store trait and SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use super::error::StoreError;
use super::schema;
use super::types::{SyncRow, UpsertOutcome};
use crate::feed::ContentItem;

/// Persistence for synced items, scoped to one table.
///
/// Object-safe so the driver can hold an `Arc<dyn SyncStore>`.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Name of the table every operation targets.
    fn table(&self) -> &str;

    /// Whether the table is present.
    async fn exists(&self) -> Result<bool, StoreError>;

    /// Create the table. Fails with `StoreError::Schema` if it already exists.
    async fn create_table(&self) -> Result<(), StoreError>;

    /// Drop the table. A missing table is not an error.
    async fn drop_table(&self) -> Result<(), StoreError>;

    /// Row stored under `id`, if any.
    async fn lookup(&self, id: &str) -> Result<Option<SyncRow>, StoreError>;

    /// Insert a new item or bring a stored item's score up to date.
    ///
    /// Only `score` is ever rewritten; every other column keeps the value
    /// from the first sighting.
    async fn upsert(&self, item: &ContentItem) -> Result<UpsertOutcome, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Every row, oldest first (ties broken by `id`).
    async fn rows(&self) -> Result<Vec<SyncRow>, StoreError>;
}

/// SQLite implementation of the sync store.
pub struct SqliteSyncStore {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync.
    conn: Mutex<Connection>,
    path: PathBuf,
    table: String,
}

impl std::fmt::Debug for SqliteSyncStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSyncStore")
            .field("path", &self.path)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl SqliteSyncStore {
    /// Open or create a database at the given path.
    ///
    /// The table itself is not created here; see [`SyncStore::create_table`].
    pub async fn open(path: &Path, table: &str) -> Result<Self, StoreError> {
        schema::validate_table_name(table)?;
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path_clone).map_err(|e| StoreError::Open {
                path: path_clone.clone(),
                source: e,
            })?;

            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(StoreError::query)?;
            // Still durable across crashes with WAL
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(StoreError::query)?;

            Ok::<_, StoreError>(conn)
        })
        .await??;

        tracing::debug!(path = %path.display(), table, "Opened sync store");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            table: table.to_string(),
        })
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory(table: &str) -> Result<Self, StoreError> {
        schema::validate_table_name(table)?;
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
            table: table.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows written by this connection since it was opened.
    #[cfg(test)]
    pub fn total_changes(&self) -> u64 {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT total_changes()", [], |row| row.get::<_, i64>(0))
            .unwrap() as u64
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    fn lookup_in(conn: &Connection, table: &str, id: &str) -> Result<Option<SyncRow>, StoreError> {
        let mut stmt = conn
            .prepare(&format!(
                r#"SELECT {} FROM "{}" WHERE id = ?1"#,
                schema::COLUMNS,
                table
            ))
            .map_err(StoreError::query)?;
        let rows = stmt
            .query_map([id], SyncRow::from_row)
            .map_err(StoreError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::query)?;
        Ok(rows.into_iter().last())
    }
}

fn is_missing_table(e: &rusqlite::Error) -> bool {
    e.to_string().contains("no such table")
}

#[async_trait]
impl SyncStore for SqliteSyncStore {
    fn table(&self) -> &str {
        &self.table
    }

    async fn exists(&self) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let probe = conn
            .query_row(
                &format!(r#"SELECT 1 FROM "{}" LIMIT 1"#, self.table),
                [],
                |row| row.get::<_, i64>(0),
            )
            .optional();
        match probe {
            Ok(_) => Ok(true),
            Err(e) if is_missing_table(&e) => Ok(false),
            Err(e) => Err(StoreError::query(e)),
        }
    }

    async fn create_table(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(&schema::create_table_sql(&self.table))
            .map_err(|e| {
                let reason = e.to_string();
                if reason.contains("already exists") {
                    StoreError::Schema {
                        table: self.table.clone(),
                        reason,
                    }
                } else {
                    StoreError::query(e)
                }
            })?;
        tracing::info!(table = %self.table, "Created table");
        Ok(())
    }

    async fn drop_table(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(&format!(r#"DROP TABLE IF EXISTS "{}""#, self.table))
            .map_err(StoreError::query)?;
        Ok(())
    }

    async fn lookup(&self, id: &str) -> Result<Option<SyncRow>, StoreError> {
        let conn = self.lock()?;
        Self::lookup_in(&conn, &self.table, id)
    }

    async fn upsert(&self, item: &ContentItem) -> Result<UpsertOutcome, StoreError> {
        let conn = self.lock()?;

        let outcome = match Self::lookup_in(&conn, &self.table, &item.id)? {
            None => UpsertOutcome::Inserted,
            Some(stored) if stored.score != item.score => UpsertOutcome::Updated {
                previous_score: stored.score,
            },
            Some(_) => return Ok(UpsertOutcome::Unchanged),
        };

        conn.execute(
            &schema::upsert_sql(&self.table),
            rusqlite::params![
                &item.id,
                item.score,
                &item.title,
                &item.domain,
                &item.subreddit,
                &item.permalink,
                &item.url,
                item.created_utc,
            ],
        )
        .map_err(StoreError::query)?;

        Ok(outcome)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(&format!(r#"SELECT COUNT(*) FROM "{}""#, self.table), [], |row| {
                row.get(0)
            })
            .map_err(StoreError::query)?;
        Ok(count as u64)
    }

    async fn rows(&self) -> Result<Vec<SyncRow>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                r#"SELECT {} FROM "{}" ORDER BY created_utc, id"#,
                schema::COLUMNS,
                self.table
            ))
            .map_err(StoreError::query)?;
        let rows = stmt
            .query_map([], SyncRow::from_row)
            .map_err(StoreError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::query)?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::testing::item;
    use std::fs;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("feedsync")
            .join("store_tests")
            .join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn created(table: &str) -> SqliteSyncStore {
        let store = SqliteSyncStore::open_in_memory(table).unwrap();
        store.create_table().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_open_creates_db_file() {
        let dir = test_dir("open_creates");
        let path = dir.join("sync.db");
        let store = SqliteSyncStore::open(&path, "articles").await.unwrap();
        assert!(path.exists());
        assert_eq!(store.path(), path);
        assert_eq!(store.table(), "articles");
        assert!(!store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_open_rejects_bad_table_name() {
        let dir = test_dir("bad_table");
        let err = SqliteSyncStore::open(&dir.join("sync.db"), "news; --").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTableName(_)));
    }

    #[tokio::test]
    async fn test_table_lifecycle() {
        let store = SqliteSyncStore::open_in_memory("articles").unwrap();
        assert!(!store.exists().await.unwrap());

        store.create_table().await.unwrap();
        assert!(store.exists().await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);

        store.drop_table().await.unwrap();
        assert!(!store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_drop_missing_table_is_noop() {
        let store = SqliteSyncStore::open_in_memory("articles").unwrap();
        store.drop_table().await.unwrap();
        assert!(!store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_create_twice_is_schema_error() {
        let store = created("articles").await;
        match store.create_table().await {
            Err(StoreError::Schema { table, .. }) => assert_eq!(table, "articles"),
            other => panic!("expected Schema error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_queries_on_missing_table_fail() {
        let store = SqliteSyncStore::open_in_memory("articles").unwrap();
        assert!(matches!(store.count().await, Err(StoreError::Query(_))));
        assert!(store.upsert(&item("a", 5)).await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_lookup() {
        let store = created("articles").await;
        let fetched = item("abc", 250);

        assert_eq!(store.upsert(&fetched).await.unwrap(), UpsertOutcome::Inserted);
        let row = store.lookup("abc").await.unwrap().unwrap();
        assert_eq!(row, SyncRow::from(&fetched));
        assert!(store.lookup("zzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_score_change_updates_only_score() {
        let store = created("articles").await;
        store.upsert(&item("abc", 5)).await.unwrap();

        let mut changed = item("abc", 9);
        changed.title = "Retitled".to_string();
        let outcome = store.upsert(&changed).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { previous_score: 5 });

        let row = store.lookup("abc").await.unwrap().unwrap();
        assert_eq!(row.score, 9);
        assert_eq!(row.title, "Title abc");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_score_writes_nothing() {
        let store = created("articles").await;
        store.upsert(&item("abc", 5)).await.unwrap();
        let before = store.total_changes();

        let outcome = store.upsert(&item("abc", 5)).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert!(!outcome.wrote());
        assert_eq!(store.total_changes(), before);
    }

    #[tokio::test]
    async fn test_rows_ordered_by_created_then_id() {
        let store = created("articles").await;
        let mut late = item("a", 300);
        late.created_utc = 1_700_000_500;
        let mut early_b = item("b", 300);
        early_b.created_utc = 1_700_000_100;
        let mut early_a = item("c", 300);
        early_a.created_utc = 1_700_000_100;
        early_a.id = "aa".to_string();

        for i in [&late, &early_b, &early_a] {
            store.upsert(i).await.unwrap();
        }

        let ids: Vec<String> = store.rows().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["aa", "b", "a"]);
    }

    #[tokio::test]
    async fn test_tables_are_independent() {
        let dir = test_dir("independent");
        let path = dir.join("sync.db");
        let news = SqliteSyncStore::open(&path, "news").await.unwrap();
        news.create_table().await.unwrap();
        news.upsert(&item("x", 500)).await.unwrap();

        let other = SqliteSyncStore::open(&path, "other").await.unwrap();
        assert!(!other.exists().await.unwrap());
        assert_eq!(news.count().await.unwrap(), 1);
    }
}
