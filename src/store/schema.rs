//! Table DDL and identifier checks.

use super::error::StoreError;

/// Column list shared by every read, in `SyncRow` field order.
pub(crate) const COLUMNS: &str = "id, score, title, domain, subreddit, permalink, url, created_utc";

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub(crate) fn validate_table_name(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(name.to_string()))
    }
}

pub(crate) fn create_table_sql(table: &str) -> String {
    format!(
        r#"CREATE TABLE "{table}" (
    id TEXT PRIMARY KEY,
    domain TEXT,
    title TEXT,
    subreddit TEXT,
    permalink TEXT,
    url TEXT,
    score INTEGER,
    created_utc BIGINT
)"#
    )
}

/// Insert that degrades to a score-only update when another writer got there
/// first, and to nothing when the score already matches.
pub(crate) fn upsert_sql(table: &str) -> String {
    format!(
        r#"INSERT INTO "{table}" (id, score, title, domain, subreddit, permalink, url, created_utc)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(id) DO UPDATE SET score = excluded.score
WHERE "{table}".score IS NOT excluded.score"#
    )
}
