use serde::Serialize;

use crate::feed::ContentItem;

/// Persisted projection of a content item. One row per `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRow {
    pub id: String,
    pub score: i64,
    pub title: String,
    pub domain: String,
    pub subreddit: String,
    pub permalink: String,
    pub url: String,
    pub created_utc: i64,
}

impl From<&ContentItem> for SyncRow {
    fn from(item: &ContentItem) -> Self {
        Self {
            id: item.id.clone(),
            score: item.score,
            title: item.title.clone(),
            domain: item.domain.clone(),
            subreddit: item.subreddit.clone(),
            permalink: item.permalink.clone(),
            url: item.url.clone(),
            created_utc: item.created_utc,
        }
    }
}

impl SyncRow {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            score: row.get::<_, Option<i64>>(1)?.unwrap_or_default(),
            title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            domain: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            subreddit: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            permalink: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            url: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            created_utc: row.get::<_, Option<i64>>(7)?.unwrap_or_default(),
        })
    }
}

/// What an upsert did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated { previous_score: i64 },
    Unchanged,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated { .. } => "updated",
            Self::Unchanged => "unchanged",
        }
    }

    pub fn wrote(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}
