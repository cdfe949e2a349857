//! One synchronization pass: crawl every partition and upsert what it yields.

pub mod error;

use std::sync::Arc;

use futures_util::StreamExt;

use crate::crawl::Crawler;
use crate::store::{SyncStore, UpsertOutcome};

pub use self::error::SyncError;

pub struct SyncDriver {
    store: Arc<dyn SyncStore>,
    crawler: Crawler,
    partitions: Vec<String>,
}

impl SyncDriver {
    pub fn new(store: Arc<dyn SyncStore>, crawler: Crawler, partitions: Vec<String>) -> Self {
        Self {
            store,
            crawler,
            partitions,
        }
    }

    /// Run a single pass and return how many items were processed.
    ///
    /// Creates the table on first use. Stops at the first fetch or store
    /// error; rows written before it stay committed.
    pub async fn run(&self) -> Result<usize, SyncError> {
        if !self.store.exists().await? {
            self.store.create_table().await?;
        }

        let items = self.crawler.crawl_all(&self.partitions);
        tokio::pin!(items);

        let mut processed = 0usize;
        let mut written = 0usize;
        while let Some(result) = items.next().await {
            let item = result?;
            let outcome = self.store.upsert(&item).await?;
            match outcome {
                UpsertOutcome::Updated { previous_score } => tracing::debug!(
                    id = %item.id,
                    previous_score,
                    score = item.score,
                    "Score changed"
                ),
                _ => tracing::debug!(id = %item.id, score = item.score, "{}", outcome.as_str()),
            }
            if outcome.wrote() {
                written += 1;
            }
            processed += 1;
        }

        tracing::info!(
            table = self.store.table(),
            partitions = self.partitions.len(),
            processed,
            written,
            "Sync pass complete"
        );
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::testing::{item, ScriptedFeed};
    use crate::crawl::CrawlSettings;
    use crate::retry::RetryConfig;
    use crate::store::SqliteSyncStore;

    fn crawler(feed: ScriptedFeed) -> Crawler {
        Crawler::new(
            Arc::new(feed),
            CrawlSettings {
                retry: RetryConfig::none(),
                ..CrawlSettings::default()
            },
        )
    }

    fn feed_with_scores(news: &[(&str, i64)]) -> ScriptedFeed {
        ScriptedFeed::new(25)
            .with_partition("news", news.iter().map(|(id, s)| item(id, *s)).collect())
            .with_partition("worldnews", vec![item("w1", 800), item("w2", 3)])
    }

    fn partitions() -> Vec<String> {
        vec!["news".to_string(), "worldnews".to_string()]
    }

    #[tokio::test]
    async fn test_first_run_creates_table_and_inserts() {
        let store = Arc::new(SqliteSyncStore::open_in_memory("articles").unwrap());
        let driver = SyncDriver::new(
            store.clone(),
            crawler(feed_with_scores(&[("a", 500), ("b", 200)])),
            partitions(),
        );

        assert_eq!(driver.run().await.unwrap(), 3);
        assert!(store.exists().await.unwrap());
        assert_eq!(store.count().await.unwrap(), 3);
        assert!(store.lookup("w2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let store = Arc::new(SqliteSyncStore::open_in_memory("articles").unwrap());
        let driver = SyncDriver::new(
            store.clone(),
            crawler(feed_with_scores(&[("a", 500), ("b", 200)])),
            partitions(),
        );

        driver.run().await.unwrap();
        let count = store.count().await.unwrap();
        let changes = store.total_changes();

        assert_eq!(driver.run().await.unwrap(), 3);
        assert_eq!(store.count().await.unwrap(), count);
        assert_eq!(store.total_changes(), changes);
    }

    #[tokio::test]
    async fn test_score_changes_picked_up() {
        let store = Arc::new(SqliteSyncStore::open_in_memory("articles").unwrap());
        SyncDriver::new(
            store.clone(),
            crawler(feed_with_scores(&[("a", 500), ("b", 200)])),
            partitions(),
        )
        .run()
        .await
        .unwrap();

        SyncDriver::new(
            store.clone(),
            crawler(feed_with_scores(&[("a", 650), ("b", 200), ("c", 150)])),
            partitions(),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(store.count().await.unwrap(), 4);
        assert_eq!(store.lookup("a").await.unwrap().unwrap().score, 650);
    }

    #[tokio::test]
    async fn test_fetch_error_stops_pass_and_keeps_rows() {
        let store = Arc::new(SqliteSyncStore::open_in_memory("articles").unwrap());
        let feed = feed_with_scores(&[("a", 500)]).with_broken_partition("worldnews");
        let driver = SyncDriver::new(store.clone(), crawler(feed), partitions());

        match driver.run().await {
            Err(SyncError::Fetch(e)) => assert!(!e.is_retryable()),
            other => panic!("expected a fetch error, got {:?}", other),
        }
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_existing_table_reused() {
        let store = Arc::new(SqliteSyncStore::open_in_memory("articles").unwrap());
        store.create_table().await.unwrap();
        store.upsert(&item("old", 999)).await.unwrap();

        let driver = SyncDriver::new(
            store.clone(),
            crawler(feed_with_scores(&[("a", 500)])),
            partitions(),
        );
        driver.run().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 3);
    }
}
