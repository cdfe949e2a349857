//! In-memory feed for exercising crawls without a server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::feed::{ContentItem, FeedClient, FetchError};

pub(crate) fn item(id: &str, score: i64) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        score,
        title: format!("Title {}", id),
        domain: "example.com".to_string(),
        subreddit: "news".to_string(),
        permalink: format!("/r/news/comments/{}/", id),
        url: format!("https://example.com/{}", id),
        created_utc: 1_700_000_000,
        name: format!("t3_{}", id),
    }
}

/// Serves fixed partitions in pages of `page_size`, resuming after the item
/// whose `name` matches the cursor. Unknown partitions are empty.
pub(crate) struct ScriptedFeed {
    page_size: usize,
    partitions: HashMap<String, Vec<ContentItem>>,
    failures: Mutex<Option<(u16, usize)>>,
    broken: Option<String>,
    calls: AtomicUsize,
    cursors: Mutex<Vec<Option<String>>>,
}

impl ScriptedFeed {
    pub(crate) fn new(page_size: usize) -> Self {
        Self {
            page_size,
            partitions: HashMap::new(),
            failures: Mutex::new(None),
            broken: None,
            calls: AtomicUsize::new(0),
            cursors: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_partition(mut self, name: &str, items: Vec<ContentItem>) -> Self {
        self.partitions.insert(name.to_string(), items);
        self
    }

    /// Answer the next `times` calls with HTTP `status`.
    pub(crate) fn failing_with(self, status: u16, times: usize) -> Self {
        *self.failures.lock().unwrap() = Some((status, times));
        self
    }

    /// Every request for `partition` fails with HTTP 403.
    pub(crate) fn with_broken_partition(mut self, partition: &str) -> Self {
        self.broken = Some(partition.to_string());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The `after` value of every successful page request, in order.
    pub(crate) fn requested_cursors(&self) -> Vec<Option<String>> {
        self.cursors.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedClient for ScriptedFeed {
    async fn fetch_partition(
        &self,
        partition: &str,
        after: Option<&str>,
    ) -> Result<Vec<ContentItem>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.broken.as_deref() == Some(partition) {
            return Err(FetchError::HttpStatus {
                status: 403,
                url: format!("mock://r/{}", partition),
            });
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some((status, remaining)) = failures.as_mut() {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(FetchError::HttpStatus {
                        status: *status,
                        url: format!("mock://r/{}", partition),
                    });
                }
            }
        }

        self.cursors
            .lock()
            .unwrap()
            .push(after.map(str::to_string));

        let items = self.partitions.get(partition).cloned().unwrap_or_default();
        let start = match after {
            None => 0,
            Some(cursor) => items
                .iter()
                .position(|i| i.name == cursor)
                .map(|p| p + 1)
                .unwrap_or(items.len()),
        };
        Ok(items
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .collect())
    }
}
