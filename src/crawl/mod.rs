//! Paginated crawl over feed partitions with adaptive early termination.
//!
//! Listings arrive sorted by descending rank. Each page is scanned in full;
//! a qualifying item (score above the threshold) resets a countdown to the
//! trailing-look window and every other item decrements it. When a page ends
//! with the countdown at or below zero, the partition is considered drained.
//! This bounds API calls without walking to the end of a feed, at the cost of
//! occasionally missing a qualifying item behind a long low-score run.

#[cfg(test)]
pub(crate) mod testing;

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::stream::{self, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::feed::{ContentItem, FeedClient, FetchError};
use crate::retry::{retry_with_backoff, RetryAction, RetryConfig};

/// Tuning for the termination heuristic and page-fetch retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    /// Items must score strictly above this to be yielded.
    pub min_score: i64,
    /// Consecutive sub-threshold items tolerated before giving up.
    pub trailing_look: i64,
    pub retry: RetryConfig,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            min_score: 100,
            trailing_look: 10,
            retry: RetryConfig::default(),
        }
    }
}

/// Per-partition pagination state. Fresh for every crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlCursor {
    after: Option<String>,
    countdown: i64,
}

impl Default for CrawlCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlCursor {
    /// Countdown is seeded at 1 so the first page is always fetched.
    pub fn new() -> Self {
        Self {
            after: None,
            countdown: 1,
        }
    }

    pub fn after(&self) -> Option<&str> {
        self.after.as_deref()
    }

    pub fn countdown(&self) -> i64 {
        self.countdown
    }

    pub fn is_exhausted(&self) -> bool {
        self.countdown <= 0
    }

    /// Scan one page, advancing the cursor past every item and setting the
    /// countdown for the next page. Returns the qualifying items in order.
    ///
    /// An empty page leaves the countdown at zero.
    pub fn absorb_page(
        &mut self,
        page: Vec<ContentItem>,
        min_score: i64,
        trailing_look: i64,
    ) -> Vec<ContentItem> {
        let mut keep_looking = 0;
        let mut kept = Vec::new();
        for item in page {
            self.after = Some(item.name.clone());
            if item.score > min_score {
                keep_looking = trailing_look;
                kept.push(item);
            } else {
                keep_looking -= 1;
            }
        }
        self.countdown = keep_looking;
        kept
    }

    fn stop(&mut self) {
        self.countdown = 0;
    }
}

/// Lazy, pull-based crawl of a single partition.
///
/// Pages are fetched only when the buffered items of the previous page have
/// been consumed. Cancellation is checked before each fetch, never mid-page.
pub struct PartitionCrawl {
    feed: Arc<dyn FeedClient>,
    partition: String,
    settings: CrawlSettings,
    cursor: CrawlCursor,
    pending: VecDeque<ContentItem>,
    pages: u32,
    cancel: Option<CancellationToken>,
}

impl std::fmt::Debug for PartitionCrawl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionCrawl")
            .field("partition", &self.partition)
            .field("cursor", &self.cursor)
            .field("pending", &self.pending.len())
            .field("pages", &self.pages)
            .finish_non_exhaustive()
    }
}

impl PartitionCrawl {
    /// Next qualifying item, `None` once the partition is drained.
    ///
    /// A fetch that still fails after retries is returned once as `Err`;
    /// the crawl ends after it.
    pub async fn next(&mut self) -> Option<Result<ContentItem, FetchError>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(Ok(item));
            }
            if self.cursor.is_exhausted() {
                tracing::debug!(
                    partition = %self.partition,
                    pages = self.pages,
                    "Partition crawl finished"
                );
                return None;
            }
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                tracing::info!(partition = %self.partition, "Crawl cancelled between pages");
                self.cursor.stop();
                return None;
            }

            match self.fetch_page().await {
                Ok(page) => {
                    self.pages += 1;
                    let fetched = page.len();
                    let kept = self.cursor.absorb_page(
                        page,
                        self.settings.min_score,
                        self.settings.trailing_look,
                    );
                    tracing::debug!(
                        partition = %self.partition,
                        page = self.pages,
                        fetched,
                        kept = kept.len(),
                        countdown = self.cursor.countdown(),
                        "Fetched page"
                    );
                    self.pending.extend(kept);
                }
                Err(e) => {
                    tracing::warn!(partition = %self.partition, "Aborting partition crawl: {}", e);
                    self.cursor.stop();
                    return Some(Err(e));
                }
            }
        }
    }

    async fn fetch_page(&self) -> Result<Vec<ContentItem>, FetchError> {
        let after = self.cursor.after();
        retry_with_backoff(
            &self.settings.retry,
            |e: &FetchError| {
                if e.is_retryable() {
                    RetryAction::Retry
                } else {
                    RetryAction::Abort
                }
            },
            || self.feed.fetch_partition(&self.partition, after),
        )
        .await
    }

    /// Adapt into a `Stream` for combinators.
    pub fn into_stream(self) -> impl Stream<Item = Result<ContentItem, FetchError>> + Send {
        stream::unfold(self, |mut crawl| async move {
            crawl.next().await.map(|item| (item, crawl))
        })
    }
}

/// Builds partition crawls that share a feed client and settings.
#[derive(Clone)]
pub struct Crawler {
    feed: Arc<dyn FeedClient>,
    settings: CrawlSettings,
    cancel: Option<CancellationToken>,
}

impl Crawler {
    pub fn new(feed: Arc<dyn FeedClient>, settings: CrawlSettings) -> Self {
        Self {
            feed,
            settings,
            cancel: None,
        }
    }

    /// Stop fetching new pages once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Start a crawl of one partition with a fresh cursor.
    pub fn crawl(&self, partition: &str) -> PartitionCrawl {
        PartitionCrawl {
            feed: self.feed.clone(),
            partition: partition.to_string(),
            settings: self.settings.clone(),
            cursor: CrawlCursor::new(),
            pending: VecDeque::new(),
            pages: 0,
            cancel: self.cancel.clone(),
        }
    }

    /// Crawl each partition in turn, concatenating their items.
    pub fn crawl_all(
        &self,
        partitions: &[String],
    ) -> impl Stream<Item = Result<ContentItem, FetchError>> + Send + 'static {
        let crawls: Vec<PartitionCrawl> = partitions.iter().map(|p| self.crawl(p)).collect();
        stream::iter(crawls).flat_map(PartitionCrawl::into_stream)
    }
}
