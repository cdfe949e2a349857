use std::path::PathBuf;
use std::time::Duration;

use crate::auth::endpoints::Endpoints;
use crate::cli::{ApiArgs, StoreArgs, SyncArgs};
use crate::crawl::CrawlSettings;
use crate::feed::ListingParams;
use crate::retry::RetryConfig;

/// Ceiling for exponential backoff between page retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Where credentials live and which endpoints to talk to.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub credentials: PathBuf,
    pub endpoints: Endpoints,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn from_args(args: ApiArgs) -> Self {
        Self {
            credentials: expand_tilde(&args.credentials),
            endpoints: Endpoints::new(args.token_url, args.api_root),
            timeout: Duration::from_secs(args.timeout),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database: PathBuf,
    pub table: String,
}

impl StoreConfig {
    pub fn from_args(args: StoreArgs) -> Self {
        Self {
            database: expand_tilde(&args.database),
            table: args.table,
        }
    }
}

/// Everything a sync run needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub partitions: Vec<String>,
    pub crawl: CrawlSettings,
    pub listing: ListingParams,
    pub watch_with_interval: Option<u64>,
}

impl Config {
    pub fn from_cli(args: SyncArgs) -> anyhow::Result<Self> {
        let partitions: Vec<String> = args
            .subreddits
            .iter()
            .map(|s| s.trim().trim_start_matches("r/").to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if partitions.is_empty() {
            anyhow::bail!("At least one --subreddit is required");
        }
        if args.watch_with_interval == Some(0) {
            anyhow::bail!("--watch-with-interval must be at least 1 second");
        }

        Ok(Self {
            api: ApiConfig::from_args(args.api),
            store: StoreConfig::from_args(args.store),
            partitions,
            crawl: CrawlSettings {
                min_score: args.min_score,
                trailing_look: args.trailing_look,
                retry: RetryConfig {
                    max_retries: args.max_retries,
                    base_delay: Duration::from_secs(args.retry_delay),
                    max_delay: MAX_RETRY_DELAY,
                },
            },
            listing: ListingParams {
                time_window: args.time_window,
                sort: args.sort,
                limit: args.limit,
            },
            watch_with_interval: args.watch_with_interval,
        })
    }
}
