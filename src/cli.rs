use clap::{Args, Parser, Subcommand};

use crate::auth::endpoints::{DEFAULT_API_ROOT, DEFAULT_TOKEN_URL};
use crate::types::*;

#[derive(Parser, Debug)]
#[command(
    name = "feedsync",
    version,
    about = "Keep a local table in sync with high-scoring feed listings",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Arguments for `sync` when no subcommand is given
    #[command(flatten)]
    pub sync: SyncArgs,

    /// Log level
    #[arg(long, value_enum, default_value = "info", global = true)]
    pub log_level: LogLevel,
}

impl Cli {
    /// The subcommand to run; bare invocations sync.
    pub fn effective_command(self) -> Command {
        self.command.unwrap_or(Command::Sync(self.sync))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a sync pass (default)
    Sync(SyncArgs),

    /// Renew the API token if needed and exit
    Auth(ApiArgs),

    /// Show whether the table exists and how many rows it holds
    Status(StoreArgs),

    /// Drop the synced table
    DropTable(DropTableArgs),

    /// Write all rows as JSON Lines
    Export(ExportArgs),
}

/// Credential file and API endpoints.
#[derive(Args, Debug, Clone)]
pub struct ApiArgs {
    /// JSON file holding client and account credentials plus the cached token
    #[arg(long, env = "FEEDSYNC_CREDENTIALS", default_value = "~/.feedsync/credentials.json")]
    pub credentials: String,

    /// OAuth token endpoint
    #[arg(long, default_value = DEFAULT_TOKEN_URL)]
    pub token_url: String,

    /// Base URL for listing requests
    #[arg(long, default_value = DEFAULT_API_ROOT)]
    pub api_root: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,
}

/// Database file and table.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// SQLite database file
    #[arg(long, env = "FEEDSYNC_DATABASE", default_value = "~/.feedsync/feedsync.db")]
    pub database: String,

    /// Table holding synced rows
    #[arg(long, default_value = "articles")]
    pub table: String,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub api: ApiArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Subreddit(s) to crawl, in order
    #[arg(long = "subreddit", default_values = ["news", "worldnews", "politics"])]
    pub subreddits: Vec<String>,

    /// Only items scoring above this are stored
    #[arg(long, default_value_t = 100)]
    pub min_score: i64,

    /// Stop a subreddit after this many consecutive low-scoring items
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(i64).range(0..))]
    pub trailing_look: i64,

    /// Listing time window
    #[arg(long, value_enum, default_value = "day")]
    pub time_window: TimeWindow,

    /// Listing sort order
    #[arg(long, value_enum, default_value = "top")]
    pub sort: SortOrder,

    /// Items per page
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub limit: u32,

    /// Max retries per page fetch (0 = no retries)
    #[arg(long, default_value_t = 2)]
    pub max_retries: u32,

    /// Initial retry delay in seconds
    #[arg(long, default_value_t = 5)]
    pub retry_delay: u64,

    /// Run continuously, waiting N seconds between passes
    #[arg(long)]
    pub watch_with_interval: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct DropTableArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Skip the confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,
}
