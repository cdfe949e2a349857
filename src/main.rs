//! feedsync: keep a local SQLite table in sync with high-scoring feed items.
//!
//! Each pass walks the configured subreddits' listings page by page, stops a
//! subreddit once scores drop off, and upserts what it found so that new
//! items are added and existing ones track their latest score.

#![warn(clippy::all)]

mod auth;
mod cli;
mod config;
mod crawl;
mod feed;
pub mod retry;
mod shutdown;
mod store;
mod sync;
mod types;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use auth::credentials::FileCredentialStore;
use auth::TokenManager;
use cli::Command;
use config::{ApiConfig, Config, StoreConfig};
use crawl::Crawler;
use feed::HttpFeedClient;
use store::{SqliteSyncStore, SyncStore};
use sync::SyncDriver;

fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

async fn load_tokens(api: &ApiConfig, client: reqwest::Client) -> anyhow::Result<TokenManager> {
    let store = FileCredentialStore::new(&api.credentials);
    let tokens = TokenManager::load(Box::new(store), api.endpoints.clone(), client)
        .await
        .with_context(|| format!("Cannot load credentials from {}", api.credentials.display()))?;
    Ok(tokens)
}

/// Open the store, creating the database's parent directory on first use.
async fn open_store(config: &StoreConfig) -> anyhow::Result<SqliteSyncStore> {
    if let Some(parent) = config.database.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
    }
    Ok(SqliteSyncStore::open(&config.database, &config.table).await?)
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Run the auth command.
async fn run_auth(args: cli::ApiArgs) -> anyhow::Result<()> {
    let api = ApiConfig::from_args(args);
    let tokens = load_tokens(&api, http_client(api.timeout)?).await?;
    let token = tokens.token().await?;
    println!(
        "Token valid until {}",
        token.expires.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}

/// Run the status command.
async fn run_status(args: cli::StoreArgs) -> anyhow::Result<()> {
    let config = StoreConfig::from_args(args);

    if !config.database.exists() {
        println!("No database found at {}", config.database.display());
        println!("Run a sync first to create it.");
        return Ok(());
    }

    let store = SqliteSyncStore::open(&config.database, &config.table).await?;
    println!("Database: {}", store.path().display());
    if store.exists().await? {
        println!("Table {}: {} rows", store.table(), store.count().await?);
    } else {
        println!("Table {} does not exist", store.table());
    }
    Ok(())
}

/// Run the drop-table command.
async fn run_drop_table(args: cli::DropTableArgs) -> anyhow::Result<()> {
    let config = StoreConfig::from_args(args.store);

    if !config.database.exists() {
        println!("No database found at {}", config.database.display());
        return Ok(());
    }

    let store = SqliteSyncStore::open(&config.database, &config.table).await?;
    if !store.exists().await? {
        println!("Table {} does not exist", store.table());
        return Ok(());
    }

    if !args.yes {
        println!("This will drop table {} and all of its rows in:", store.table());
        println!("  {}", config.database.display());
        println!();
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.drop_table().await?;
    println!("Table {} dropped.", store.table());
    Ok(())
}

fn write_rows(out: &mut dyn Write, rows: &[store::SyncRow]) -> anyhow::Result<()> {
    for row in rows {
        serde_json::to_writer(&mut *out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Run the export command.
async fn run_export(args: cli::ExportArgs) -> anyhow::Result<()> {
    let config = StoreConfig::from_args(args.store);
    if !config.database.exists() {
        anyhow::bail!("No database found at {}", config.database.display());
    }

    let store = SqliteSyncStore::open(&config.database, &config.table).await?;
    if !store.exists().await? {
        anyhow::bail!("Table {} does not exist", store.table());
    }
    let rows = store.rows().await?;

    match args.output.as_deref() {
        Some(path) => {
            let file = std::fs::File::create(Path::new(path))
                .with_context(|| format!("Cannot create {}", path))?;
            write_rows(&mut std::io::BufWriter::new(file), &rows)?;
            tracing::info!("Exported {} rows to {}", rows.len(), path);
        }
        None => write_rows(&mut std::io::stdout().lock(), &rows)?,
    }
    Ok(())
}

/// Run the sync command, once or on an interval.
async fn run_sync(args: cli::SyncArgs) -> anyhow::Result<()> {
    let config = Config::from_cli(args)?;
    tracing::debug!(?config, "Resolved configuration");
    tracing::info!(
        partitions = ?config.partitions,
        table = %config.store.table,
        "Starting feedsync"
    );

    let store: Arc<dyn SyncStore> = Arc::new(open_store(&config.store).await?);
    let client = http_client(config.api.timeout)?;
    let tokens = Arc::new(load_tokens(&config.api, client.clone()).await?);
    let feed = Arc::new(HttpFeedClient::new(
        client,
        config.api.endpoints.clone(),
        tokens,
        config.listing,
    ));

    let shutdown_token = shutdown::install_signal_handler()?;
    let crawler =
        Crawler::new(feed, config.crawl.clone()).with_cancellation(shutdown_token.clone());
    let driver = SyncDriver::new(store, crawler, config.partitions.clone());

    loop {
        if shutdown_token.is_cancelled() {
            tracing::info!("Shutdown requested, exiting...");
            break;
        }

        match driver.run().await {
            Ok(_) => {}
            // In watch mode a failed pass is retried on the next cycle
            Err(e) if config.watch_with_interval.is_some() => {
                tracing::error!("Sync pass failed: {}", e);
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(interval) = config.watch_with_interval {
            if shutdown_token.is_cancelled() {
                tracing::info!("Shutdown requested, exiting...");
                break;
            }
            tracing::info!("Waiting {} seconds...", interval);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(interval)) => {}
                _ = shutdown_token.cancelled() => {
                    tracing::info!("Shutdown during wait, exiting...");
                    break;
                }
            }
        } else {
            break;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.effective_command() {
        Command::Sync(args) => run_sync(args).await,
        Command::Auth(args) => run_auth(args).await,
        Command::Status(args) => run_status(args).await,
        Command::DropTable(args) => run_drop_table(args).await,
        Command::Export(args) => run_export(args).await,
    }
}
