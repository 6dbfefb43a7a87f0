//! Driftnet main entry point
//!
//! This is the command-line interface for running and inspecting crawl sessions.

use anyhow::Context;
use clap::Parser;
use driftnet::config::{load_config_with_hash, Config};
use driftnet::crawler::{Crawler, SessionSpec};
use driftnet::output::{load_statistics, print_statistics};
use driftnet::storage::{open_storage, SqliteStorage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Driftnet: a session-based crawl engine
///
/// Crawls everything reachable from the configured seeds within the include
/// and exclude patterns, storing one result per URL per session.
#[derive(Parser, Debug)]
#[command(name = "driftnet")]
#[command(version)]
#[command(about = "A session-based crawl engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Id of the new session (defaults to a timestamp)
    #[arg(long, value_name = "ID")]
    session_id: Option<String>,

    /// Seed the new session from the results of an earlier one
    #[arg(long, value_name = "ID")]
    previous_session: Option<String>,

    /// Show statistics for a session and exit
    #[arg(long, value_name = "SESSION", conflicts_with_all = ["cleanup", "dry_run"])]
    stats: Option<String>,

    /// Delete all data of a session and exit
    #[arg(long, value_name = "SESSION", conflicts_with_all = ["stats", "dry_run"])]
    cleanup: Option<String>,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "cleanup"])]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let storage = Arc::new(
        open_storage(Path::new(&config.storage.database_path))
            .context("Failed to open storage")?,
    );

    if let Some(session_id) = &cli.stats {
        handle_stats(&storage, session_id)
    } else if let Some(session_id) = &cli.cleanup {
        handle_cleanup(&config, storage, session_id).await
    } else {
        handle_crawl(&config, storage, cli.session_id, cli.previous_session).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("driftnet=info,warn"),
            1 => EnvFilter::new("driftnet=debug,info"),
            2 => EnvFilter::new("driftnet=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Driftnet Dry Run ===\n");

    println!("Crawler:");
    println!("  Threads: {}", config.crawler.thread_count);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max access count: {}", config.crawler.max_access_count);
    println!("  Idle checks: {}", config.crawler.max_thread_check_count);

    println!("\nRetry:");
    println!("  Attempts: {}", config.retry.max_retry_count);
    println!("  Interval: {}ms", config.retry.retry_interval);

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Timeout: {}s", config.http.timeout);
    println!("  Max content length: {}", config.http.max_content_length);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nFilter:");
    for pattern in &config.filter.includes {
        println!("  + {}", pattern);
    }
    for pattern in &config.filter.excludes {
        println!("  - {}", pattern);
    }

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics for a session
fn handle_stats(storage: &SqliteStorage, session_id: &str) -> anyhow::Result<()> {
    let stats = load_statistics(storage, storage, session_id)?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the --cleanup mode: deletes a session's queue, results and patterns
async fn handle_cleanup(
    config: &Config,
    storage: Arc<SqliteStorage>,
    session_id: &str,
) -> anyhow::Result<()> {
    let crawler = Crawler::from_config(config, storage)?;
    crawler.cleanup(session_id).await?;
    println!("✓ Session {} removed", session_id);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    storage: Arc<SqliteStorage>,
    session_id: Option<String>,
    previous_session: Option<String>,
) -> anyhow::Result<()> {
    let crawler = Crawler::from_config(config, storage.clone())?;

    let mut spec = SessionSpec::from_config(config);
    spec.session_id = session_id;
    spec.previous_session = previous_session;

    let session_id = crawler.start(spec).context("Failed to start session")?;

    let termination = crawler.await_termination(&session_id);
    tokio::pin!(termination);

    let result = tokio::select! {
        result = &mut termination => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, stopping session {}", session_id);
            crawler.stop(&session_id)?;
            termination.await
        }
    };

    match result {
        Ok(()) => tracing::info!("Session {} completed", session_id),
        Err(e) => {
            tracing::error!("Session {} failed: {}", session_id, e);
            return Err(e.into());
        }
    }

    let stats = load_statistics(storage.as_ref(), storage.as_ref(), &session_id)?;
    print_statistics(&stats);

    Ok(())
}
