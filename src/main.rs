//! Folio-Sweep main entry point
//!
//! This is the command-line interface for the Folio-Sweep catalog crawler.

use anyhow::{bail, Context};
use clap::Parser;
use folio_sweep::config::{load_config_with_hash, CrawlSettings, Overrides};
use folio_sweep::crawler::{Coordinator, HttpFetcher, Stores};
use folio_sweep::output::{load_progress, print_progress, print_summary, write_summary};
use folio_sweep::storage::{open_storage, RunLog, RunStatus, SqliteStorage};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Folio-Sweep: an incremental catalog crawler
///
/// Folio-Sweep walks the paginated listings of a catalog section by section,
/// fetches the items the store does not know yet and checkpoints how far
/// each section got, so the next run picks up where this one stopped.
#[derive(Parser, Debug)]
#[command(name = "folio-sweep")]
#[command(version = "1.0.0")]
#[command(about = "An incremental catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Run mode: full, latest or backfill
    #[arg(long, env = "FOLIO_RUN_MODE")]
    mode: Option<String>,

    /// Maximum listing pages per section (negative = unbounded)
    #[arg(long, env = "FOLIO_MAX_PAGES", allow_negative_numbers = true)]
    max_pages: Option<i64>,

    /// Maximum items fetched per section (negative = unbounded)
    #[arg(long, env = "FOLIO_MAX_ITEMS_PER_SECTION", allow_negative_numbers = true)]
    max_items_per_section: Option<i64>,

    /// Maximum new items for a whole backfill run (negative = unbounded)
    #[arg(long, env = "FOLIO_BACKFILL_MAX_NEW_ITEMS", allow_negative_numbers = true)]
    backfill_max_new_items: Option<i64>,

    /// Where to write the JSON run summary
    #[arg(long, env = "FOLIO_STATS_OUTPUT", value_name = "PATH")]
    stats_output: Option<PathBuf>,

    /// Start even if another run is still marked as running
    #[arg(long)]
    force: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "progress")]
    dry_run: bool,

    /// Show stored section progress and recent runs, then exit
    #[arg(long, conflicts_with = "dry_run")]
    progress: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            mode: self.mode.clone(),
            max_pages: self.max_pages,
            max_items_per_section: self.max_items_per_section,
            backfill_max_new_items: self.backfill_max_new_items,
            stats_output_path: self.stats_output.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("invalid configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let settings = CrawlSettings::resolve(&config, &cli.overrides())?;

    if cli.dry_run {
        handle_dry_run(&settings);
    } else if cli.progress {
        handle_progress(&settings)?;
    } else {
        handle_crawl(settings, &config_hash, cli.force).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("folio_sweep=info,warn"),
            1 => EnvFilter::new("folio_sweep=debug,info"),
            2 => EnvFilter::new("folio_sweep=trace,debug"),
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

/// Handles the --dry-run mode: shows the resolved settings
fn handle_dry_run(settings: &CrawlSettings) {
    println!("=== Folio-Sweep Dry Run ===\n");

    let limits = &settings.limits;
    println!("Run:");
    println!("  Mode: {}", settings.mode);
    println!("  Max pages per section: {}", limits.max_pages);
    println!("  Max items per section: {}", limits.max_items_per_section);
    println!("  Latest min pages: {}", limits.latest_min_pages);
    println!("  Latest known page streak: {}", limits.latest_known_page_streak);
    println!("  Backfill pages per run: {}", limits.backfill_pages_per_run);
    println!("  Backfill max new items: {}", limits.backfill_max_new_items);

    let fetch = &settings.fetch;
    println!("\nFetching:");
    println!("  User agent: {}", fetch.user_agent);
    println!(
        "  Concurrency: {} global, {} per host",
        fetch.max_concurrent_requests, fetch.max_concurrent_requests_per_host
    );
    println!("  Delay between requests to a host: {:?}", fetch.download_delay);
    println!("  Timeout: {:?}, retries: {}", fetch.request_timeout, fetch.max_retries);

    println!("\nOutput:");
    println!("  Database: {}", settings.database_path.display());
    match &settings.stats_output_path {
        Some(path) => println!("  Summary: {}", path.display()),
        None => println!("  Summary: (not written)"),
    }

    println!("\nSections ({}):", settings.sections.len());
    for section in &settings.sections {
        println!("  - {}: {}", section.name, section.base_url);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --progress mode: shows stored progress
fn handle_progress(settings: &CrawlSettings) -> anyhow::Result<()> {
    println!("Database: {}\n", settings.database_path.display());
    let storage = open_storage(&settings.database_path)?;
    let report = load_progress(&storage, 10)?;
    print_progress(&report);
    Ok(())
}

/// Refuses to start while another run is marked as running
///
/// With `force` the stale run is marked interrupted instead.
fn claim_run(storage: &SqliteStorage, force: bool) -> anyhow::Result<()> {
    let Some(running) = storage.latest_running()? else {
        return Ok(());
    };

    if !force {
        bail!(
            "run {} ({}, started {}) is still marked as running; use --force if it is stale",
            running.id,
            running.mode,
            running.started_at
        );
    }

    tracing::warn!("Marking stale run {} as interrupted", running.id);
    storage.finish_run(running.id, RunStatus::Interrupted, None)?;
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    settings: CrawlSettings,
    config_hash: &str,
    force: bool,
) -> anyhow::Result<()> {
    let storage = match open_storage(&settings.database_path) {
        Ok(storage) => Some(Arc::new(storage)),
        Err(e) => {
            tracing::warn!(
                "Could not open {}, crawling without a store: {}",
                settings.database_path.display(),
                e
            );
            None
        }
    };

    let run_id = match &storage {
        Some(storage) => {
            claim_run(storage, force)?;
            let id = storage.create_run(settings.mode.as_str(), config_hash)?;
            tracing::info!("Recorded run {}", id);
            Some(id)
        }
        None => None,
    };

    let stores = storage
        .clone()
        .map(Stores::sqlite)
        .unwrap_or_else(Stores::unavailable);
    let fetcher = Arc::new(HttpFetcher::new(&settings.fetch)?);
    let stats_output_path = settings.stats_output_path.clone();
    let coordinator = Coordinator::new(settings, fetcher.clone(), stores)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after in-flight requests");
            on_signal.cancel();
        }
    });

    let summary = coordinator.run(cancel.clone()).await;

    for (host, count) in fetcher.throttle().request_counts() {
        tracing::debug!("{} request(s) sent to {}", count, host);
    }

    if let Some(path) = &stats_output_path {
        match write_summary(&summary, path) {
            Ok(()) => tracing::info!("Summary written to {}", path.display()),
            Err(e) => tracing::warn!("Could not write summary to {}: {}", path.display(), e),
        }
    }

    if let (Some(storage), Some(run_id)) = (&storage, run_id) {
        let status = if cancel.is_cancelled() {
            RunStatus::Interrupted
        } else {
            RunStatus::Completed
        };
        let json = summary.to_ascii_json()?;
        if let Err(e) = storage.finish_run(run_id, status, Some(&json)) {
            tracing::warn!("Could not record the end of run {}: {}", run_id, e);
        }
    }

    print_summary(&summary);
    Ok(())
}
