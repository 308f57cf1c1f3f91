//! Fedcat main entry point
//!
//! This is the command-line interface for the federated catalog crawler.

use anyhow::Context;
use clap::Parser;
use fedcat::cache::{CatalogCache, CatalogQueryService, InMemoryCatalogCache, QuerySpec};
use fedcat::config::{load_config_with_hash, CacheBackend, Config};
use fedcat::crawler::{build_execution_manager, ActionRegistry, RecurringExecutionPlan};
use fedcat::directory::{sync_targets, InMemoryTargetDirectory, TargetDirectory};
use fedcat::fetch::{CatalogRequestAction, HttpTransport, JsonCatalogDecoder, PagingCatalogFetcher};
use fedcat::storage::open_storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Fedcat: a federated catalog crawler
///
/// Fedcat periodically asks every node in its target directory for its
/// catalog, follows pagination and nested catalogs, and keeps the latest
/// catalog of each node in a local cache.
#[derive(Parser, Debug)]
#[command(name = "fedcat")]
#[command(version)]
#[command(about = "A federated catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "once")]
    dry_run: bool,

    /// Run a single crawl cycle, print the cached catalogs as JSON and exit
    #[arg(long)]
    once: bool,

    /// With --once, print one flattened catalog per node
    #[arg(long, requires = "once")]
    flatten: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let (directory, cache) = open_backends(&config)?;
    let registry = Arc::new(ActionRegistry::new());
    registry.register(config.fetch.protocol.clone(), Arc::new(build_action(&config)?))?;

    let manager = Arc::new(build_execution_manager(
        &config,
        directory,
        registry,
        Arc::clone(&cache),
    )?);

    if cli.once {
        let report = manager.run_cycle().await;
        tracing::info!(
            "Cycle finished: {} targets, {} succeeded, {} failed, {} skipped in {:?}",
            report.targets,
            report.succeeded,
            report.failed,
            report.skipped,
            report.elapsed
        );

        let catalogs = CatalogQueryService::new(cache).get_catalogs(&QuerySpec::all(), cli.flatten)?;
        println!("{}", serde_json::to_string_pretty(&catalogs)?);
        return Ok(());
    }

    let plan = RecurringExecutionPlan::from_config(&config.crawler);
    manager.execute_plan(&plan);
    if !manager.is_enabled() {
        return Ok(());
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested, waiting for the running cycle to finish");
    manager.shutdown_plan(&plan).await;
    tracing::info!("Crawler stopped");

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// `RUST_LOG` wins over the flags when it is set.
fn setup_logging(verbose: u8, quiet: bool) {
    let default_filter = if quiet {
        "error"
    } else {
        match verbose {
            0 => "fedcat=info,warn",
            1 => "fedcat=debug,info",
            2 => "fedcat=trace,debug",
            _ => "trace",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Picks the directory and cache backends and loads the configured targets
///
/// The configuration is authoritative: a persistent directory is reconciled
/// with it, so targets removed from the file are no longer crawled.
fn open_backends(
    config: &Config,
) -> anyhow::Result<(Arc<dyn TargetDirectory>, Arc<dyn CatalogCache>)> {
    let targets = config.targets.iter().map(|entry| entry.to_target());

    match config.cache.backend {
        CacheBackend::Memory => {
            let directory: Arc<dyn TargetDirectory> =
                Arc::new(InMemoryTargetDirectory::with_targets(targets));
            let cache: Arc<dyn CatalogCache> = Arc::new(InMemoryCatalogCache::new());
            Ok((directory, cache))
        }
        CacheBackend::Sqlite => {
            let path = config
                .cache
                .database_path
                .as_deref()
                .context("sqlite cache backend requires cache.database-path")?;
            let storage = Arc::new(open_storage(Path::new(path))?);
            let removed = sync_targets(&*storage, targets)?;
            if removed > 0 {
                tracing::info!("Dropped {} stored targets no longer configured", removed);
            }
            tracing::info!("Using SQLite storage at {}", path);
            let directory: Arc<dyn TargetDirectory> = storage.clone();
            let cache: Arc<dyn CatalogCache> = storage;
            Ok((directory, cache))
        }
    }
}

fn build_action(config: &Config) -> anyhow::Result<CatalogRequestAction> {
    let transport = Arc::new(HttpTransport::new(&config.transport)?);
    let fetcher = PagingCatalogFetcher::new(transport, Arc::new(JsonCatalogDecoder));
    Ok(CatalogRequestAction::new(fetcher, config.fetch.batch_size))
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Fedcat Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Enabled: {}", config.crawler.enabled);
    println!("  Crawlers: {}", config.crawler.num_crawlers);
    println!("  Period: {}s", config.crawler.period_seconds);
    match config.crawler.initial_delay_seconds {
        Some(delay) => println!("  Initial delay: {}s", delay),
        None => println!("  Initial delay: random"),
    }
    println!("  Max retries: {}", config.crawler.max_retries);

    println!("\nFetch:");
    println!("  Protocol: {}", config.fetch.protocol);
    println!("  Batch size: {}", config.fetch.batch_size);

    println!("\nCache:");
    println!("  Backend: {:?}", config.cache.backend);
    if let Some(path) = &config.cache.database_path {
        println!("  Database: {}", path);
    }

    println!("\nTargets ({}):", config.targets.len());
    for target in &config.targets {
        let skipped = config.node.self_id.as_deref() == Some(target.id.as_str());
        println!(
            "  - {} {} [{}]{}",
            target.id,
            target.url,
            target.protocols.join(", "),
            if skipped { " (self, skipped)" } else { "" }
        );
    }

    println!("\n✓ Configuration is valid");
}
