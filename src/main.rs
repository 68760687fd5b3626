//! Dantri crawler main entry point
//!
//! This is the command-line interface for the news crawler.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use dantri_crawler::config::{load_config_with_hash, validate, Config};
use dantri_crawler::crawler::run_crawl;
use dantri_crawler::output::print_statistics;
use dantri_crawler::PipelineMode;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Dantri crawler: collects and parses news articles
///
/// Discovers topics from the site's home page, follows each topic's listing
/// pages, then fetches and parses every article through a pool of workers.
#[derive(Parser, Debug)]
#[command(name = "dantri-crawler")]
#[command(version)]
#[command(about = "A polite, concurrent news crawler", long_about = None)]
struct Cli {
    /// How article workers are scheduled
    #[arg(short, long, value_enum, default_value_t = Method::Thread)]
    method: Method,

    /// Path to TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Listing pages followed per topic
    #[arg(long, value_name = "PAGES")]
    max_pagination: Option<u32>,

    /// Number of concurrent workers
    #[arg(long, value_name = "WORKERS")]
    num_workers: Option<usize>,

    /// Maximum number of articles to process
    #[arg(long, value_name = "COUNT")]
    num_news: Option<usize>,

    /// Ignore the cached URL list and rediscover links
    #[arg(long)]
    fresh: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    /// One worker, no concurrency
    Sync,
    /// Workers spawned as parallel tasks
    Thread,
    /// Workers polled together on a single task
    Async,
}

impl From<Method> for PipelineMode {
    fn from(method: Method) -> Self {
        match method {
            Method::Sync => PipelineMode::Sequential,
            Method::Thread => PipelineMode::Threaded,
            Method::Async => PipelineMode::Cooperative,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => {
            tracing::info!("No configuration file given, using built-in defaults");
            (Config::default(), None)
        }
    };

    apply_overrides(&mut config, &cli);
    validate(&config).context("Invalid configuration")?;

    tracing::info!(
        "Crawling {} with method {:?}: {} workers, {} pages per topic, up to {} articles",
        config.site.home_url,
        cli.method,
        config.crawler.num_workers,
        config.crawler.max_pagination,
        config.crawler.num_news
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight articles");
                cancel.cancel();
            }
        });
    }

    let mut report = run_crawl(&config, cli.method.into(), cli.fresh, cancel)
        .await
        .context("Crawl failed")?;

    tracing::info!("Parsed {} articles", report.results.len());
    report.stats.config_hash = config_hash;
    print_statistics(&report.stats);
    println!("\nThis method took {:.2} seconds", report.stats.elapsed.as_secs_f64());

    Ok(())
}

/// Applies command-line values over the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(max_pagination) = cli.max_pagination {
        config.crawler.max_pagination = max_pagination;
    }
    if let Some(num_workers) = cli.num_workers {
        config.crawler.num_workers = num_workers;
    }
    if let Some(num_news) = cli.num_news {
        config.crawler.num_news = num_news;
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("dantri_crawler=info,warn"),
            1 => EnvFilter::new("dantri_crawler=debug,info"),
            2 => EnvFilter::new("dantri_crawler=trace,debug"),
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
