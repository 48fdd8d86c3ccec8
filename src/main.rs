//! Blog-Sweep main entry point
//!
//! This is the command-line interface for the Blog-Sweep crawler.

use anyhow::Context;
use blog_sweep::config::{load_config_with_hash, Config, PageSource};
use blog_sweep::crawler::{
    crawl, parse_page_range, resume_id, CrawlControl, CrawlCursor, CrawlPhase, PageAddress,
};
use blog_sweep::output::print_statistics;
use blog_sweep::storage::{open_storage, BlogStore};
use blog_sweep::BlogState;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Pages shown per lane in a dry run
const DRY_RUN_PAGES: usize = 3;

/// Blog-Sweep: a parallel blog crawler
///
/// Blog-Sweep scans a blog's feed over several lanes at once and downloads
/// every post it has not seen before, keeping statistics about what it found.
#[derive(Parser, Debug)]
#[command(name = "blog-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A parallel blog crawler", long_about = None)]
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

    /// Rescan every page, ignoring the saved resume id
    #[arg(long)]
    fresh: bool,

    /// Validate config and show which pages would be scanned
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show the saved blog statistics and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);
    for setting in config.ignored_settings() {
        tracing::warn!(
            "'{}' has no effect with source = \"html\" and will be ignored",
            setting
        );
    }

    if cli.dry_run {
        handle_dry_run(&config, cli.fresh)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_crawl(&config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("blog_sweep=info,warn"),
            1 => EnvFilter::new("blog_sweep=debug,info"),
            2 => EnvFilter::new("blog_sweep=trace,debug"),
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

fn load_state(config: &Config) -> anyhow::Result<BlogState> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .with_context(|| format!("failed to open {}", config.output.database_path))?;
    Ok(storage
        .load_blog_state(&config.blog.name)?
        .unwrap_or_else(|| BlogState::new(&config.blog.name)))
}

/// Handles the --dry-run mode: validates config and shows the lane plan
fn handle_dry_run(config: &Config, fresh: bool) -> anyhow::Result<()> {
    println!("=== Blog-Sweep Dry Run ===\n");

    println!("Blog:");
    println!("  Name: {}", config.blog.name);
    match config.blog.source {
        PageSource::Api => println!("  Source: api ({})", config.blog.api_base),
        PageSource::Html => println!("  Source: html ({})", config.blog.url),
    }
    println!("  Download location: {}", config.blog.download_location);
    println!("  Database: {}", config.output.database_path);

    let width = config.scan.parallel_scans;
    let pages = config
        .scan
        .download_pages
        .as_deref()
        .map(parse_page_range)
        .transpose()?
        .map(Arc::<[u64]>::from);

    let state = load_state(config)?;
    let resume = if fresh { 0 } else { resume_id(config, &state) };

    println!("\nScan:");
    println!("  Lanes: {}", width);
    println!("  Resume id: {}", resume);
    if let Some(pages) = &pages {
        println!("  Page list: {} pages", pages.len());
    }
    let tags = config.tag_filter();
    if !tags.is_empty() {
        println!("  Tags: {}", tags.join(", "));
    }

    let address = PageAddress::from_config(&config.blog);
    for lane in 0..width {
        let Some(mut cursor) = CrawlCursor::for_lane(lane, width, pages.as_ref()) else {
            println!("\n  Lane {}: idle", lane);
            continue;
        };
        println!("\n  Lane {}:", lane);
        for _ in 0..DRY_RUN_PAGES {
            println!("    {}", address.url_for(cursor.current()));
            if !cursor.advance() {
                break;
            }
        }
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows the saved blog statistics
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);
    let state = load_state(config)?;
    print_statistics(&state);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring saved resume id)");
    } else {
        tracing::info!("Starting crawl (resuming from saved state if present)");
    }
    tracing::info!(
        "Blog: {}, lanes: {}",
        config.blog.name,
        config.scan.parallel_scans
    );

    let control = CrawlControl::new();
    {
        let control = control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling crawl");
                control.cancel();
            }
        });
    }

    let report = crawl(config, control, fresh)
        .await
        .context("crawl failed")?;

    println!("\n=== Crawl Summary: {} ===", config.blog.name);
    println!(
        "  Result: {}",
        if report.phase == CrawlPhase::Cancelled {
            "cancelled"
        } else {
            "complete"
        }
    );
    println!("  Pages crawled: {}", report.scan.pages_crawled);
    for lane in &report.scan.lanes {
        println!(
            "    lane {}: {} pages, {:?}",
            lane.lane, lane.pages_crawled, lane.outcome
        );
    }
    println!("  Items processed: {}", report.download.items_processed);
    println!("  Downloaded: {}", report.download.downloaded_total());
    println!("  Already present: {}", report.download.satisfied);
    if report.download.failed > 0 {
        println!("  Failed: {}", report.download.failed);
    }
    if let Some(stats) = &report.reconciled {
        println!("  Distinct posts: {}", stats.total_count);
    }

    Ok(())
}
