//! Crawler module for scanning blogs and downloading their content
//!
//! This module contains the core crawling logic, including:
//! - HTTP transport with status classification
//! - Page extraction for the JSON API and rendered HTML pages
//! - Parallel lanes joined to a single download executor by a shared queue
//! - Cancellation, pause, and overall crawl orchestration

mod control;
mod coordinator;
mod cursor;
mod downloader;
mod extractor;
mod lane;
mod orchestrator;
mod queue;
mod transport;

pub use control::{CrawlControl, PauseToken};
pub use coordinator::{ScanCoordinator, ScanReport};
pub use cursor::{parse_page_range, resume_id, CrawlCursor};
pub use downloader::{
    parse_post_time, DownloadError, DownloadExecutor, DownloadOutcome, DownloadReport,
    DownloadSettings,
};
pub use extractor::{ExtractSettings, PageExtract, PostExtractor};
pub use lane::{LaneOutcome, LaneReport, PageAddress, RateLimitBackoff};
pub use orchestrator::{CrawlOrchestrator, CrawlPhase, CrawlReport, ReconciledStats};
pub use queue::SharedQueue;
pub use transport::{build_http_client, classify_status, HttpTransport, Transport};

use crate::config::Config;
use crate::output::{ProgressReporter, TracingReporter};
use crate::state::BlogState;
use crate::storage::{open_storage, BlogStore, LinkIndex};
use crate::SweepError;
use std::path::Path;
use std::sync::Arc;

/// Runs a complete crawl of the configured blog
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the database and load the blog's saved state
/// 2. Resolve the resume id (ignored when `fresh` is set)
/// 3. Build the HTTP transport and the content index
/// 4. Scan and download concurrently
/// 5. Persist the updated blog state
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `control` - Cancellation and pause signals
/// * `fresh` - Rescan every page regardless of the saved resume id
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed or was cancelled
/// * `Err(SweepError)` - Setup or persistence failed
pub async fn crawl(
    config: &Config,
    control: CrawlControl,
    fresh: bool,
) -> Result<CrawlReport, SweepError> {
    let storage = Arc::new(open_storage(Path::new(&config.output.database_path))?);
    let mut state = storage
        .load_blog_state(&config.blog.name)?
        .unwrap_or_else(|| BlogState::new(&config.blog.name));

    let resume = if fresh { 0 } else { resume_id(config, &state) };

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.connection)?);
    let reporter: Arc<dyn ProgressReporter> = Arc::new(TracingReporter);
    let index = Arc::new(LinkIndex::new(
        &config.blog.name,
        Path::new(&config.blog.download_location),
        storage.clone(),
    )?);

    let coordinator = ScanCoordinator::from_config(
        config,
        resume,
        transport.clone(),
        reporter.clone(),
        control.clone(),
    )?;
    let executor = DownloadExecutor::new(
        DownloadSettings::from_config(config),
        transport,
        index,
        reporter,
        control.clone(),
    );

    let orchestrator = CrawlOrchestrator::new(coordinator, executor, storage, control);
    orchestrator.run(&mut state).await
}
