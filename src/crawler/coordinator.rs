//! Scan coordination
//!
//! This module fans a scan out over `width` lanes and joins them again:
//! - Starting cursors are disjoint, one stride-`width` sequence per lane
//! - Every lane holds a concurrency permit for its whole lifetime
//! - Once all lanes are done the queue is closed and the statistics are sealed

use crate::config::Config;
use crate::crawler::control::CrawlControl;
use crate::crawler::cursor::{parse_page_range, CrawlCursor};
use crate::crawler::extractor::PostExtractor;
use crate::crawler::lane::{LaneOutcome, LaneReport, LaneScanner, PageAddress, RateLimitBackoff};
use crate::crawler::queue::SharedQueue;
use crate::crawler::transport::Transport;
use crate::output::{Phase, ProgressEvent, ProgressReporter, StatisticsBag, StatisticsSnapshot, WarningLatch};
use crate::ConfigError;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Result of a whole scan
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// One report per lane, ordered by lane number
    pub lanes: Vec<LaneReport>,

    /// Pages crawled across all lanes
    pub pages_crawled: u64,

    /// Highest post id seen by any lane
    pub highest_post_id: u64,

    /// Sealed statistics; `None` when the scan was cancelled
    pub statistics: Option<StatisticsSnapshot>,
}

impl ScanReport {
    pub fn cancelled(&self) -> bool {
        self.statistics.is_none()
    }

    /// True when every lane was exhausted or caught up
    pub fn all_lanes_complete(&self) -> bool {
        self.lanes.iter().all(|lane| lane.outcome.is_complete())
    }
}

/// Runs `width` lanes against one blog
pub struct ScanCoordinator {
    width: u32,
    page_list: Option<Arc<[u64]>>,
    transport: Arc<dyn Transport>,
    extractor: Arc<PostExtractor>,
    address: Arc<PageAddress>,
    reporter: Arc<dyn ProgressReporter>,
    warnings: Arc<WarningLatch>,
    control: CrawlControl,
    resume_id: u64,
    backoff: RateLimitBackoff,
}

impl ScanCoordinator {
    /// Creates a coordinator with stride cursors, no resume id and no backoff
    pub fn new(
        width: u32,
        transport: Arc<dyn Transport>,
        extractor: PostExtractor,
        address: PageAddress,
        reporter: Arc<dyn ProgressReporter>,
        control: CrawlControl,
    ) -> Self {
        Self {
            width: width.max(1),
            page_list: None,
            transport,
            extractor: Arc::new(extractor),
            address: Arc::new(address),
            reporter,
            warnings: Arc::new(WarningLatch::new()),
            control,
            resume_id: 0,
            backoff: RateLimitBackoff::disabled(),
        }
    }

    /// Creates a coordinator from the configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The crawl configuration
    /// * `resume_id` - Post id below which pages count as already seen (0 = none)
    /// * `transport` - Page transport shared by all lanes
    /// * `reporter` - Progress sink
    /// * `control` - Cancellation and pause signals
    ///
    /// # Returns
    ///
    /// * `Ok(ScanCoordinator)` - Ready to run
    /// * `Err(ConfigError)` - The configured page list is invalid
    pub fn from_config(
        config: &Config,
        resume_id: u64,
        transport: Arc<dyn Transport>,
        reporter: Arc<dyn ProgressReporter>,
        control: CrawlControl,
    ) -> Result<Self, ConfigError> {
        let page_list = config
            .scan
            .download_pages
            .as_deref()
            .map(parse_page_range)
            .transpose()?;

        let mut coordinator = Self::new(
            config.scan.parallel_scans,
            transport,
            PostExtractor::from_config(config),
            PageAddress::from_config(&config.blog),
            reporter,
            control,
        );
        coordinator.page_list = page_list.map(Arc::from);
        coordinator.resume_id = resume_id;
        coordinator.backoff = RateLimitBackoff::from_config(&config.scan);
        Ok(coordinator)
    }

    /// Restricts the scan to an explicit page list
    pub fn with_page_list(mut self, pages: Vec<u64>) -> Self {
        self.page_list = Some(pages.into());
        self
    }

    pub fn with_resume_id(mut self, resume_id: u64) -> Self {
        self.resume_id = resume_id;
        self
    }

    pub fn with_backoff(mut self, backoff: RateLimitBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// The one-shot warning latch shared by all lanes of this coordinator
    pub fn warnings(&self) -> &WarningLatch {
        &self.warnings
    }

    /// Scans the blog, pushing every extracted item into `queue`
    ///
    /// The queue is marked producers-done before this returns, whatever the
    /// lanes' outcomes.
    pub async fn run(&self, queue: Arc<SharedQueue>) -> ScanReport {
        self.reporter.report(ProgressEvent::PhaseStarted(Phase::Scan));
        tracing::info!(
            "Scanning with {} lanes{}",
            self.width,
            if self.resume_id > 0 {
                format!(", resuming below post {}", self.resume_id)
            } else {
                String::new()
            }
        );

        let statistics = StatisticsBag::new();
        let scanner = LaneScanner {
            transport: self.transport.clone(),
            extractor: self.extractor.clone(),
            address: self.address.clone(),
            queue: queue.clone(),
            statistics: statistics.clone(),
            reporter: self.reporter.clone(),
            warnings: self.warnings.clone(),
            control: self.control.clone(),
            pages_total: Arc::new(AtomicU64::new(0)),
            resume_id: self.resume_id,
            backoff: self.backoff,
        };

        let permits = Arc::new(Semaphore::new(self.width as usize));
        let mut lanes = JoinSet::new();
        let mut reports = Vec::with_capacity(self.width as usize);

        for lane in 0..self.width {
            let Some(cursor) = CrawlCursor::for_lane(lane, self.width, self.page_list.as_ref())
            else {
                // The page list is shorter than the lane count
                reports.push(LaneReport::new(lane, LaneOutcome::Exhausted));
                continue;
            };

            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!("Lane permits unavailable: {}", e);
                    reports.push(LaneReport::new(lane, LaneOutcome::Failed(e.to_string())));
                    continue;
                }
            };

            let scanner = scanner.clone();
            lanes.spawn(async move {
                let report = scanner.scan(lane, cursor).await;
                drop(permit);
                report
            });
        }
        drop(scanner);

        while let Some(joined) = lanes.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!("Lane task failed: {}", e),
            }
        }

        // Lanes that panicked left no report behind
        for lane in 0..self.width {
            if !reports.iter().any(|r| r.lane == lane) {
                reports.push(LaneReport::new(
                    lane,
                    LaneOutcome::Failed("lane task panicked".to_string()),
                ));
            }
        }
        reports.sort_by_key(|r| r.lane);

        queue.mark_producers_done();

        let statistics = if self.control.is_cancelled() {
            None
        } else {
            match StatisticsBag::seal(statistics) {
                Ok(snapshot) => Some(snapshot),
                Err(_) => {
                    tracing::error!("Statistics still shared after all lanes finished");
                    None
                }
            }
        };

        let report = ScanReport {
            pages_crawled: reports.iter().map(|r| r.pages_crawled).sum(),
            highest_post_id: reports.iter().map(|r| r.highest_post_id).max().unwrap_or(0),
            lanes: reports,
            statistics,
        };

        tracing::info!(
            "Scan finished: {} pages, {} lanes complete",
            report.pages_crawled,
            report.lanes.iter().filter(|r| r.outcome.is_complete()).count()
        );
        self.reporter.report(ProgressEvent::PhaseFinished(Phase::Scan));
        report
    }
}
