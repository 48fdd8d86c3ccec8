//! Crawl orchestration
//!
//! Runs the scan and the download executor side by side, joined by the
//! shared queue, then reconciles statistics and finalizes the blog state.
//!
//! ```text
//! Idle -> Scanning -> Reconciling -> Finalized
//!                 \-> Cancelled
//! ```

use crate::crawler::coordinator::{ScanCoordinator, ScanReport};
use crate::crawler::control::CrawlControl;
use crate::crawler::downloader::{DownloadExecutor, DownloadReport};
use crate::crawler::queue::SharedQueue;
use crate::output::StatisticsSnapshot;
use crate::state::{BlogState, PostType};
use crate::storage::BlogStore;
use crate::SweepError;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Externally visible state of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    /// Lanes are scanning while the executor downloads
    Scanning,
    /// Scan done; statistics computed while downloads drain
    Reconciling,
    Finalized,
    Cancelled,
}

/// Aggregates derived from the sealed statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciledStats {
    /// Items seen per type, duplicates included
    pub counts: HashMap<PostType, u64>,
    pub duplicate_photos: u64,
    pub duplicate_videos: u64,
    pub duplicate_audios: u64,
    /// Distinct `(type, payload)` pairs
    pub total_count: u64,
}

impl ReconciledStats {
    pub fn from_snapshot(snapshot: &StatisticsSnapshot) -> Self {
        let counts = PostType::all_types()
            .into_iter()
            .map(|t| (t, snapshot.count(t)))
            .collect();
        let duplicates: u64 = PostType::all_types()
            .into_iter()
            .map(|t| snapshot.determine_duplicates(t))
            .sum();

        Self {
            counts,
            duplicate_photos: snapshot.determine_duplicates(PostType::Photo),
            duplicate_videos: snapshot.determine_duplicates(PostType::Video),
            duplicate_audios: snapshot.determine_duplicates(PostType::Audio),
            total_count: snapshot.total() - duplicates,
        }
    }

    /// Writes the aggregates into `state`
    pub fn apply(&self, state: &mut BlogState) {
        for post_type in PostType::all_types() {
            state.set_count(post_type, self.counts.get(&post_type).copied().unwrap_or(0));
        }
        state.duplicate_photos = self.duplicate_photos;
        state.duplicate_videos = self.duplicate_videos;
        state.duplicate_audios = self.duplicate_audios;
        state.total_count = self.total_count;
    }
}

/// Outcome of one crawl
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// `Finalized`, or `Cancelled` if cancellation was requested
    pub phase: CrawlPhase,
    pub scan: ScanReport,
    pub download: DownloadReport,
    /// `None` when cancelled
    pub reconciled: Option<ReconciledStats>,
}

pub struct CrawlOrchestrator {
    coordinator: ScanCoordinator,
    executor: Arc<DownloadExecutor>,
    store: Arc<dyn BlogStore>,
    control: CrawlControl,
    phase: watch::Sender<CrawlPhase>,
}

impl CrawlOrchestrator {
    pub fn new(
        coordinator: ScanCoordinator,
        executor: DownloadExecutor,
        store: Arc<dyn BlogStore>,
        control: CrawlControl,
    ) -> Self {
        let (phase, _) = watch::channel(CrawlPhase::Idle);
        Self {
            coordinator,
            executor: Arc::new(executor),
            store,
            control,
            phase,
        }
    }

    pub fn phase(&self) -> CrawlPhase {
        *self.phase.borrow()
    }

    /// Receiver notified on every phase change
    pub fn subscribe(&self) -> watch::Receiver<CrawlPhase> {
        self.phase.subscribe()
    }

    pub fn control(&self) -> &CrawlControl {
        &self.control
    }

    fn enter(&self, phase: CrawlPhase) {
        tracing::debug!("Crawl phase: {:?}", phase);
        self.phase.send_replace(phase);
    }

    /// Crawls the blog and updates `state`
    ///
    /// # Crawl Flow
    ///
    /// 1. Spawn the download executor on the shared queue
    /// 2. Scan all lanes inline; the queue closes when they finish
    /// 3. Reconcile statistics from the sealed snapshot
    /// 4. Wait for the executor to drain the queue
    /// 5. Unless cancelled, write aggregates and the crawl time; the resume id
    ///    only advances when every lane ran to its natural end
    /// 6. Always add download counters and previews, then persist `state`
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The crawl ran (possibly cancelled)
    /// * `Err(SweepError)` - The state could not be persisted
    pub async fn run(&self, state: &mut BlogState) -> Result<CrawlReport, SweepError> {
        let queue = Arc::new(SharedQueue::new());
        self.enter(CrawlPhase::Scanning);

        let download = {
            let executor = self.executor.clone();
            let queue = queue.clone();
            tokio::spawn(async move { executor.run(queue).await })
        };

        let scan = self.coordinator.run(queue.clone()).await;

        let reconciled = match (&scan.statistics, self.control.is_cancelled()) {
            (Some(snapshot), false) => {
                self.enter(CrawlPhase::Reconciling);
                Some(ReconciledStats::from_snapshot(snapshot))
            }
            _ => None,
        };

        let download = match download.await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Download task failed: {}", e);
                DownloadReport::default()
            }
        };

        let cancelled = self.control.is_cancelled() || reconciled.is_none();
        if !cancelled {
            if let Some(stats) = &reconciled {
                stats.apply(state);
                if scan.all_lanes_complete() {
                    state.last_id = state.last_id.max(scan.highest_post_id);
                } else {
                    tracing::warn!(
                        "Some lanes stopped early; keeping resume id {} so their pages are rescanned",
                        state.last_id
                    );
                }
                state.last_complete_crawl = Some(Utc::now());
            }
        }

        for (post_type, count) in &download.downloaded {
            state.add_downloaded(*post_type, *count);
        }
        if download.last_photo.is_some() {
            state.last_downloaded_photo = download.last_photo.clone();
        }
        if download.last_video.is_some() {
            state.last_downloaded_video = download.last_video.clone();
        }

        self.store.save_blog_state(state)?;

        let phase = if cancelled {
            CrawlPhase::Cancelled
        } else {
            CrawlPhase::Finalized
        };
        self.enter(phase);
        tracing::info!(
            "Crawl of {} {}: {} pages, {} downloads",
            state.name,
            if cancelled { "cancelled" } else { "finished" },
            scan.pages_crawled,
            download.downloaded_total()
        );

        Ok(CrawlReport {
            phase,
            scan,
            download,
            reconciled: if cancelled { None } else { reconciled },
        })
    }
}
