//! Progress reporting
//!
//! The engine emits a `ProgressEvent` once per crawled page, once per attempted
//! download and at every phase boundary. Front ends implement `ProgressReporter`;
//! `TracingReporter` forwards everything to the log.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Phases reported at start and finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Scan,
    Download,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Scan => write!(f, "scan"),
            Phase::Download => write!(f, "download"),
        }
    }
}

/// User-visible warnings, each reported at most once per crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlWarning {
    /// The blog requires a login the session does not have
    NotLoggedIn,
    /// The remote throttled the crawl
    RateLimited,
}

impl CrawlWarning {
    fn index(self) -> usize {
        match self {
            CrawlWarning::NotLoggedIn => 0,
            CrawlWarning::RateLimited => 1,
        }
    }
}

impl fmt::Display for CrawlWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlWarning::NotLoggedIn => {
                write!(f, "Not logged in; the blog may be private or require a session cookie")
            }
            CrawlWarning::RateLimited => {
                write!(f, "Rate limit exceeded; some pages were not scanned")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    PhaseStarted(Phase),
    PhaseFinished(Phase),
    /// A lane finished a page; `pages_total` counts pages across all lanes
    PageCrawled {
        lane: u32,
        page: u64,
        pages_total: u64,
    },
    DownloadAttempt {
        file_name: String,
    },
    Warning(CrawlWarning),
}

/// Receives progress notifications from lanes and the download executor
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Logs progress events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::PhaseStarted(phase) => tracing::info!("Starting {}", phase),
            ProgressEvent::PhaseFinished(phase) => tracing::info!("Finished {}", phase),
            ProgressEvent::PageCrawled {
                lane,
                page,
                pages_total,
            } => tracing::info!(
                "Lane {} crawled page {} ({} pages total)",
                lane,
                page,
                pages_total
            ),
            ProgressEvent::DownloadAttempt { file_name } => {
                tracing::info!("Downloading {}", file_name)
            }
            ProgressEvent::Warning(warning) => tracing::warn!("{}", warning),
        }
    }
}

/// Keeps every event, for tests and front ends that poll
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

/// Ensures each warning kind is raised once per crawl, however many lanes hit it
#[derive(Debug, Default)]
pub struct WarningLatch {
    raised: [AtomicBool; 2],
}

impl WarningLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `warning` unless it was already raised
    ///
    /// # Returns
    ///
    /// `true` if this call raised the warning
    pub fn raise(&self, warning: CrawlWarning, reporter: &dyn ProgressReporter) -> bool {
        if self.raised[warning.index()].swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::warn!("{}", warning);
        reporter.report(ProgressEvent::Warning(warning));
        true
    }

    pub fn was_raised(&self, warning: CrawlWarning) -> bool {
        self.raised[warning.index()].load(Ordering::Acquire)
    }
}
