//! Output module for progress and statistics
//!
//! This module handles:
//! - Reporting crawl progress to the front end
//! - One-shot user warnings
//! - Collecting and displaying per-type statistics

pub mod progress;
pub mod stats;

pub use progress::{
    CrawlWarning, Phase, ProgressEvent, ProgressReporter, RecordingReporter, TracingReporter,
    WarningLatch,
};
pub use stats::{print_statistics, StatisticsBag, StatisticsSnapshot};
