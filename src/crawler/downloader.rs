//! Download executor
//!
//! The single consumer of the shared queue. For every item it:
//! - Resolves the final URL (resize, raw alternate hosts, original fallback)
//! - Skips anything the content index already knows about
//! - Fetches and stores media, or appends text records to per-type files
//! - Stamps file times, updates counters, registers keys and preview paths
//!
//! A failed item is logged and counted; the executor moves on to the next one.

use crate::config::Config;
use crate::crawler::control::CrawlControl;
use crate::crawler::queue::SharedQueue;
use crate::crawler::transport::Transport;
use crate::output::{Phase, ProgressEvent, ProgressReporter};
use crate::state::{ContentItem, PostType};
use crate::storage::{ContentIndex, StorageError};
use crate::url::{
    build_raw_image_url, canonical_key, file_name, resize_image_url, text_key, PARTIAL_SUFFIX,
    RAW_SIZE,
};
use crate::TransportError;
use chrono::{DateTime, NaiveDateTime};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Failures of a single item
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to write file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to register download: {0}")]
    Storage(#[from] StorageError),

    #[error("No file name in {0}")]
    NoFileName(String),
}

impl DownloadError {
    fn is_cancelled(&self) -> bool {
        matches!(self, DownloadError::Transport(TransportError::Cancelled))
    }
}

/// What happened to one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Stored at the given path
    Downloaded(PathBuf),
    /// Already on disk or registered; nothing fetched
    Satisfied,
}

/// Executor settings
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub download_dir: PathBuf,
    pub image_size: String,
    pub force_size: bool,
    pub alternate_hosts: Vec<String>,
    pub check_directory: bool,
    pub enable_preview: bool,
}

impl DownloadSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            download_dir: PathBuf::from(&config.blog.download_location),
            image_size: config.media.image_size.clone(),
            force_size: config.download.force_size,
            alternate_hosts: config.media.alternate_hosts.clone(),
            check_directory: config.download.check_directory,
            enable_preview: config.download.enable_preview,
        }
    }
}

/// Totals of one executor run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Items taken from the queue
    pub items_processed: u64,

    /// Newly stored items per type
    pub downloaded: HashMap<PostType, u64>,

    /// Items skipped because they already existed
    pub satisfied: u64,

    pub failed: u64,

    /// Preview paths, only tracked when previews are enabled
    pub last_photo: Option<String>,
    pub last_video: Option<String>,
}

impl DownloadReport {
    pub fn downloaded(&self, post_type: PostType) -> u64 {
        self.downloaded.get(&post_type).copied().unwrap_or(0)
    }

    pub fn downloaded_total(&self) -> u64 {
        self.downloaded.values().sum()
    }
}

pub struct DownloadExecutor {
    settings: DownloadSettings,
    transport: Arc<dyn Transport>,
    index: Arc<dyn ContentIndex>,
    reporter: Arc<dyn ProgressReporter>,
    control: CrawlControl,
}

impl DownloadExecutor {
    pub fn new(
        settings: DownloadSettings,
        transport: Arc<dyn Transport>,
        index: Arc<dyn ContentIndex>,
        reporter: Arc<dyn ProgressReporter>,
        control: CrawlControl,
    ) -> Self {
        Self {
            settings,
            transport,
            index,
            reporter,
            control,
        }
    }

    /// Consumes `queue` until it is closed and drained, or the crawl is cancelled
    pub async fn run(&self, queue: Arc<SharedQueue>) -> DownloadReport {
        self.reporter
            .report(ProgressEvent::PhaseStarted(Phase::Download));

        if let Err(e) = tokio::fs::create_dir_all(&self.settings.download_dir).await {
            tracing::warn!(
                "Cannot create {}: {}",
                self.settings.download_dir.display(),
                e
            );
        }

        let mut report = DownloadReport::default();
        loop {
            if !self.control.checkpoint().await {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = self.control.token().cancelled() => break,
                item = queue.take() => item,
            };
            let Some(item) = next else {
                break;
            };

            report.items_processed += 1;
            match self.process(&item).await {
                Ok(DownloadOutcome::Downloaded(path)) => {
                    *report.downloaded.entry(item.post_type()).or_insert(0) += 1;
                    self.track_preview(&item, &path, &mut report);
                }
                Ok(DownloadOutcome::Satisfied) => report.satisfied += 1,
                Err(e) if e.is_cancelled() => {
                    tracing::debug!("Download of {} cancelled", item.post_type());
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to download {} from post {}: {}",
                        item.post_type(),
                        item.post_id(),
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Downloads finished: {} new, {} already present, {} failed",
            report.downloaded_total(),
            report.satisfied,
            report.failed
        );
        self.reporter
            .report(ProgressEvent::PhaseFinished(Phase::Download));
        report
    }

    /// Handles one item
    pub async fn process(&self, item: &ContentItem) -> Result<DownloadOutcome, DownloadError> {
        match item.post_type() {
            PostType::Photo => self.download_photo(item).await,
            PostType::Video | PostType::Audio => self.download_detected(item.payload(), item).await,
            _ => self.write_text(item).await,
        }
    }

    /// Tries the resized and raw-host variants of a photo, then the original URL
    async fn download_photo(&self, item: &ContentItem) -> Result<DownloadOutcome, DownloadError> {
        let original = item.payload();
        let sized = if self.settings.force_size {
            resize_image_url(original, &self.settings.image_size)
        } else {
            original.to_string()
        };

        let mut candidates = Vec::new();
        if self.settings.image_size == RAW_SIZE {
            for host in &self.settings.alternate_hosts {
                match build_raw_image_url(&sized, host) {
                    Ok(url) => candidates.push(url),
                    Err(e) => tracing::debug!("No raw URL for {} on {}: {}", sized, host, e),
                }
            }
        } else if sized != original {
            candidates.push(sized);
        }

        for url in candidates {
            match self.download_detected(&url, item).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => tracing::debug!("Variant {} failed: {}", url, e),
            }
        }

        self.download_detected(original, item).await
    }

    /// Fetches `url` unless its canonical key is already known
    async fn download_detected(
        &self,
        url: &str,
        item: &ContentItem,
    ) -> Result<DownloadOutcome, DownloadError> {
        let key = canonical_key(url);
        if self.index.exists_in_db(&key)
            || (self.settings.check_directory && self.index.exists_on_disk(&key))
        {
            tracing::debug!("Already have {}", key);
            return Ok(DownloadOutcome::Satisfied);
        }

        let name = file_name(url);
        if name.is_empty() {
            return Err(DownloadError::NoFileName(url.to_string()));
        }

        self.reporter.report(ProgressEvent::DownloadAttempt {
            file_name: name.to_string(),
        });

        let body = self.transport.fetch(url, self.control.token()).await?;
        let path = self.settings.download_dir.join(name);
        store_file(&path, &body).await?;

        if let Some(time) = item.timestamp().and_then(parse_post_time) {
            if let Err(e) = set_file_time(&path, time) {
                tracing::debug!("Could not set time of {}: {}", path.display(), e);
            }
        }

        self.index.register(&key)?;
        Ok(DownloadOutcome::Downloaded(path))
    }

    /// Appends a text record to its per-type file
    async fn write_text(&self, item: &ContentItem) -> Result<DownloadOutcome, DownloadError> {
        let key = text_key(item.post_type(), item.payload());
        if self.index.exists_in_db(&key) {
            return Ok(DownloadOutcome::Satisfied);
        }

        let Some(file) = item.post_type().text_file_name() else {
            return Err(DownloadError::NoFileName(item.post_type().to_string()));
        };
        let path = self.settings.download_dir.join(file);

        let mut out = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        out.write_all(item.payload().as_bytes()).await?;
        out.flush().await?;

        self.index.register(&key)?;
        Ok(DownloadOutcome::Downloaded(path))
    }

    fn track_preview(&self, item: &ContentItem, path: &Path, report: &mut DownloadReport) {
        if !self.settings.enable_preview {
            return;
        }

        let shown = std::fs::canonicalize(path)
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string();
        match item.post_type() {
            PostType::Photo if shown.ends_with(".gif") => report.last_video = Some(shown),
            PostType::Photo => report.last_photo = Some(shown),
            PostType::Video => report.last_video = Some(shown),
            _ => {}
        }
    }
}

/// Parses a post time given as unix seconds, RFC 3339, or `"%Y-%m-%d %H:%M:%S GMT"`
pub fn parse_post_time(value: &str) -> Option<SystemTime> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(UNIX_EPOCH + Duration::from_secs(secs));
    }

    let secs = if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        time.timestamp()
    } else {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S GMT")
            .ok()?
            .and_utc()
            .timestamp()
    };
    u64::try_from(secs)
        .ok()
        .map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Writes `body` next to `path` and renames it into place
///
/// A failed write never leaves a truncated file under the final name.
async fn store_file(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let partial = partial_path(path);
    let result = match tokio::fs::write(&partial, body).await {
        Ok(()) => tokio::fs::rename(&partial, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            tracing::debug!("Could not remove {}: {}", partial.display(), e);
        }
    }
    result
}

fn set_file_time(path: &Path, time: SystemTime) -> std::io::Result<()> {
    std::fs::File::options()
        .write(true)
        .open(path)?
        .set_modified(time)
}
