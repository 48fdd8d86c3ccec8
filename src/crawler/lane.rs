//! A single scanning lane
//!
//! A lane walks its cursor page by page: fetch, extract, hand every item to the
//! shared queue and the statistics bag, then decide whether to continue.
//! Lanes never share pages and never abort each other; each one ends with a
//! `LaneReport` saying why it stopped.

use crate::config::{BlogConfig, PageSource, ScanConfig};
use crate::crawler::control::CrawlControl;
use crate::crawler::cursor::CrawlCursor;
use crate::crawler::extractor::PostExtractor;
use crate::crawler::queue::SharedQueue;
use crate::crawler::transport::Transport;
use crate::output::{CrawlWarning, ProgressEvent, ProgressReporter, StatisticsBag, WarningLatch};
use crate::TransportError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Why a lane stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaneOutcome {
    /// The lane ran past the last page
    Exhausted,
    /// The lane reached posts an earlier crawl already saw
    CaughtUp,
    Cancelled,
    /// The remote demanded a login
    Unauthorized,
    /// The remote throttled the lane and retries were used up
    RateLimited,
    /// Any other fetch or parse failure
    Failed(String),
}

impl LaneOutcome {
    /// True for the outcomes of a lane that ran to its natural end
    pub fn is_complete(&self) -> bool {
        matches!(self, LaneOutcome::Exhausted | LaneOutcome::CaughtUp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneReport {
    pub lane: u32,
    pub pages_crawled: u64,
    pub highest_post_id: u64,
    pub outcome: LaneOutcome,
}

impl LaneReport {
    pub fn new(lane: u32, outcome: LaneOutcome) -> Self {
        Self {
            lane,
            pages_crawled: 0,
            highest_post_id: 0,
            outcome,
        }
    }
}

/// Builds the URL of a page index for the configured source
#[derive(Debug, Clone)]
pub struct PageAddress {
    source: PageSource,
    api_base: String,
    blog_name: String,
    blog_url: String,
    page_size: u32,
}

impl PageAddress {
    pub fn from_config(blog: &BlogConfig) -> Self {
        let mut blog_url = blog.url.clone();
        if !blog_url.ends_with('/') {
            blog_url.push('/');
        }

        Self {
            source: blog.source,
            api_base: blog.api_base.trim_end_matches('/').to_string(),
            blog_name: blog.name.clone(),
            blog_url,
            page_size: blog.page_size,
        }
    }

    /// URL of the zero-based page `page`
    ///
    /// API pages are addressed by offset; HTML pages are numbered from 1.
    pub fn url_for(&self, page: u64) -> String {
        match self.source {
            PageSource::Api => format!(
                "{}/svc/indash_blog?tumblelog_name_or_id={}&post_id=&limit={}&offset={}&should_bypass_safemode=true",
                self.api_base,
                self.blog_name,
                self.page_size,
                u64::from(self.page_size) * page
            ),
            PageSource::Html => format!("{}page/{}", self.blog_url, page + 1),
        }
    }
}

/// Bounded exponential backoff for rate-limited pages
///
/// With `retries == 0` a rate-limited page stops the lane immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitBackoff {
    pub retries: u32,
    pub base: Duration,
    pub max: Duration,
}

impl RateLimitBackoff {
    pub fn from_config(scan: &ScanConfig) -> Self {
        Self {
            retries: scan.rate_limit_retries,
            base: Duration::from_millis(scan.rate_limit_backoff_ms),
            max: Duration::from_millis(scan.rate_limit_backoff_max_ms),
        }
    }

    pub fn disabled() -> Self {
        Self {
            retries: 0,
            base: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (zero-based): `min(base * 2^attempt, max)`
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

impl Default for RateLimitBackoff {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Everything a lane needs; cheap to clone, one clone per lane task
#[derive(Clone)]
pub struct LaneScanner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) extractor: Arc<PostExtractor>,
    pub(crate) address: Arc<PageAddress>,
    pub(crate) queue: Arc<SharedQueue>,
    pub(crate) statistics: Arc<StatisticsBag>,
    pub(crate) reporter: Arc<dyn ProgressReporter>,
    pub(crate) warnings: Arc<WarningLatch>,
    pub(crate) control: CrawlControl,
    pub(crate) pages_total: Arc<AtomicU64>,
    pub(crate) resume_id: u64,
    pub(crate) backoff: RateLimitBackoff,
}

impl LaneScanner {
    /// Scans pages starting at `cursor` until a stop condition is met
    ///
    /// # Stop Conditions
    ///
    /// | Condition | Outcome |
    /// |-----------|---------|
    /// | Cancellation (token, or a cancelled fetch) | Cancelled |
    /// | HTTP 401/403/503 or a login wall | Unauthorized, warned once |
    /// | HTTP 429 after all retries | RateLimited, warned once |
    /// | Empty page, no next page, or end of page list | Exhausted |
    /// | Page entirely below the resume id | CaughtUp |
    /// | Any other fetch or parse error | Failed, logged at debug |
    pub async fn scan(&self, lane: u32, mut cursor: CrawlCursor) -> LaneReport {
        let mut report = LaneReport::new(lane, LaneOutcome::Exhausted);
        tracing::debug!("Lane {} starting at page {}", lane, cursor.current());

        report.outcome = loop {
            if !self.control.checkpoint().await {
                break LaneOutcome::Cancelled;
            }

            let page = cursor.current();
            let url = self.address.url_for(page);

            let body = match self.fetch_page(&url).await {
                Ok(body) => body,
                Err(TransportError::Cancelled) => break LaneOutcome::Cancelled,
                Err(TransportError::Unauthorized { .. }) => {
                    self.warnings
                        .raise(CrawlWarning::NotLoggedIn, self.reporter.as_ref());
                    break LaneOutcome::Unauthorized;
                }
                Err(TransportError::RateLimited { .. }) => {
                    self.warnings
                        .raise(CrawlWarning::RateLimited, self.reporter.as_ref());
                    break LaneOutcome::RateLimited;
                }
                Err(e) => {
                    tracing::debug!("Lane {} stopping: {}", lane, e);
                    break LaneOutcome::Failed(e.to_string());
                }
            };

            let extract = match self.extractor.extract(&body, page) {
                Ok(extract) => extract,
                Err(e) => {
                    tracing::debug!("Lane {} could not extract {}: {}", lane, url, e);
                    break LaneOutcome::Failed(e.to_string());
                }
            };

            if extract.login_required {
                self.warnings
                    .raise(CrawlWarning::NotLoggedIn, self.reporter.as_ref());
                break LaneOutcome::Unauthorized;
            }

            if extract.end_of_results && extract.items.is_empty() {
                break LaneOutcome::Exhausted;
            }

            for item in extract.items {
                self.statistics.add_item(&item);
                self.queue.push(item);
            }

            report.pages_crawled += 1;
            report.highest_post_id = report.highest_post_id.max(extract.highest_post_id);
            let pages_total = self.pages_total.fetch_add(1, Ordering::Relaxed) + 1;
            self.reporter.report(ProgressEvent::PageCrawled {
                lane,
                page,
                pages_total,
            });

            if extract.end_of_results {
                break LaneOutcome::Exhausted;
            }

            if self.resume_id > 0
                && extract.highest_post_id > 0
                && extract.highest_post_id < self.resume_id
            {
                tracing::debug!("Lane {} caught up at page {}", lane, page);
                break LaneOutcome::CaughtUp;
            }

            if !cursor.advance() {
                break LaneOutcome::Exhausted;
            }
        };

        tracing::debug!(
            "Lane {} finished after {} pages: {:?}",
            lane,
            report.pages_crawled,
            report.outcome
        );
        report
    }

    /// Fetches one page, retrying rate-limited responses per the backoff
    async fn fetch_page(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let cancel = self.control.token();
        let mut attempt = 0;

        loop {
            match self.transport.fetch(url, cancel).await {
                Err(TransportError::RateLimited { .. }) if attempt < self.backoff.retries => {
                    let delay = self.backoff.delay(attempt);
                    tracing::info!(
                        "Rate limited on {}, retrying in {}ms ({}/{})",
                        url,
                        delay.as_millis(),
                        attempt + 1,
                        self.backoff.retries
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
