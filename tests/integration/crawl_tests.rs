//! Integration tests for the crawler
//!
//! These tests run the full scan/download cycle, either against a wiremock
//! server through the real HTTP transport or against in-memory fakes.

use async_trait::async_trait;
use blog_sweep::config::{parse_config, Config};
use blog_sweep::crawler::{
    crawl, CrawlControl, CrawlOrchestrator, CrawlPhase, DownloadExecutor, DownloadSettings,
    LaneOutcome, PageAddress, ScanCoordinator, Transport,
};
use blog_sweep::output::{ProgressReporter, RecordingReporter};
use blog_sweep::storage::{open_storage, BlogStore, MemoryBlogStore, MemoryIndex};
use blog_sweep::{BlogState, PostType, TransportError};
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a validated configuration for an API crawl against `base`
fn create_test_config(base: &str, dir: &Path, lanes: u32, extra: &str) -> Config {
    let toml = format!(
        r#"
[blog]
name = "demo"
url = "{base}/"
api-base = "{base}"
page-size = 3
download-location = "{download}"

[scan]
parallel-scans = {lanes}
{extra}

[output]
database-path = "{db}"
"#,
        base = base,
        download = dir.join("downloads").display(),
        lanes = lanes,
        extra = extra,
        db = dir.join("sweep.db").display(),
    );
    parse_config(&toml).expect("test config is valid")
}

fn api_page(posts: serde_json::Value) -> serde_json::Value {
    json!({"meta": {"status": 200}, "response": {"posts": posts}})
}

fn photo_post(base: &str, id: u64, name: &str) -> serde_json::Value {
    let url = format!("{}/media/tumblr_{}_500.jpg", base, name);
    json!({
        "id": id.to_string(),
        "type": "photo",
        "timestamp": 1_600_000_000u64 + id,
        "photos": [{
            "caption": "",
            "original_size": {"width": 500, "url": url},
            "alt_sizes": [{"width": 500, "url": url}]
        }]
    })
}

async fn mount_page(server: &MockServer, offset: u64, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/svc/indash_blog"))
        .and(query_param("offset", offset.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_api_crawl_downloads_and_resumes() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    // Lane 0 reads offsets 0 and 6, lane 1 reads offsets 3 and 9
    mount_page(
        &server,
        0,
        api_page(json!([
            photo_post(&base, 40, "a"),
            {"id": "39", "type": "text", "timestamp": 1_600_000_039u64, "title": "Hello", "body": "<p>hi</p>"}
        ])),
    )
    .await;
    mount_page(
        &server,
        3,
        api_page(json!([
            photo_post(&base, 38, "b"),
            {"id": "37", "type": "quote", "text": "Be brief", "source": "someone"}
        ])),
    )
    .await;
    mount_page(&server, 6, api_page(json!([]))).await;
    mount_page(&server, 9, api_page(json!([]))).await;

    for name in ["a", "b"] {
        Mock::given(method("GET"))
            .and(path(format!("/media/tumblr_{}_500.jpg", name)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(name.as_bytes().to_vec()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let config = create_test_config(&base, dir.path(), 2, "");

    let report = crawl(&config, CrawlControl::new(), false).await.unwrap();
    assert_eq!(report.phase, CrawlPhase::Finalized);
    assert_eq!(report.scan.lanes.len(), 2);
    assert!(report
        .scan
        .lanes
        .iter()
        .all(|lane| lane.outcome == LaneOutcome::Exhausted));
    assert_eq!(report.scan.pages_crawled, 2);
    assert_eq!(report.scan.highest_post_id, 40);
    assert_eq!(report.download.items_processed, 4);
    assert_eq!(report.download.downloaded_total(), 4);
    assert_eq!(report.download.failed, 0);

    let downloads = dir.path().join("downloads");
    assert_eq!(
        std::fs::read(downloads.join("tumblr_a_500.jpg")).unwrap(),
        b"a"
    );
    assert!(downloads.join("tumblr_b_500.jpg").exists());
    let texts = std::fs::read_to_string(downloads.join("texts.txt")).unwrap();
    assert!(texts.contains("Title: Hello"));
    let quotes = std::fs::read_to_string(downloads.join("quotes.txt")).unwrap();
    assert!(quotes.contains("Quote: Be brief"));

    let storage = open_storage(&dir.path().join("sweep.db")).unwrap();
    let state = storage.load_blog_state("demo").unwrap().unwrap();
    assert_eq!(state.photos, 2);
    assert_eq!(state.texts, 1);
    assert_eq!(state.quotes, 1);
    assert_eq!(state.total_count, 4);
    assert_eq!(state.downloaded_photos, 2);
    assert_eq!(state.downloaded_total, 4);
    assert_eq!(state.last_id, 40);
    assert!(state.last_complete_crawl.is_some());
    assert!(state
        .last_downloaded_photo
        .as_deref()
        .is_some_and(|p| p.ends_with(".jpg")));
    drop(storage);

    // A second run finds everything in the link database
    let report = crawl(&config, CrawlControl::new(), false).await.unwrap();
    assert_eq!(report.phase, CrawlPhase::Finalized);
    assert_eq!(report.download.downloaded_total(), 0);
    assert_eq!(report.download.satisfied, 4);
    let caught_up = report
        .scan
        .lanes
        .iter()
        .find(|lane| lane.lane == 1)
        .unwrap();
    assert_eq!(caught_up.outcome, LaneOutcome::CaughtUp);

    let storage = open_storage(&dir.path().join("sweep.db")).unwrap();
    let state = storage.load_blog_state("demo").unwrap().unwrap();
    assert_eq!(state.downloaded_total, 4);
    assert_eq!(state.total_count, 4);
}

#[tokio::test]
async fn test_api_crawl_retries_after_rate_limit() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/svc/indash_blog"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        0,
        api_page(json!([
            {"id": "5", "type": "quote", "text": "Again", "source": ""}
        ])),
    )
    .await;
    mount_page(&server, 3, api_page(json!([]))).await;

    let config = create_test_config(
        &base,
        dir.path(),
        1,
        "rate-limit-retries = 2\nrate-limit-backoff-ms = 10\nrate-limit-backoff-max-ms = 50",
    );

    let report = crawl(&config, CrawlControl::new(), false).await.unwrap();
    assert_eq!(report.scan.lanes[0].outcome, LaneOutcome::Exhausted);
    assert_eq!(report.scan.pages_crawled, 1);
    assert_eq!(report.download.downloaded(PostType::Quote), 1);
}

#[tokio::test]
async fn test_api_crawl_unauthorized_stops_lanes() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/svc/indash_blog"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let config = create_test_config(&base, dir.path(), 3, "");

    let report = crawl(&config, CrawlControl::new(), false).await.unwrap();
    assert_eq!(report.scan.lanes.len(), 3);
    assert!(report
        .scan
        .lanes
        .iter()
        .all(|lane| lane.outcome == LaneOutcome::Unauthorized && lane.pages_crawled == 0));
    assert_eq!(report.download.items_processed, 0);
}

/// Serves API pages from a table; unknown pages are empty, anything else is media
struct FakeBlog {
    address: PageAddress,
    pages: Vec<serde_json::Value>,
    /// Pages answered with "not logged in"
    locked: Vec<u64>,
    media_fetches: Mutex<Vec<String>>,
}

impl FakeBlog {
    fn new(config: &Config, pages: Vec<serde_json::Value>) -> Self {
        Self {
            address: PageAddress::from_config(&config.blog),
            pages,
            locked: Vec::new(),
            media_fetches: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Transport for FakeBlog {
    async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        if let Some(page) = self
            .locked
            .iter()
            .find(|page| self.address.url_for(**page) == url)
        {
            return Err(TransportError::Unauthorized {
                url: self.address.url_for(*page),
            });
        }
        if url.contains("/svc/indash_blog") {
            let body = (0..self.pages.len() as u64)
                .find(|page| self.address.url_for(*page) == url)
                .map(|page| self.pages[page as usize].clone())
                .unwrap_or_else(|| api_page(json!([])));
            return Ok(body.to_string().into_bytes());
        }
        self.media_fetches.lock().unwrap().push(url.to_string());
        Ok(b"media".to_vec())
    }
}

/// Never answers until the crawl is cancelled
struct StalledTransport;

#[async_trait]
impl Transport for StalledTransport {
    async fn fetch(
        &self,
        _url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TransportError> {
        cancel.cancelled().await;
        Err(TransportError::Cancelled)
    }
}

fn build_orchestrator(
    config: &Config,
    transport: Arc<dyn Transport>,
    index: Arc<MemoryIndex>,
    store: Arc<MemoryBlogStore>,
    reporter: Arc<RecordingReporter>,
    control: CrawlControl,
) -> CrawlOrchestrator {
    let reporter: Arc<dyn ProgressReporter> = reporter;
    let coordinator = ScanCoordinator::from_config(
        config,
        0,
        transport.clone(),
        reporter.clone(),
        control.clone(),
    )
    .unwrap();
    let executor = DownloadExecutor::new(
        DownloadSettings::from_config(config),
        transport,
        index,
        reporter,
        control.clone(),
    );
    CrawlOrchestrator::new(coordinator, executor, store, control)
}

#[tokio::test]
async fn test_two_lanes_feed_one_executor() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("https://blog.example", dir.path(), 2, "");
    let base = "https://64.media.tumblr.com/x";
    let pages = vec![
        api_page(json!([photo_post(base, 104, "p0")])),
        api_page(json!([photo_post(base, 103, "p1")])),
        api_page(json!([photo_post(base, 102, "p2")])),
        api_page(json!([photo_post(base, 101, "p3")])),
    ];

    let transport = Arc::new(FakeBlog::new(&config, pages));
    let index = Arc::new(MemoryIndex::new());
    let store = Arc::new(MemoryBlogStore::new());
    let reporter = Arc::new(RecordingReporter::new());
    let orchestrator = build_orchestrator(
        &config,
        transport.clone(),
        index.clone(),
        store.clone(),
        reporter.clone(),
        CrawlControl::new(),
    );
    let mut phases = orchestrator.subscribe();
    assert_eq!(orchestrator.phase(), CrawlPhase::Idle);

    let mut state = BlogState::new("demo");
    let report = orchestrator.run(&mut state).await.unwrap();

    assert_eq!(report.phase, CrawlPhase::Finalized);
    assert_eq!(orchestrator.phase(), CrawlPhase::Finalized);
    assert!(phases.has_changed().unwrap());
    assert_eq!(*phases.borrow_and_update(), CrawlPhase::Finalized);

    let lanes: Vec<_> = report
        .scan
        .lanes
        .iter()
        .map(|lane| (lane.lane, lane.pages_crawled, lane.outcome.clone()))
        .collect();
    assert_eq!(
        lanes,
        vec![
            (0, 2, LaneOutcome::Exhausted),
            (1, 2, LaneOutcome::Exhausted)
        ]
    );

    // Every extracted item reaches the executor exactly once
    assert_eq!(report.download.items_processed, 4);
    assert_eq!(report.download.downloaded(PostType::Photo), 4);
    assert_eq!(transport.media_fetches.lock().unwrap().len(), 4);
    assert_eq!(index.registered().len(), 4);

    assert_eq!(state.photos, 4);
    assert_eq!(state.total_count, 4);
    assert_eq!(state.last_id, 104);
    assert!(state.last_complete_crawl.is_some());

    let saved = store.load_blog_state("demo").unwrap().unwrap();
    assert_eq!(saved.downloaded_photos, 4);

    let attempts = reporter
        .events()
        .into_iter()
        .filter(|event| {
            matches!(event, blog_sweep::output::ProgressEvent::DownloadAttempt { .. })
        })
        .count();
    assert_eq!(attempts, 4);
}

#[tokio::test]
async fn test_duplicates_are_counted_but_downloaded_once() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("https://blog.example", dir.path(), 2, "");
    let base = "https://64.media.tumblr.com/x";
    let pages = vec![
        api_page(json!([photo_post(base, 11, "same")])),
        api_page(json!([photo_post(base, 10, "same")])),
    ];

    let transport = Arc::new(FakeBlog::new(&config, pages));
    let index = Arc::new(MemoryIndex::new());
    let orchestrator = build_orchestrator(
        &config,
        transport.clone(),
        index.clone(),
        Arc::new(MemoryBlogStore::new()),
        Arc::new(RecordingReporter::new()),
        CrawlControl::new(),
    );

    let mut state = BlogState::new("demo");
    let report = orchestrator.run(&mut state).await.unwrap();

    assert_eq!(report.download.downloaded(PostType::Photo), 1);
    assert_eq!(report.download.satisfied, 1);
    assert_eq!(state.photos, 2);
    assert_eq!(state.duplicate_photos, 1);
    assert_eq!(state.total_count, 1);
}

#[tokio::test]
async fn test_incomplete_lane_keeps_resume_id() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("https://blog.example", dir.path(), 2, "");
    let base = "https://64.media.tumblr.com/x";
    let mut blog = FakeBlog::new(&config, vec![api_page(json!([photo_post(base, 50, "p0")]))]);
    blog.locked = vec![1];

    let orchestrator = build_orchestrator(
        &config,
        Arc::new(blog),
        Arc::new(MemoryIndex::new()),
        Arc::new(MemoryBlogStore::new()),
        Arc::new(RecordingReporter::new()),
        CrawlControl::new(),
    );

    let mut state = BlogState::new("demo");
    state.last_id = 10;
    let report = orchestrator.run(&mut state).await.unwrap();

    assert_eq!(report.phase, CrawlPhase::Finalized);
    assert!(!report.scan.all_lanes_complete());
    assert_eq!(report.scan.highest_post_id, 50);
    assert_eq!(state.last_id, 10);
    assert_eq!(state.photos, 1);
    assert_eq!(state.downloaded_photos, 1);
}

#[tokio::test]
async fn test_cancelled_crawl_keeps_resume_state() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config("https://blog.example", dir.path(), 3, "");

    let store = Arc::new(MemoryBlogStore::new());
    let control = CrawlControl::new();
    let orchestrator = build_orchestrator(
        &config,
        Arc::new(StalledTransport),
        Arc::new(MemoryIndex::new()),
        store.clone(),
        Arc::new(RecordingReporter::new()),
        control.clone(),
    );

    let canceller = {
        let control = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            control.cancel();
        })
    };

    let mut state = BlogState::new("demo");
    state.last_id = 77;
    let report = tokio::time::timeout(Duration::from_secs(5), orchestrator.run(&mut state))
        .await
        .expect("cancelled crawl finishes promptly")
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(report.phase, CrawlPhase::Cancelled);
    assert!(report.reconciled.is_none());
    assert!(report.scan.cancelled());
    assert!(report
        .scan
        .lanes
        .iter()
        .all(|lane| lane.outcome == LaneOutcome::Cancelled));

    assert_eq!(state.last_id, 77);
    assert!(state.last_complete_crawl.is_none());
    let saved = store.load_blog_state("demo").unwrap().unwrap();
    assert!(saved.last_complete_crawl.is_none());
    assert_eq!(saved.last_id, 77);
}
