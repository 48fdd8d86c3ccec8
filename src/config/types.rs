use crate::state::PostType;
use serde::Deserialize;

/// Main configuration structure for Blog-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub blog: BlogConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Parses the comma-separated tag filter into trimmed, non-empty tags
    ///
    /// An empty list means "no tag filtering".
    pub fn tag_filter(&self) -> Vec<String> {
        self.scan
            .tags
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Settings that have no effect with the configured page source
    ///
    /// Rendered HTML pages carry no tags or reblog data, so both filters only
    /// apply to the JSON API.
    pub fn ignored_settings(&self) -> Vec<&'static str> {
        let mut ignored = Vec::new();
        if self.blog.source == PageSource::Html {
            if !self.tag_filter().is_empty() {
                ignored.push("tags");
            }
            if !self.scan.download_reblogged {
                ignored.push("download-reblogged");
            }
        }
        ignored
    }
}

/// Where pages come from and how they are addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSource {
    /// JSON endpoint paginated by limit/offset
    Api,
    /// Rendered blog pages paginated by page number
    Html,
}

/// The blog being crawled
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlogConfig {
    /// Blog name as known to the API
    pub name: String,

    /// Public blog URL (used by the HTML source)
    pub url: String,

    /// Base URL of the JSON API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_source")]
    pub source: PageSource,

    /// Posts requested per API page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Directory downloaded files are written to
    pub download_location: String,
}

/// Pagination and filtering behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScanConfig {
    /// Number of lanes scanned concurrently (also the lane stride)
    pub parallel_scans: u32,

    /// Comma-separated tag filter; empty disables filtering
    pub tags: String,

    /// Whether reblogged posts are kept
    pub download_reblogged: bool,

    /// Ignore the resume high-water mark and rescan everything
    pub force_rescan: bool,

    /// Explicit page list such as "1,3,5-7"
    pub download_pages: Option<String>,

    /// Refetch attempts after HTTP 429 before a lane gives up (0 = give up immediately)
    pub rate_limit_retries: u32,

    /// First backoff delay after a rate limit (milliseconds)
    pub rate_limit_backoff_ms: u64,

    /// Upper bound for the backoff delay (milliseconds)
    pub rate_limit_backoff_max_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            parallel_scans: 4,
            tags: String::new(),
            download_reblogged: true,
            force_rescan: false,
            download_pages: None,
            rate_limit_retries: 0,
            rate_limit_backoff_ms: 1_000,
            rate_limit_backoff_max_ms: 30_000,
        }
    }
}

/// Per-type download toggles and download behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DownloadConfig {
    pub photo: bool,
    pub video: bool,
    pub audio: bool,
    pub text: bool,
    pub quote: bool,
    pub link: bool,
    pub conversation: bool,
    pub answer: bool,
    pub photo_meta: bool,
    pub video_meta: bool,
    pub audio_meta: bool,

    /// Skip animated GIF images
    pub skip_gif: bool,

    /// Rewrite image URLs to the configured size before downloading
    pub force_size: bool,

    /// Also consult the download directory, not only the link database
    pub check_directory: bool,

    /// Track the most recent photo/video path on the blog state
    pub enable_preview: bool,
}

impl DownloadConfig {
    /// Returns whether items of the given type should be emitted
    pub fn enabled(&self, post_type: PostType) -> bool {
        match post_type {
            PostType::Photo => self.photo,
            PostType::Video => self.video,
            PostType::Audio => self.audio,
            PostType::Text => self.text,
            PostType::Quote => self.quote,
            PostType::Link => self.link,
            PostType::Conversation => self.conversation,
            PostType::Answer => self.answer,
            PostType::PhotoMeta => self.photo_meta,
            PostType::VideoMeta => self.video_meta,
            PostType::AudioMeta => self.audio_meta,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            photo: true,
            video: true,
            audio: true,
            text: true,
            quote: true,
            link: true,
            conversation: true,
            answer: true,
            photo_meta: false,
            video_meta: false,
            audio_meta: false,
            skip_gif: false,
            force_size: false,
            check_directory: true,
            enable_preview: true,
        }
    }
}

/// Media size preferences
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MediaConfig {
    /// Target image width ("1280", "500", ...) or "raw"
    pub image_size: String,

    /// Target video resolution: 1080 or 480
    pub video_size: u32,

    /// Hosts tried in order for raw-size images
    pub alternate_hosts: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image_size: "1280".to_string(),
            video_size: 1080,
            alternate_hosts: vec!["data.tumblr.com".to_string()],
        }
    }
}

/// HTTP connection parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConnectionConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,

    /// Proxy URL applied to all requests
    pub proxy: Option<String>,

    /// Raw Cookie header sent with every request
    pub cookie: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
                .to_string(),
            proxy: None,
            cookie: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database holding links and blog state
    pub database_path: String,
}

fn default_api_base() -> String {
    "https://www.tumblr.com".to_string()
}

fn default_source() -> PageSource {
    PageSource::Api
}

fn default_page_size() -> u32 {
    50
}
