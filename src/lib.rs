//! Blog-Sweep: a parallel blog crawler and media downloader
//!
//! This crate scans a blog's paginated feed over several lanes at once, extracts
//! typed posts from every page, and feeds them to a single download executor that
//! skips anything already present on disk or in the link database.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Blog-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),
}

/// Classified failures of a single remote fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The remote requires a login (HTTP 401/403/503 or a login wall)
    #[error("Not logged in while fetching {url}")]
    Unauthorized { url: String },

    /// The remote is throttling us (HTTP 429)
    #[error("Rate limit exceeded while fetching {url}")]
    RateLimited { url: String },

    /// The fetch was aborted by the cancellation token
    #[error("Fetch cancelled")]
    Cancelled,

    #[error("Fetch of {url} failed: {message}")]
    Other { url: String, message: String },
}

/// Errors raised while turning a page payload into content items
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Malformed JSON page: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Page has no response section")]
    MissingResponse,
}

/// Result type alias for Blog-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use state::{BlogState, ContentItem, PostType};
pub use url::{build_raw_image_url, canonical_key, resize_image_url};
