//! HTTP transport for pages and media
//!
//! This module owns every remote request the crawler makes:
//! - Building the HTTP client from the connection settings
//! - Fetching page and media bodies as raw bytes
//! - Classifying failed responses into the variants lanes react to
//! - Aborting in-flight requests when the crawl is cancelled

use crate::config::ConnectionConfig;
use crate::TransportError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{Client, Proxy, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fetches remote resources as raw bytes
///
/// Lanes and the download executor only depend on this trait, so tests can
/// substitute a scripted fake for the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url`, returning its body
    ///
    /// Must return `TransportError::Cancelled` promptly once `cancel` fires.
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>, TransportError>;
}

/// Builds an HTTP client with the configured timeouts, proxy and session cookie
///
/// # Arguments
///
/// * `config` - The connection settings
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - The proxy or a header was rejected
pub fn build_http_client(config: &ConnectionConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
    if let Some(cookie) = config.cookie.as_deref() {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(e) => tracing::warn!("Ignoring unusable cookie header: {}", e),
        }
    }

    let mut builder = Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .default_headers(headers)
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = config.proxy.as_deref() {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

/// Maps a non-success HTTP status to a transport error
///
/// | Status | Error |
/// |--------|-------|
/// | 401, 403, 503 | Unauthorized |
/// | 429 | RateLimited |
/// | anything else | Other |
pub fn classify_status(status: StatusCode, url: &str) -> TransportError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE => {
            TransportError::Unauthorized {
                url: url.to_string(),
            }
        }
        StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimited {
            url: url.to_string(),
        },
        other => TransportError::Other {
            url: url.to_string(),
            message: format!("HTTP {}", other.as_u16()),
        },
    }
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &ConnectionConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    /// Wraps an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_inner(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() {
                "Connection refused".to_string()
            } else {
                e.to_string()
            };
            TransportError::Other {
                url: url.to_string(),
                message,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, url));
        }

        let body = response.bytes().await.map_err(|e| TransportError::Other {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(body.to_vec())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Vec<u8>, TransportError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.fetch_inner(url) => {
                if let Err(e) = &result {
                    tracing::debug!("{}", e);
                }
                result
            }
        }
    }
}
