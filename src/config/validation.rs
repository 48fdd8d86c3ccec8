use crate::config::types::{
    BlogConfig, Config, ConnectionConfig, MediaConfig, OutputConfig, ScanConfig,
};
use crate::crawler::parse_page_range;
use crate::url::RAW_SIZE;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_blog_config(&config.blog)?;
    validate_scan_config(&config.scan)?;
    validate_media_config(&config.media)?;
    validate_connection_config(&config.connection)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the blog section
fn validate_blog_config(config: &BlogConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation("blog name cannot be empty".to_string()));
    }

    validate_http_url(&config.url, "url")?;
    validate_http_url(&config.api_base, "api-base")?;

    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page-size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    if config.download_location.is_empty() {
        return Err(ConfigError::Validation(
            "download-location cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates pagination and retry settings
fn validate_scan_config(config: &ScanConfig) -> Result<(), ConfigError> {
    if config.parallel_scans < 1 || config.parallel_scans > 64 {
        return Err(ConfigError::Validation(format!(
            "parallel-scans must be between 1 and 64, got {}",
            config.parallel_scans
        )));
    }

    if let Some(pages) = &config.download_pages {
        parse_page_range(pages)?;
    }

    if config.rate_limit_backoff_max_ms < config.rate_limit_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "rate-limit-backoff-max-ms ({}) must be >= rate-limit-backoff-ms ({})",
            config.rate_limit_backoff_max_ms, config.rate_limit_backoff_ms
        )));
    }

    Ok(())
}

/// Validates media size preferences
fn validate_media_config(config: &MediaConfig) -> Result<(), ConfigError> {
    if config.image_size != RAW_SIZE && config.image_size.parse::<u32>().is_err() {
        return Err(ConfigError::Validation(format!(
            "image-size must be a width or \"raw\", got '{}'",
            config.image_size
        )));
    }

    if config.video_size != 480 && config.video_size != 1080 {
        return Err(ConfigError::Validation(format!(
            "video-size must be 480 or 1080, got {}",
            config.video_size
        )));
    }

    for host in &config.alternate_hosts {
        validate_host(host)?;
    }

    Ok(())
}

/// Validates connection parameters
fn validate_connection_config(config: &ConnectionConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that a URL parses and uses HTTP(S)
fn validate_http_url(value: &str, field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use HTTP or HTTPS",
            field, value
        )));
    }

    Ok(())
}

/// Validates a bare hostname
fn validate_host(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::Validation(
            "alternate host cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':')
    {
        return Err(ConfigError::Validation(format!(
            "alternate host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.contains("..") {
        return Err(ConfigError::Validation(format!(
            "alternate host '{}' is malformed",
            host
        )));
    }

    Ok(())
}
