use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// The size token meaning "largest available, then try the alternate hosts"
pub const RAW_SIZE: &str = "raw";

/// Width used when the configured size is `raw` but a concrete width is needed
const RAW_FALLBACK_WIDTH: &str = "1280";

/// Known size suffixes the remote appends to image file names
fn known_size_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"_(?:raw|1280|540|500|400|250|100|75sq)(\.[A-Za-z0-9]+)(\?.*)?$")
            .expect("size suffix pattern is valid")
    })
}

/// Any numeric size suffix right before the extension
fn numeric_size_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"_(?:\d+sq|\d+)(\.[A-Za-z0-9]+)$").expect("numeric suffix pattern is valid")
    })
}

/// Maps a configured image size to the width token used in URLs
///
/// `raw` has no width of its own, so it resolves to the largest fixed width.
pub fn image_size_token(image_size: &str) -> &str {
    if image_size == RAW_SIZE {
        RAW_FALLBACK_WIDTH
    } else {
        image_size
    }
}

/// Rewrites the size suffix of an image URL to the configured size
///
/// URLs without a known size suffix are returned unchanged.
///
/// # Examples
///
/// ```
/// use blog_sweep::url::resize_image_url;
///
/// let url = resize_image_url("https://64.media.tumblr.com/a/tumblr_xyz_500.jpg", "250");
/// assert_eq!(url, "https://64.media.tumblr.com/a/tumblr_xyz_250.jpg");
/// ```
pub fn resize_image_url(url: &str, image_size: &str) -> String {
    let replacement = format!("_{}${{1}}${{2}}", image_size_token(image_size));
    known_size_suffix()
        .replace(url, replacement.as_str())
        .into_owned()
}

/// Builds the raw-size URL of an image on an alternate host
///
/// The numeric size suffix is replaced by `_raw` and the host is swapped for
/// `host`. Query and fragment are dropped.
///
/// # Arguments
///
/// * `url` - The image URL found by the crawler
/// * `host` - Hostname to serve the raw image from
///
/// # Returns
///
/// * `Ok(String)` - The rewritten URL
/// * `Err(ParseError)` - `url` is not an absolute URL
pub fn build_raw_image_url(url: &str, host: &str) -> Result<String, url::ParseError> {
    let parsed = Url::parse(url)?;
    let path = parsed.path().trim_start_matches('/');
    let path = numeric_size_suffix().replace(path, "_raw${1}");
    Ok(format!("https://{}/{}", host, path))
}
