use crate::state::PostType;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

/// Suffix of a download still being written; directory scans skip these
pub const PARTIAL_SUFFIX: &str = ".part";

/// Size tokens the remote appends to media file names (`_480` is the small video variant)
fn size_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"_(?:raw|1280|540|500|480|400|250|100|75sq)(\.[A-Za-z0-9]+)$")
            .expect("size suffix pattern is valid")
    })
}

/// Returns the file name a URL would be stored under
///
/// Query string and fragment are stripped; the last path segment is returned.
///
/// # Examples
///
/// ```
/// use blog_sweep::url::file_name;
///
/// assert_eq!(file_name("https://h.example/a/b/tumblr_x_500.jpg?v=1"), "tumblr_x_500.jpg");
/// ```
pub fn file_name(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..end];
    path.rsplit('/').next().unwrap_or(path)
}

/// Normalizes a media URL to the key used for existence checks
///
/// # Normalization Steps
///
/// 1. Drop query string and fragment
/// 2. Keep only the last path segment (the file name)
/// 3. Remove a known size suffix (`_500`, `_75sq`, `_raw`, `_480`, ...) before the extension
///
/// Every size variant and every host of the same media file therefore maps to
/// the same key. Other numeric endings such as `track_2.mp3` are kept.
///
/// # Examples
///
/// ```
/// use blog_sweep::url::canonical_key;
///
/// assert_eq!(
///     canonical_key("https://64.media.tumblr.com/x/tumblr_abc_1280.jpg?v=3"),
///     "tumblr_abc.jpg"
/// );
/// ```
pub fn canonical_key(url: &str) -> String {
    size_suffix().replace(file_name(url), "${1}").into_owned()
}

/// Key for a text record, derived from its type and the SHA-256 of its payload
///
/// Post ids may be missing, so they never take part in the key.
pub fn text_key(post_type: PostType, payload: &str) -> String {
    let digest = Sha256::digest(payload.as_bytes());
    format!("{}_{}", post_type.to_db_string(), hex::encode(digest))
}
