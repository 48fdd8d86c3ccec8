//! URL handling module for Blog-Sweep
//!
//! This module provides the media URL rewrites the downloader relies on:
//! size-suffix resizing, raw-host rewriting, and the canonical keys used to
//! ask the content index whether a file already exists.

mod normalize;
mod rewrite;

// Re-export main functions
pub use normalize::{canonical_key, file_name, text_key, PARTIAL_SUFFIX};
pub use rewrite::{build_raw_image_url, image_size_token, resize_image_url, RAW_SIZE};
