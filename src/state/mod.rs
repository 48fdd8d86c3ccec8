//! State module for content items and per-blog crawl state
//!
//! # Components
//!
//! - `PostType`: The closed set of content kinds the extractor produces
//! - `ContentItem`: One extracted media URL or text record
//! - `BlogState`: Per-blog counters, duplicate counts, and resume information

mod blog_state;
mod content_item;
mod post_type;

// Re-export main types
pub use blog_state::BlogState;
pub use content_item::ContentItem;
pub use post_type::PostType;
