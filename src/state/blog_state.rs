use crate::state::PostType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accumulated per-blog statistics and resume information
///
/// The caller owns this value; a crawl run writes the aggregate fields exactly
/// once, after scanning and downloading have both finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogState {
    /// Blog name (primary key in the blog store)
    pub name: String,

    /// Number of distinct items found by the last complete scan
    pub total_count: u64,

    pub photos: u64,
    pub videos: u64,
    pub audios: u64,
    pub texts: u64,
    pub quotes: u64,
    pub links: u64,
    pub conversations: u64,
    pub answers: u64,
    pub photo_metas: u64,
    pub video_metas: u64,
    pub audio_metas: u64,

    pub duplicate_photos: u64,
    pub duplicate_videos: u64,
    pub duplicate_audios: u64,

    /// Items actually fetched or written, per type
    pub downloaded_photos: u64,
    pub downloaded_videos: u64,
    pub downloaded_audios: u64,
    pub downloaded_texts: u64,
    pub downloaded_quotes: u64,
    pub downloaded_links: u64,
    pub downloaded_conversations: u64,
    pub downloaded_answers: u64,
    pub downloaded_photo_metas: u64,
    pub downloaded_video_metas: u64,
    pub downloaded_audio_metas: u64,
    pub downloaded_total: u64,

    /// Highest post id seen by a complete crawl (resume high-water mark)
    pub last_id: u64,

    /// When the last uncancelled crawl finished
    pub last_complete_crawl: Option<DateTime<Utc>>,

    /// Path of the most recently downloaded photo (preview tracking)
    pub last_downloaded_photo: Option<String>,

    /// Path of the most recently downloaded video or animated image
    pub last_downloaded_video: Option<String>,
}

impl BlogState {
    /// Creates an empty state for the named blog
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the scanned item count for a post type
    pub fn count(&self, post_type: PostType) -> u64 {
        match post_type {
            PostType::Photo => self.photos,
            PostType::Video => self.videos,
            PostType::Audio => self.audios,
            PostType::Text => self.texts,
            PostType::Quote => self.quotes,
            PostType::Link => self.links,
            PostType::Conversation => self.conversations,
            PostType::Answer => self.answers,
            PostType::PhotoMeta => self.photo_metas,
            PostType::VideoMeta => self.video_metas,
            PostType::AudioMeta => self.audio_metas,
        }
    }

    /// Sets the scanned item count for a post type
    pub fn set_count(&mut self, post_type: PostType, value: u64) {
        let slot = match post_type {
            PostType::Photo => &mut self.photos,
            PostType::Video => &mut self.videos,
            PostType::Audio => &mut self.audios,
            PostType::Text => &mut self.texts,
            PostType::Quote => &mut self.quotes,
            PostType::Link => &mut self.links,
            PostType::Conversation => &mut self.conversations,
            PostType::Answer => &mut self.answers,
            PostType::PhotoMeta => &mut self.photo_metas,
            PostType::VideoMeta => &mut self.video_metas,
            PostType::AudioMeta => &mut self.audio_metas,
        };
        *slot = value;
    }

    /// Returns the downloaded item count for a post type
    pub fn downloaded(&self, post_type: PostType) -> u64 {
        match post_type {
            PostType::Photo => self.downloaded_photos,
            PostType::Video => self.downloaded_videos,
            PostType::Audio => self.downloaded_audios,
            PostType::Text => self.downloaded_texts,
            PostType::Quote => self.downloaded_quotes,
            PostType::Link => self.downloaded_links,
            PostType::Conversation => self.downloaded_conversations,
            PostType::Answer => self.downloaded_answers,
            PostType::PhotoMeta => self.downloaded_photo_metas,
            PostType::VideoMeta => self.downloaded_video_metas,
            PostType::AudioMeta => self.downloaded_audio_metas,
        }
    }

    /// Adds `amount` to the downloaded counter of a post type and to the total
    pub fn add_downloaded(&mut self, post_type: PostType, amount: u64) {
        let slot = match post_type {
            PostType::Photo => &mut self.downloaded_photos,
            PostType::Video => &mut self.downloaded_videos,
            PostType::Audio => &mut self.downloaded_audios,
            PostType::Text => &mut self.downloaded_texts,
            PostType::Quote => &mut self.downloaded_quotes,
            PostType::Link => &mut self.downloaded_links,
            PostType::Conversation => &mut self.downloaded_conversations,
            PostType::Answer => &mut self.downloaded_answers,
            PostType::PhotoMeta => &mut self.downloaded_photo_metas,
            PostType::VideoMeta => &mut self.downloaded_video_metas,
            PostType::AudioMeta => &mut self.downloaded_audio_metas,
        };
        *slot += amount;
        self.downloaded_total += amount;
    }

    /// Sum of the duplicate counters
    pub fn total_duplicates(&self) -> u64 {
        self.duplicate_photos + self.duplicate_videos + self.duplicate_audios
    }
}
