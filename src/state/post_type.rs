/// Post type definitions for classifying extracted content
///
/// This module defines every kind of content item the crawler can extract.
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    // ===== Binary Media =====
    /// An image file
    Photo,

    /// A video file
    Video,

    /// An audio file
    Audio,

    // ===== Text Records =====
    /// A text post
    Text,

    /// A quote post
    Quote,

    /// A link post
    Link,

    /// A chat/dialogue post
    Conversation,

    /// A question-and-answer post
    Answer,

    // ===== Metadata Records =====
    /// Structural metadata of a photo post
    PhotoMeta,

    /// Structural metadata of a video post
    VideoMeta,

    /// Structural metadata (ID3-style tags) of an audio post
    AudioMeta,
}

impl PostType {
    /// Returns true if items of this type are binary files fetched from a URL
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Photo | Self::Video | Self::Audio)
    }

    /// Returns true if items of this type are text records written locally
    pub fn is_text(&self) -> bool {
        !self.is_media()
    }

    /// Returns true if this is one of the metadata record types
    pub fn is_meta(&self) -> bool {
        matches!(self, Self::PhotoMeta | Self::VideoMeta | Self::AudioMeta)
    }

    /// Name of the file text records of this type are appended to
    ///
    /// Returns None for media types, which are stored one file per item.
    pub fn text_file_name(&self) -> Option<&'static str> {
        match self {
            Self::Photo | Self::Video | Self::Audio => None,
            Self::Text => Some("texts.txt"),
            Self::Quote => Some("quotes.txt"),
            Self::Link => Some("links.txt"),
            Self::Conversation => Some("conversations.txt"),
            Self::Answer => Some("answers.txt"),
            Self::PhotoMeta => Some("photo_meta.txt"),
            Self::VideoMeta => Some("video_meta.txt"),
            Self::AudioMeta => Some("audio_meta.txt"),
        }
    }

    /// Converts the post type to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
            Self::Quote => "quote",
            Self::Link => "link",
            Self::Conversation => "conversation",
            Self::Answer => "answer",
            Self::PhotoMeta => "photo_meta",
            Self::VideoMeta => "video_meta",
            Self::AudioMeta => "audio_meta",
        }
    }

    /// Parses a post type from a database string representation
    ///
    /// Returns None if the string doesn't match any known type.
    pub fn from_db_string(s: &str) -> Option<Self> {
        Self::all_types()
            .into_iter()
            .find(|post_type| post_type.to_db_string() == s)
    }

    /// Returns all post types
    pub fn all_types() -> [Self; 11] {
        [
            Self::Photo,
            Self::Video,
            Self::Audio,
            Self::Text,
            Self::Quote,
            Self::Link,
            Self::Conversation,
            Self::Answer,
            Self::PhotoMeta,
            Self::VideoMeta,
            Self::AudioMeta,
        ]
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
