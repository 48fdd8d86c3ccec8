use crate::state::PostType;

/// One extracted unit of content: a media URL or a formatted text record
///
/// Items are immutable once built. Two items describe the same content when
/// their `(post_type, payload)` pairs are equal; the post id is metadata only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    post_type: PostType,
    payload: String,
    post_id: String,
    timestamp: Option<String>,
}

impl ContentItem {
    /// Creates a new content item
    ///
    /// # Arguments
    ///
    /// * `post_type` - The kind of content
    /// * `payload` - Media URL for media types, the full record for text types
    /// * `post_id` - Identifier of the source post
    /// * `timestamp` - Origin date of the post (unix seconds or a date string)
    pub fn new(
        post_type: PostType,
        payload: impl Into<String>,
        post_id: impl Into<String>,
        timestamp: Option<String>,
    ) -> Self {
        Self {
            post_type,
            payload: payload.into(),
            post_id: post_id.into(),
            timestamp,
        }
    }

    pub fn post_type(&self) -> PostType {
        self.post_type
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    /// The identity used for duplicate accounting
    pub fn dedup_key(&self) -> (PostType, &str) {
        (self.post_type, &self.payload)
    }
}
