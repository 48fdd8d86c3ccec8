//! Storage traits and error types
//!
//! This module defines the two seams the engine persists through:
//! - `ContentIndex`, the existence index consulted before every download
//! - `BlogStore`, where per-blog statistics and resume state live

use crate::state::BlogState;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Answers "do we already have this?" for canonical keys
///
/// Implementations must be safe to query from several tasks at once.
pub trait ContentIndex: Send + Sync {
    /// Returns true if a file with this canonical key is in the download directory
    fn exists_on_disk(&self, key: &str) -> bool;

    /// Returns true if the key was registered by an earlier download
    fn exists_in_db(&self, key: &str) -> bool;

    /// Records a completed download
    ///
    /// # Arguments
    ///
    /// * `key` - The canonical key of the stored item
    fn register(&self, key: &str) -> StorageResult<()>;
}

/// Durable home of `BlogState`
pub trait BlogStore: Send + Sync {
    /// Loads the state of the named blog, if one was ever saved
    fn load_blog_state(&self, name: &str) -> StorageResult<Option<BlogState>>;

    /// Inserts or replaces the state of `state.name`
    fn save_blog_state(&self, state: &BlogState) -> StorageResult<()>;
}
