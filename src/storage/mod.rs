//! Storage module for persisting crawl data
//!
//! This module handles all durable state of the sweeper, including:
//! - SQLite database initialization and schema management
//! - The link table consulted before every download
//! - Per-blog statistics and resume state

mod index;
mod memory;
mod schema;
mod sqlite;
mod traits;

pub use index::LinkIndex;
pub use memory::{MemoryBlogStore, MemoryIndex};
pub use sqlite::SqliteStorage;
pub use traits::{BlogStore, ContentIndex, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    SqliteStorage::new(path)
}
