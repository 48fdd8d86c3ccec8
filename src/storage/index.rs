//! Existence index over the download directory and the link table

use crate::storage::sqlite::SqliteStorage;
use crate::storage::traits::{ContentIndex, StorageResult};
use crate::url::{canonical_key, PARTIAL_SUFFIX};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// `ContentIndex` backed by a directory listing and SQLite
///
/// The directory is listed once at construction; keys registered afterwards
/// are added to the cached listing as well as the database.
pub struct LinkIndex {
    blog: String,
    storage: Arc<SqliteStorage>,
    on_disk: Mutex<HashSet<String>>,
}

impl LinkIndex {
    /// Builds the index for `blog`, listing `download_dir`
    ///
    /// A missing directory is treated as empty.
    pub fn new(
        blog: impl Into<String>,
        download_dir: &Path,
        storage: Arc<SqliteStorage>,
    ) -> StorageResult<Self> {
        let mut on_disk = HashSet::new();
        if download_dir.is_dir() {
            for entry in std::fs::read_dir(download_dir)? {
                let entry = entry?;
                match entry.file_name().to_str() {
                    Some(name) if !name.ends_with(PARTIAL_SUFFIX) => {
                        on_disk.insert(canonical_key(name));
                    }
                    _ => {}
                }
            }
        }

        let blog = blog.into();
        tracing::debug!(
            "Indexed {} files for {} in {}",
            on_disk.len(),
            blog,
            download_dir.display()
        );

        Ok(Self {
            blog,
            storage,
            on_disk: Mutex::new(on_disk),
        })
    }
}

impl ContentIndex for LinkIndex {
    fn exists_on_disk(&self, key: &str) -> bool {
        self.on_disk
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    fn exists_in_db(&self, key: &str) -> bool {
        match self.storage.has_link(&self.blog, key) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Link lookup for {} failed: {}", key, e);
                false
            }
        }
    }

    fn register(&self, key: &str) -> StorageResult<()> {
        self.storage.register_link(&self.blog, key)?;
        self.on_disk
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string());
        Ok(())
    }
}
