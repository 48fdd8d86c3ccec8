//! In-memory storage, used by dry runs and tests

use crate::state::BlogState;
use crate::storage::traits::{BlogStore, ContentIndex, StorageResult};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// `ContentIndex` holding everything in memory
#[derive(Debug, Default)]
pub struct MemoryIndex {
    on_disk: Mutex<HashSet<String>>,
    registered: Mutex<HashSet<String>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretends the given keys are already present in the download directory
    pub fn with_disk_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            on_disk: Mutex::new(keys.into_iter().map(Into::into).collect()),
            registered: Mutex::default(),
        }
    }

    /// Keys registered so far, sorted
    pub fn registered(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl ContentIndex for MemoryIndex {
    fn exists_on_disk(&self, key: &str) -> bool {
        self.on_disk
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    fn exists_in_db(&self, key: &str) -> bool {
        self.registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    fn register(&self, key: &str) -> StorageResult<()> {
        self.registered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string());
        Ok(())
    }
}

/// `BlogStore` holding states in memory
#[derive(Debug, Default)]
pub struct MemoryBlogStore {
    states: Mutex<HashMap<String, BlogState>>,
}

impl MemoryBlogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlogStore for MemoryBlogStore {
    fn load_blog_state(&self, name: &str) -> StorageResult<Option<BlogState>> {
        Ok(self
            .states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned())
    }

    fn save_blog_state(&self, state: &BlogState) -> StorageResult<()> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(state.name.clone(), state.clone());
        Ok(())
    }
}
