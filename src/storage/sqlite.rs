//! SQLite storage implementation
//!
//! This module provides the SQLite-backed link table and `BlogStore`.

use crate::state::BlogState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{BlogStore, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
///
/// The connection sits behind a mutex so one storage value can be shared by
/// the content index and the orchestrator.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records `key` as downloaded for `blog`; re-registering is a no-op
    pub fn register_link(&self, blog: &str, key: &str) -> StorageResult<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO links (blog, key, registered_at) VALUES (?1, ?2, ?3)",
            params![blog, key, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn has_link(&self, blog: &str, key: &str) -> StorageResult<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM links WHERE blog = ?1 AND key = ?2",
                params![blog, key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count_links(&self, blog: &str) -> StorageResult<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM links WHERE blog = ?1",
            params![blog],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl BlogStore for SqliteStorage {
    fn load_blog_state(&self, name: &str) -> StorageResult<Option<BlogState>> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT state_json FROM blog_state WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_blog_state(&self, state: &BlogState) -> StorageResult<()> {
        let json = serde_json::to_string(state)?;
        self.conn().execute(
            "INSERT INTO blog_state (name, state_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                state_json = excluded.state_json,
                updated_at = excluded.updated_at",
            params![state.name, json, Utc::now().to_rfc3339()],
        )?;
        tracing::debug!("Saved state for blog {}", state.name);
        Ok(())
    }
}
