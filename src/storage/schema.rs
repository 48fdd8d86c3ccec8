//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Blog-Sweep database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Every item downloaded or written, by canonical key
CREATE TABLE IF NOT EXISTS links (
    blog TEXT NOT NULL,
    key TEXT NOT NULL,
    registered_at TEXT NOT NULL,
    PRIMARY KEY (blog, key)
);

-- Per-blog statistics and resume state, serialized as JSON
CREATE TABLE IF NOT EXISTS blog_state (
    name TEXT PRIMARY KEY,
    state_json TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
