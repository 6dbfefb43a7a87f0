//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the driftnet database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Persistent frontier, partitioned by session
CREATE TABLE IF NOT EXISTS url_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    meta_data TEXT,
    parent_url TEXT,
    depth INTEGER NOT NULL DEFAULT 0,
    last_modified TEXT,
    create_time TEXT NOT NULL,
    UNIQUE(session_id, url)
);

CREATE INDEX IF NOT EXISTS idx_url_queue_session ON url_queue(session_id, id);

-- One access result per URL per session
CREATE TABLE IF NOT EXISTS access_result (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    url TEXT NOT NULL,
    parent_url TEXT,
    method TEXT NOT NULL,
    depth INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    http_status_code INTEGER NOT NULL,
    mime_type TEXT,
    content_length INTEGER NOT NULL DEFAULT 0,
    last_modified TEXT,
    execution_time INTEGER NOT NULL DEFAULT 0,
    transformer TEXT NOT NULL,
    encoding TEXT,
    data BLOB,
    create_time TEXT NOT NULL,
    UNIQUE(session_id, url)
);

CREATE INDEX IF NOT EXISTS idx_access_result_session ON access_result(session_id, id);

-- Scope filter patterns
CREATE TABLE IF NOT EXISTS url_filter (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    filter_type TEXT NOT NULL,
    url_pattern TEXT NOT NULL,
    create_time TEXT NOT NULL,
    UNIQUE(session_id, filter_type, url_pattern)
);

CREATE INDEX IF NOT EXISTS idx_url_filter_session ON url_filter(session_id);
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
