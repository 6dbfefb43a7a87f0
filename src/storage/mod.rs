//! Storage module for persisting crawl data
//!
//! This module handles all persistence for the crawler:
//! - The persistent half of each session's frontier (queued entries)
//! - Access results, one per URL per session
//! - Scope filter patterns bound to a session
//!
//! Two backends are provided: a SQLite backend for real crawls and an
//! in-memory backend for tests and throwaway sessions.

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStorage;
pub use schema::initialize_schema;
pub use sqlite::SqliteStorage;
pub use traits::{FilterStore, QueueStore, ResultStore, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;

/// Opens (or creates) a SQLite storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(CrawlError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> crate::Result<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Request method carried by a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Head,
}

impl Method {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// A unit of pending work in a session's frontier
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    /// Persistence id, set only while the entry lives in a queue store
    pub id: Option<i64>,
    pub session_id: String,
    pub url: String,
    pub method: Method,
    pub parent_url: Option<String>,
    pub depth: u32,
    pub meta_data: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub create_time: DateTime<Utc>,
}

impl QueueEntry {
    /// Creates a depth-0 GET entry with no parent
    pub fn seed(session_id: &str, url: &str) -> Self {
        Self {
            id: None,
            session_id: session_id.to_string(),
            url: url.to_string(),
            method: Method::Get,
            parent_url: None,
            depth: 0,
            meta_data: None,
            last_modified: None,
            create_time: Utc::now(),
        }
    }

    /// Creates an entry discovered from `parent`, one level deeper
    pub fn child(parent: &QueueEntry, url: &str, method: Method, meta_data: Option<String>) -> Self {
        Self {
            id: None,
            session_id: parent.session_id.clone(),
            url: url.to_string(),
            method,
            parent_url: Some(parent.url.clone()),
            depth: parent.depth + 1,
            meta_data,
            last_modified: None,
            create_time: Utc::now(),
        }
    }
}

/// How a stored access result was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Ok,
    NotModified,
}

impl ResultStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotModified => "not_modified",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(Self::Ok),
            "not_modified" => Some(Self::NotModified),
            _ => None,
        }
    }
}

/// A persisted record that a URL was fetched within a session
#[derive(Debug, Clone, PartialEq)]
pub struct AccessResult {
    pub session_id: String,
    pub url: String,
    pub parent_url: Option<String>,
    pub method: Method,
    pub depth: u32,
    pub status: ResultStatus,
    pub http_status_code: u16,
    pub mime_type: Option<String>,
    pub content_length: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub execution_time_ms: u64,
    pub transformer: String,
    pub encoding: Option<String>,
    pub data: Vec<u8>,
    pub create_time: DateTime<Utc>,
}

/// Which list of a scope filter a pattern belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Include,
    Exclude,
}

impl FilterKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "include" => Some(Self::Include),
            "exclude" => Some(Self::Exclude),
            _ => None,
        }
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
