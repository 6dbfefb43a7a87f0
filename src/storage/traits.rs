//! Storage traits and error types
//!
//! This module defines the trait interfaces for the three stores a crawl
//! session persists through, and their shared error type.

use crate::storage::{AccessResult, FilterKind, QueueEntry};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Result already stored for {url} in session {session_id}")]
    DuplicateResult { session_id: String, url: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent half of the frontier, partitioned by session id
///
/// Implementations are shared between workers and must synchronize internally.
pub trait QueueStore: Send + Sync {
    /// Inserts entries for a session
    ///
    /// An entry whose URL is already queued for the session is skipped.
    ///
    /// # Returns
    ///
    /// The number of entries actually inserted
    fn insert_batch(&self, session_id: &str, entries: &[QueueEntry]) -> StorageResult<usize>;

    /// Deletes queued entries by persistence id
    fn delete_batch(&self, ids: &[i64]) -> StorageResult<()>;

    /// Returns up to `limit` of the oldest entries of a session without removing them
    fn select_page(&self, session_id: &str, limit: usize) -> StorageResult<Vec<QueueEntry>>;

    /// Selects up to `limit` of the oldest entries of a session and deletes them
    /// in the same unit of work
    ///
    /// Returned entries have their persistence id cleared.
    fn take_page(&self, session_id: &str, limit: usize) -> StorageResult<Vec<QueueEntry>>;

    /// Counts queued entries for a URL within a session
    fn count_url(&self, session_id: &str, url: &str) -> StorageResult<u64>;

    /// Counts all queued entries of a session
    fn queue_len(&self, session_id: &str) -> StorageResult<u64>;

    /// Deletes every queued entry of a session
    fn delete_by_session(&self, session_id: &str) -> StorageResult<u64>;

    /// Deletes every queued entry of every session
    fn delete_all(&self) -> StorageResult<u64>;

    /// Moves every queued entry of `old_id` to `new_id`
    fn rename_session(&self, old_id: &str, new_id: &str) -> StorageResult<u64>;
}

/// Access results, at most one per URL per session
pub trait ResultStore: Send + Sync {
    /// Persists a result
    ///
    /// # Returns
    ///
    /// * `Err(StorageError::DuplicateResult)` - A result for the URL already exists
    fn store(&self, result: &AccessResult) -> StorageResult<()>;

    /// Returns whether a result exists for a URL within a session
    fn exists(&self, session_id: &str, url: &str) -> StorageResult<bool>;

    /// Loads the result for a URL within a session
    fn get(&self, session_id: &str, url: &str) -> StorageResult<Option<AccessResult>>;

    /// Counts the results of a session
    fn count(&self, session_id: &str) -> StorageResult<u64>;

    /// Deletes every result of a session
    fn delete(&self, session_id: &str) -> StorageResult<u64>;

    /// Returns a page of results ordered by creation
    fn result_page(
        &self,
        session_id: &str,
        offset: usize,
        limit: usize,
    ) -> StorageResult<Vec<AccessResult>>;

    /// Visits every result of a session in creation order
    fn iterate(
        &self,
        session_id: &str,
        visit: &mut dyn FnMut(&AccessResult) -> StorageResult<()>,
    ) -> StorageResult<()>;
}

/// Scope filter patterns bound to a session
pub trait FilterStore: Send + Sync {
    /// Persists a pattern; storing the same pattern twice is a no-op
    fn add_pattern(&self, session_id: &str, kind: FilterKind, pattern: &str)
        -> StorageResult<()>;

    /// Loads the patterns of one kind in insertion order
    fn patterns(&self, session_id: &str, kind: FilterKind) -> StorageResult<Vec<String>>;

    /// Deletes every pattern of a session
    fn delete_patterns(&self, session_id: &str) -> StorageResult<u64>;
}
