//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the queue, result
//! and filter stores. A single connection is shared behind a mutex.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{FilterStore, QueueStore, ResultStore, StorageError, StorageResult};
use crate::storage::{
    format_timestamp, parse_timestamp, AccessResult, FilterKind, Method, QueueEntry, ResultStatus,
};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const QUEUE_COLUMNS: &str =
    "id, session_id, method, url, meta_data, parent_url, depth, last_modified, create_time";

const RESULT_COLUMNS: &str = "session_id, url, parent_url, method, depth, status, \
     http_status_code, mime_type, content_length, last_modified, execution_time, transformer, \
     encoding, data, create_time";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CrawlError)` - Failed to open database
    pub fn new(path: &Path) -> crate::Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        tracing::debug!("Opened storage at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> crate::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }
}

fn queue_entry_from_row(row: &Row<'_>) -> rusqlite::Result<QueueEntry> {
    let method: String = row.get(2)?;
    let last_modified: Option<String> = row.get(7)?;
    let create_time: String = row.get(8)?;
    Ok(QueueEntry {
        id: Some(row.get(0)?),
        session_id: row.get(1)?,
        method: Method::from_db_string(&method).unwrap_or_default(),
        url: row.get(3)?,
        meta_data: row.get(4)?,
        parent_url: row.get(5)?,
        depth: row.get::<_, i64>(6)?.max(0) as u32,
        last_modified: last_modified.as_deref().and_then(parse_timestamp),
        create_time: parse_timestamp(&create_time).unwrap_or_else(Utc::now),
    })
}

fn access_result_from_row(row: &Row<'_>) -> rusqlite::Result<AccessResult> {
    let method: String = row.get(3)?;
    let status: String = row.get(5)?;
    let last_modified: Option<String> = row.get(9)?;
    let create_time: String = row.get(14)?;
    Ok(AccessResult {
        session_id: row.get(0)?,
        url: row.get(1)?,
        parent_url: row.get(2)?,
        method: Method::from_db_string(&method).unwrap_or_default(),
        depth: row.get::<_, i64>(4)?.max(0) as u32,
        status: ResultStatus::from_db_string(&status).unwrap_or(ResultStatus::Ok),
        http_status_code: row.get::<_, i64>(6)?.clamp(0, u16::MAX as i64) as u16,
        mime_type: row.get(7)?,
        content_length: row.get::<_, i64>(8)?.max(0) as u64,
        last_modified: last_modified.as_deref().and_then(parse_timestamp),
        execution_time_ms: row.get::<_, i64>(10)?.max(0) as u64,
        transformer: row.get(11)?,
        encoding: row.get(12)?,
        data: row.get::<_, Option<Vec<u8>>>(13)?.unwrap_or_default(),
        create_time: parse_timestamp(&create_time).unwrap_or_else(Utc::now),
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl QueueStore for SqliteStorage {
    fn insert_batch(&self, session_id: &str, entries: &[QueueEntry]) -> StorageResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO url_queue
                 (session_id, method, url, meta_data, parent_url, depth, last_modified, create_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for entry in entries {
                inserted += stmt.execute(params![
                    session_id,
                    entry.method.to_db_string(),
                    entry.url,
                    entry.meta_data,
                    entry.parent_url,
                    entry.depth as i64,
                    entry.last_modified.as_ref().map(format_timestamp),
                    format_timestamp(&entry.create_time),
                ])?;
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn delete_batch(&self, ids: &[i64]) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM url_queue WHERE id = ?1")?;
            for id in ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn select_page(&self, session_id: &str, limit: usize) -> StorageResult<Vec<QueueEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM url_queue WHERE session_id = ?1 ORDER BY id ASC LIMIT ?2",
            QUEUE_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![session_id, limit as i64], queue_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn take_page(&self, session_id: &str, limit: usize) -> StorageResult<Vec<QueueEntry>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut entries = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM url_queue WHERE session_id = ?1 ORDER BY id ASC LIMIT ?2",
                QUEUE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![session_id, limit as i64], queue_entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        {
            let mut delete = tx.prepare("DELETE FROM url_queue WHERE id = ?1")?;
            for entry in &mut entries {
                if let Some(id) = entry.id.take() {
                    delete.execute(params![id])?;
                }
            }
        }
        tx.commit()?;
        Ok(entries)
    }

    fn count_url(&self, session_id: &str, url: &str) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM url_queue WHERE session_id = ?1 AND url = ?2",
            params![session_id, url],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn queue_len(&self, session_id: &str) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM url_queue WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn delete_by_session(&self, session_id: &str) -> StorageResult<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM url_queue WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(deleted as u64)
    }

    fn delete_all(&self) -> StorageResult<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM url_queue", [])?;
        Ok(deleted as u64)
    }

    fn rename_session(&self, old_id: &str, new_id: &str) -> StorageResult<u64> {
        let conn = self.conn()?;
        // Rows already queued under new_id win over the renamed ones
        let moved = conn.execute(
            "UPDATE OR IGNORE url_queue SET session_id = ?2 WHERE session_id = ?1",
            params![old_id, new_id],
        )?;
        conn.execute(
            "DELETE FROM url_queue WHERE session_id = ?1",
            params![old_id],
        )?;
        Ok(moved as u64)
    }
}

impl ResultStore for SqliteStorage {
    fn store(&self, result: &AccessResult) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO access_result ({}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                RESULT_COLUMNS
            ),
            params![
                result.session_id,
                result.url,
                result.parent_url,
                result.method.to_db_string(),
                result.depth as i64,
                result.status.to_db_string(),
                result.http_status_code as i64,
                result.mime_type,
                result.content_length as i64,
                result.last_modified.as_ref().map(format_timestamp),
                result.execution_time_ms as i64,
                result.transformer,
                result.encoding,
                result.data,
                format_timestamp(&result.create_time),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::DuplicateResult {
                    session_id: result.session_id.clone(),
                    url: result.url.clone(),
                }
            } else {
                StorageError::Sqlite(e)
            }
        })?;
        Ok(())
    }

    fn exists(&self, session_id: &str, url: &str) -> StorageResult<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM access_result WHERE session_id = ?1 AND url = ?2",
                params![session_id, url],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn get(&self, session_id: &str, url: &str) -> StorageResult<Option<AccessResult>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!(
                    "SELECT {} FROM access_result WHERE session_id = ?1 AND url = ?2",
                    RESULT_COLUMNS
                ),
                params![session_id, url],
                access_result_from_row,
            )
            .optional()?;
        Ok(result)
    }

    fn count(&self, session_id: &str) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM access_result WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn delete(&self, session_id: &str) -> StorageResult<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM access_result WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(deleted as u64)
    }

    fn result_page(
        &self,
        session_id: &str,
        offset: usize,
        limit: usize,
    ) -> StorageResult<Vec<AccessResult>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM access_result WHERE session_id = ?1 ORDER BY id ASC LIMIT ?2 OFFSET ?3",
            RESULT_COLUMNS
        ))?;
        let results = stmt
            .query_map(
                params![session_id, limit as i64, offset as i64],
                access_result_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }

    fn iterate(
        &self,
        session_id: &str,
        visit: &mut dyn FnMut(&AccessResult) -> StorageResult<()>,
    ) -> StorageResult<()> {
        const PAGE: usize = 500;
        let mut offset = 0;
        loop {
            // The lock is released between pages so the visitor may use the store
            let page = self.result_page(session_id, offset, PAGE)?;
            for result in &page {
                visit(result)?;
            }
            if page.len() < PAGE {
                return Ok(());
            }
            offset += PAGE;
        }
    }
}

impl FilterStore for SqliteStorage {
    fn add_pattern(
        &self,
        session_id: &str,
        kind: FilterKind,
        pattern: &str,
    ) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO url_filter (session_id, filter_type, url_pattern, create_time)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id,
                kind.to_db_string(),
                pattern,
                format_timestamp(&Utc::now())
            ],
        )?;
        Ok(())
    }

    fn patterns(&self, session_id: &str, kind: FilterKind) -> StorageResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT url_pattern FROM url_filter
             WHERE session_id = ?1 AND filter_type = ?2 ORDER BY id ASC",
        )?;
        let patterns = stmt
            .query_map(params![session_id, kind.to_db_string()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(patterns)
    }

    fn delete_patterns(&self, session_id: &str) -> StorageResult<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM url_filter WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(deleted as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_for(session_id: &str, url: &str) -> AccessResult {
        AccessResult {
            session_id: session_id.to_string(),
            url: url.to_string(),
            parent_url: None,
            method: Method::Get,
            depth: 0,
            status: ResultStatus::Ok,
            http_status_code: 200,
            mime_type: Some("text/html".to_string()),
            content_length: 5,
            last_modified: None,
            execution_time_ms: 3,
            transformer: "html".to_string(),
            encoding: Some("utf-8".to_string()),
            data: b"hello".to_vec(),
            create_time: Utc::now(),
        }
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl.db");
        let storage = SqliteStorage::new(&path).unwrap();

        storage
            .insert_batch("s1", &[QueueEntry::seed("s1", "https://example.com/")])
            .unwrap();
        drop(storage);

        let reopened = SqliteStorage::new(&path).unwrap();
        assert_eq!(reopened.queue_len("s1").unwrap(), 1);
    }

    #[test]
    fn test_insert_batch_skips_queued_url() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let entries = vec![
            QueueEntry::seed("s1", "https://example.com/"),
            QueueEntry::seed("s1", "https://example.com/"),
            QueueEntry::seed("s1", "https://example.com/a"),
        ];

        assert_eq!(storage.insert_batch("s1", &entries).unwrap(), 2);
        assert_eq!(storage.queue_len("s1").unwrap(), 2);
        assert_eq!(storage.count_url("s1", "https://example.com/").unwrap(), 1);
    }

    #[test]
    fn test_take_page_is_fifo_and_removes() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let entries: Vec<_> = (0..5)
            .map(|i| QueueEntry::seed("s1", &format!("https://example.com/{}", i)))
            .collect();
        storage.insert_batch("s1", &entries).unwrap();

        let page = storage.take_page("s1", 3).unwrap();
        let urls: Vec<_> = page.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/0",
                "https://example.com/1",
                "https://example.com/2"
            ]
        );
        assert!(page.iter().all(|e| e.id.is_none()));
        assert_eq!(storage.queue_len("s1").unwrap(), 2);
    }

    #[test]
    fn test_select_page_and_delete_batch() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .insert_batch(
                "s1",
                &[
                    QueueEntry::seed("s1", "https://example.com/a"),
                    QueueEntry::seed("s1", "https://example.com/b"),
                ],
            )
            .unwrap();

        let page = storage.select_page("s1", 10).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(storage.queue_len("s1").unwrap(), 2);

        let ids: Vec<i64> = page.iter().filter_map(|e| e.id).collect();
        storage.delete_batch(&ids).unwrap();
        assert_eq!(storage.queue_len("s1").unwrap(), 0);
    }

    #[test]
    fn test_sessions_are_partitioned() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .insert_batch("a", &[QueueEntry::seed("a", "https://example.com/")])
            .unwrap();
        storage
            .insert_batch("b", &[QueueEntry::seed("b", "https://example.com/")])
            .unwrap();

        assert_eq!(storage.delete_by_session("a").unwrap(), 1);
        assert_eq!(storage.queue_len("a").unwrap(), 0);
        assert_eq!(storage.queue_len("b").unwrap(), 1);
    }

    #[test]
    fn test_rename_session() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .insert_batch("old", &[QueueEntry::seed("old", "https://example.com/")])
            .unwrap();

        assert_eq!(storage.rename_session("old", "new").unwrap(), 1);
        assert_eq!(storage.queue_len("old").unwrap(), 0);
        let page = storage.select_page("new", 10).unwrap();
        assert_eq!(page[0].session_id, "new");
    }

    #[test]
    fn test_store_duplicate_result_fails() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.store(&result_for("s1", "https://example.com/")).unwrap();

        let err = storage
            .store(&result_for("s1", "https://example.com/"))
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateResult { .. }));

        // Same URL in another session is fine
        storage.store(&result_for("s2", "https://example.com/")).unwrap();
    }

    #[test]
    fn test_result_roundtrip() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let result = result_for("s1", "https://example.com/page");
        storage.store(&result).unwrap();

        assert!(storage.exists("s1", "https://example.com/page").unwrap());
        assert!(!storage.exists("s1", "https://example.com/other").unwrap());

        let loaded = storage.get("s1", "https://example.com/page").unwrap().unwrap();
        assert_eq!(loaded.data, b"hello");
        assert_eq!(loaded.transformer, "html");
        assert_eq!(loaded.http_status_code, 200);
    }

    #[test]
    fn test_iterate_and_delete_results() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        for i in 0..3 {
            storage
                .store(&result_for("s1", &format!("https://example.com/{}", i)))
                .unwrap();
        }

        let mut seen = Vec::new();
        storage
            .iterate("s1", &mut |r| {
                seen.push(r.url.clone());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], "https://example.com/0");

        assert_eq!(storage.delete("s1").unwrap(), 3);
        assert_eq!(storage.count("s1").unwrap(), 0);
    }

    #[test]
    fn test_filter_patterns() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .add_pattern("s1", FilterKind::Include, "https://a/.*")
            .unwrap();
        storage
            .add_pattern("s1", FilterKind::Include, "https://a/.*")
            .unwrap();
        storage
            .add_pattern("s1", FilterKind::Exclude, ".*\\.pdf")
            .unwrap();

        assert_eq!(
            storage.patterns("s1", FilterKind::Include).unwrap(),
            vec!["https://a/.*".to_string()]
        );
        assert_eq!(storage.patterns("s1", FilterKind::Exclude).unwrap().len(), 1);
        assert_eq!(storage.delete_patterns("s1").unwrap(), 2);
    }
}
