//! In-memory storage implementation
//!
//! Implements the same stores as the SQLite backend over plain collections,
//! for tests and for sessions that do not need to survive the process.

use crate::storage::traits::{FilterStore, QueueStore, ResultStore, StorageError, StorageResult};
use crate::storage::{AccessResult, FilterKind, QueueEntry};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryData {
    next_id: i64,
    queue: Vec<QueueEntry>,
    results: HashMap<String, Vec<AccessResult>>,
    filters: HashMap<(String, FilterKind), Vec<String>>,
}

/// Storage backend holding everything in process memory
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<MemoryData>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> StorageResult<MutexGuard<'_, MemoryData>> {
        self.data.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl QueueStore for MemoryStorage {
    fn insert_batch(&self, session_id: &str, entries: &[QueueEntry]) -> StorageResult<usize> {
        let mut data = self.data()?;
        let mut inserted = 0;
        for entry in entries {
            let queued = data
                .queue
                .iter()
                .any(|e| e.session_id == session_id && e.url == entry.url);
            if queued {
                continue;
            }
            data.next_id += 1;
            let mut stored = entry.clone();
            stored.id = Some(data.next_id);
            stored.session_id = session_id.to_string();
            data.queue.push(stored);
            inserted += 1;
        }
        Ok(inserted)
    }

    fn delete_batch(&self, ids: &[i64]) -> StorageResult<()> {
        let mut data = self.data()?;
        data.queue
            .retain(|e| e.id.map_or(true, |id| !ids.contains(&id)));
        Ok(())
    }

    fn select_page(&self, session_id: &str, limit: usize) -> StorageResult<Vec<QueueEntry>> {
        let data = self.data()?;
        Ok(data
            .queue
            .iter()
            .filter(|e| e.session_id == session_id)
            .take(limit)
            .cloned()
            .collect())
    }

    fn take_page(&self, session_id: &str, limit: usize) -> StorageResult<Vec<QueueEntry>> {
        let mut data = self.data()?;
        let mut taken = Vec::new();
        let mut remaining = Vec::with_capacity(data.queue.len());
        for mut entry in data.queue.drain(..) {
            if taken.len() < limit && entry.session_id == session_id {
                entry.id = None;
                taken.push(entry);
            } else {
                remaining.push(entry);
            }
        }
        data.queue = remaining;
        Ok(taken)
    }

    fn count_url(&self, session_id: &str, url: &str) -> StorageResult<u64> {
        let data = self.data()?;
        Ok(data
            .queue
            .iter()
            .filter(|e| e.session_id == session_id && e.url == url)
            .count() as u64)
    }

    fn queue_len(&self, session_id: &str) -> StorageResult<u64> {
        let data = self.data()?;
        Ok(data
            .queue
            .iter()
            .filter(|e| e.session_id == session_id)
            .count() as u64)
    }

    fn delete_by_session(&self, session_id: &str) -> StorageResult<u64> {
        let mut data = self.data()?;
        let before = data.queue.len();
        data.queue.retain(|e| e.session_id != session_id);
        Ok((before - data.queue.len()) as u64)
    }

    fn delete_all(&self) -> StorageResult<u64> {
        let mut data = self.data()?;
        let deleted = data.queue.len();
        data.queue.clear();
        Ok(deleted as u64)
    }

    fn rename_session(&self, old_id: &str, new_id: &str) -> StorageResult<u64> {
        let mut data = self.data()?;
        let existing: Vec<String> = data
            .queue
            .iter()
            .filter(|e| e.session_id == new_id)
            .map(|e| e.url.clone())
            .collect();

        let mut moved = 0;
        data.queue.retain_mut(|e| {
            if e.session_id != old_id {
                return true;
            }
            if existing.contains(&e.url) {
                return false;
            }
            e.session_id = new_id.to_string();
            moved += 1;
            true
        });
        Ok(moved)
    }
}

impl ResultStore for MemoryStorage {
    fn store(&self, result: &AccessResult) -> StorageResult<()> {
        let mut data = self.data()?;
        let results = data.results.entry(result.session_id.clone()).or_default();
        if results.iter().any(|r| r.url == result.url) {
            return Err(StorageError::DuplicateResult {
                session_id: result.session_id.clone(),
                url: result.url.clone(),
            });
        }
        results.push(result.clone());
        Ok(())
    }

    fn exists(&self, session_id: &str, url: &str) -> StorageResult<bool> {
        let data = self.data()?;
        Ok(data
            .results
            .get(session_id)
            .map_or(false, |results| results.iter().any(|r| r.url == url)))
    }

    fn get(&self, session_id: &str, url: &str) -> StorageResult<Option<AccessResult>> {
        let data = self.data()?;
        Ok(data
            .results
            .get(session_id)
            .and_then(|results| results.iter().find(|r| r.url == url).cloned()))
    }

    fn count(&self, session_id: &str) -> StorageResult<u64> {
        let data = self.data()?;
        Ok(data.results.get(session_id).map_or(0, |r| r.len() as u64))
    }

    fn delete(&self, session_id: &str) -> StorageResult<u64> {
        let mut data = self.data()?;
        Ok(data.results.remove(session_id).map_or(0, |r| r.len() as u64))
    }

    fn result_page(
        &self,
        session_id: &str,
        offset: usize,
        limit: usize,
    ) -> StorageResult<Vec<AccessResult>> {
        let data = self.data()?;
        Ok(data
            .results
            .get(session_id)
            .map(|results| results.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn iterate(
        &self,
        session_id: &str,
        visit: &mut dyn FnMut(&AccessResult) -> StorageResult<()>,
    ) -> StorageResult<()> {
        let snapshot = {
            let data = self.data()?;
            data.results.get(session_id).cloned().unwrap_or_default()
        };
        for result in &snapshot {
            visit(result)?;
        }
        Ok(())
    }
}

impl FilterStore for MemoryStorage {
    fn add_pattern(
        &self,
        session_id: &str,
        kind: FilterKind,
        pattern: &str,
    ) -> StorageResult<()> {
        let mut data = self.data()?;
        let patterns = data
            .filters
            .entry((session_id.to_string(), kind))
            .or_default();
        if !patterns.iter().any(|p| p == pattern) {
            patterns.push(pattern.to_string());
        }
        Ok(())
    }

    fn patterns(&self, session_id: &str, kind: FilterKind) -> StorageResult<Vec<String>> {
        let data = self.data()?;
        Ok(data
            .filters
            .get(&(session_id.to_string(), kind))
            .cloned()
            .unwrap_or_default())
    }

    fn delete_patterns(&self, session_id: &str) -> StorageResult<u64> {
        let mut data = self.data()?;
        let mut deleted = 0;
        data.filters.retain(|(session, _), patterns| {
            if session == session_id {
                deleted += patterns.len() as u64;
                false
            } else {
                true
            }
        });
        Ok(deleted)
    }
}
