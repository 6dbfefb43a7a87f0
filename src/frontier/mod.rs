//! Session-partitioned crawl frontier
//!
//! Each session owns a bounded in-memory queue backed by a [`QueueStore`] for
//! overflow, plus a [`DedupCache`] of URLs already offered to it. The frontier
//! guarantees that a URL is queued at most once per session and never handed
//! to two callers.

mod dedup;

pub use dedup::DedupCache;

use crate::config::FrontierConfig;
use crate::storage::{QueueEntry, QueueStore, ResultStore};
use crate::{CrawlError, Result};
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory half of one session's frontier
struct SessionQueue {
    pending: VecDeque<QueueEntry>,
    pending_urls: HashSet<String>,
    dedup: DedupCache,
    /// Set while the queue store may hold entries for this session
    spilled: bool,
}

impl SessionQueue {
    fn new(dedup_capacity: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            pending_urls: HashSet::new(),
            dedup: DedupCache::new(dedup_capacity),
            spilled: false,
        }
    }

    fn push(&mut self, entry: QueueEntry) {
        self.pending_urls.insert(entry.url.clone());
        self.pending.push_back(entry);
    }

    fn pop(&mut self) -> Option<QueueEntry> {
        let entry = self.pending.pop_front()?;
        self.pending_urls.remove(&entry.url);
        Some(entry)
    }
}

type Partition = Arc<Mutex<SessionQueue>>;

/// Pending URLs of every session, deduplicated per session
pub struct Frontier {
    queue_store: Arc<dyn QueueStore>,
    result_store: Arc<dyn ResultStore>,
    config: FrontierConfig,
    sessions: Mutex<HashMap<String, Partition>>,
}

impl Frontier {
    pub fn new(
        queue_store: Arc<dyn QueueStore>,
        result_store: Arc<dyn ResultStore>,
        config: FrontierConfig,
    ) -> Self {
        Self {
            queue_store,
            result_store,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &FrontierConfig {
        &self.config
    }

    fn sessions(&self) -> Result<MutexGuard<'_, HashMap<String, Partition>>> {
        self.sessions
            .lock()
            .map_err(|_| CrawlError::LockPoisoned("frontier sessions".to_string()))
    }

    fn partition(&self, session_id: &str) -> Result<Partition> {
        let mut sessions = self.sessions()?;
        if let Some(partition) = sessions.get(session_id) {
            return Ok(partition.clone());
        }

        // Entries persisted by an earlier run stay ahead of new offers
        let mut queue = SessionQueue::new(self.config.dedup_cache_size);
        queue.spilled = self.queue_store.queue_len(session_id)? > 0;
        let partition = Arc::new(Mutex::new(queue));
        sessions.insert(session_id.to_string(), partition.clone());
        Ok(partition)
    }

    fn lock_queue<'a>(
        partition: &'a Partition,
        session_id: &str,
    ) -> Result<MutexGuard<'a, SessionQueue>> {
        partition
            .lock()
            .map_err(|_| CrawlError::LockPoisoned(format!("frontier queue {}", session_id)))
    }

    /// Queues a seed URL (GET, depth 0)
    ///
    /// # Returns
    ///
    /// `true` if the URL was accepted
    pub fn add(&self, session_id: &str, url: &str) -> Result<bool> {
        let accepted = self.offer_all(session_id, vec![QueueEntry::seed(session_id, url)])?;
        Ok(accepted == 1)
    }

    /// Offers entries to a session's frontier
    ///
    /// Each entry is accepted only if its URL is non-blank, not recently
    /// offered, not already pending in memory or in the queue store, and has
    /// no stored result. The partition lock is held for the whole batch.
    ///
    /// # Returns
    ///
    /// The number of entries accepted
    pub fn offer_all(&self, session_id: &str, entries: Vec<QueueEntry>) -> Result<usize> {
        self.offer(session_id, entries, true)
    }

    /// Puts a previously polled entry back without consulting the dedup cache
    pub fn requeue(&self, entry: QueueEntry) -> Result<bool> {
        let session_id = entry.session_id.clone();
        Ok(self.offer(&session_id, vec![entry], false)? == 1)
    }

    fn offer(&self, session_id: &str, entries: Vec<QueueEntry>, use_cache: bool) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let partition = self.partition(session_id)?;
        let mut queue = Self::lock_queue(&partition, session_id)?;

        let mut batch_urls = HashSet::new();
        let mut to_persist = Vec::new();
        let mut accepted = 0;

        for mut entry in entries {
            if !self.is_new_url(session_id, &mut queue, &batch_urls, &entry.url, use_cache)? {
                continue;
            }

            entry.id = None;
            entry.session_id = session_id.to_string();
            batch_urls.insert(entry.url.clone());
            accepted += 1;

            if !queue.spilled && queue.pending.len() < self.config.cache_size {
                queue.push(entry);
            } else {
                queue.spilled = true;
                to_persist.push(entry);
            }
        }

        if !to_persist.is_empty() {
            let inserted = self.queue_store.insert_batch(session_id, &to_persist)?;
            if inserted < to_persist.len() {
                tracing::debug!(
                    "{} entries for session {} were already persisted",
                    to_persist.len() - inserted,
                    session_id
                );
                accepted -= to_persist.len() - inserted;
            }
        }

        Ok(accepted)
    }

    fn is_new_url(
        &self,
        session_id: &str,
        queue: &mut SessionQueue,
        batch_urls: &HashSet<String>,
        url: &str,
        use_cache: bool,
    ) -> Result<bool> {
        if crate::url::is_blank(url) {
            tracing::debug!("Rejecting blank URL for session {}", session_id);
            return Ok(false);
        }

        if use_cache && !queue.dedup.insert(url) {
            tracing::debug!("{} was recently offered", url);
            return Ok(false);
        }

        if queue.pending_urls.contains(url) || batch_urls.contains(url) {
            tracing::debug!("{} is already pending", url);
            return Ok(false);
        }

        if self.queue_store.count_url(session_id, url)? > 0 {
            tracing::debug!("{} is already queued", url);
            return Ok(false);
        }

        if self.result_store.exists(session_id, url)? {
            tracing::debug!("{} was already fetched", url);
            return Ok(false);
        }

        Ok(true)
    }

    /// Takes the oldest pending entry of a session
    ///
    /// Refills the in-memory queue from the queue store when it runs dry.
    pub fn poll(&self, session_id: &str) -> Result<Option<QueueEntry>> {
        let partition = self.partition(session_id)?;
        let mut queue = Self::lock_queue(&partition, session_id)?;

        if let Some(entry) = queue.pop() {
            return Ok(Some(entry));
        }

        let page = self
            .queue_store
            .take_page(session_id, self.config.cache_size)?;
        if page.len() < self.config.cache_size {
            queue.spilled = false;
        }
        if !page.is_empty() {
            tracing::debug!("Loaded {} queued entries for session {}", page.len(), session_id);
        }
        for entry in page {
            queue.push(entry);
        }

        Ok(queue.pop())
    }

    /// Returns true if the entry's URL already has a stored result
    pub fn visited(&self, entry: &QueueEntry) -> Result<bool> {
        Ok(self.result_store.exists(&entry.session_id, &entry.url)?)
    }

    /// Counts pending entries of a session, in memory and persisted
    pub fn len(&self, session_id: &str) -> Result<u64> {
        let partition = self.sessions()?.get(session_id).cloned();
        let in_memory = match partition {
            Some(partition) => Self::lock_queue(&partition, session_id)?.pending.len() as u64,
            None => 0,
        };
        Ok(in_memory + self.queue_store.queue_len(session_id)?)
    }

    /// Number of sessions holding in-memory state
    pub fn active_sessions(&self) -> Result<usize> {
        Ok(self.sessions()?.len())
    }

    pub fn is_empty(&self, session_id: &str) -> Result<bool> {
        Ok(self.len(session_id)? == 0)
    }

    /// Drops every pending entry and the dedup cache of a session
    pub fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions()?.remove(session_id);
        let deleted = self.queue_store.delete_by_session(session_id)?;
        tracing::debug!("Deleted {} queued entries for session {}", deleted, session_id);
        Ok(())
    }

    /// Drops every pending entry of every session
    pub fn delete_all(&self) -> Result<()> {
        self.sessions()?.clear();
        self.queue_store.delete_all()?;
        Ok(())
    }

    /// Moves a session's pending entries, in memory and persisted, to a new id
    pub fn update_session_id(&self, old_id: &str, new_id: &str) -> Result<()> {
        let mut sessions = self.sessions()?;
        let moved = self.queue_store.rename_session(old_id, new_id)?;

        if let Some(partition) = sessions.remove(old_id) {
            {
                let mut queue = Self::lock_queue(&partition, old_id)?;
                for entry in queue.pending.iter_mut() {
                    entry.session_id = new_id.to_string();
                }
                queue.spilled = true;
            }
            sessions.insert(new_id.to_string(), partition);
        }

        tracing::info!(
            "Renamed session {} to {} ({} persisted entries)",
            old_id,
            new_id,
            moved
        );
        Ok(())
    }

    /// Seeds a session from the results of a previous one
    ///
    /// Every result becomes a depth-0 entry keeping its method, parent and
    /// last-modified time, so unchanged resources can be detected.
    ///
    /// # Returns
    ///
    /// The number of entries generated
    pub fn generate_url_queues(&self, previous_id: &str, new_id: &str) -> Result<usize> {
        let total = self.result_store.count(previous_id)? as usize;
        let partition = self.partition(new_id)?;
        let mut queue = Self::lock_queue(&partition, new_id)?;

        let mut offset = 0;
        let mut generated = 0;
        while offset < total {
            let page =
                self.result_store
                    .result_page(previous_id, offset, self.config.generated_queue_size)?;
            if page.is_empty() {
                break;
            }
            offset += page.len();

            let entries: Vec<QueueEntry> = page
                .iter()
                .map(|result| QueueEntry {
                    id: None,
                    session_id: new_id.to_string(),
                    url: result.url.clone(),
                    method: result.method,
                    parent_url: result.parent_url.clone(),
                    depth: 0,
                    meta_data: None,
                    last_modified: result.last_modified,
                    create_time: Utc::now(),
                })
                .collect();
            generated += self.queue_store.insert_batch(new_id, &entries)?;
        }

        if generated > 0 {
            queue.spilled = true;
        }

        tracing::info!(
            "Generated {} entries for session {} from session {}",
            generated,
            new_id,
            previous_id
        );
        Ok(generated)
    }

    /// Flushes a session's in-memory queue to the queue store and releases
    /// its partition
    ///
    /// Call once no worker polls the session anymore. Offers made afterwards
    /// start from an empty dedup cache and are deduplicated against the
    /// queue and result stores.
    ///
    /// # Returns
    ///
    /// The number of entries saved
    pub fn save_session(&self, session_id: &str) -> Result<usize> {
        let Some(partition) = self.sessions()?.remove(session_id) else {
            return Ok(0);
        };
        let mut queue = Self::lock_queue(&partition, session_id)?;

        let entries: Vec<QueueEntry> = queue.pending.drain(..).collect();
        queue.pending_urls.clear();
        if entries.is_empty() {
            return Ok(0);
        }

        let saved = self.queue_store.insert_batch(session_id, &entries)?;
        queue.spilled = true;
        tracing::debug!("Saved {} pending entries for session {}", saved, session_id);
        Ok(saved)
    }
}
