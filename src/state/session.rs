//! Per-session counters, limits and lifecycle

use crate::state::SessionStatus;
use crate::CrawlError;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Resource limits a session is crawled under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    /// Maximum number of stored results; 0 means unlimited
    pub max_access_count: u64,

    /// Maximum link depth from a seed; negative means unlimited
    pub max_depth: i32,

    /// Number of workers draining the frontier
    pub thread_count: usize,

    /// Consecutive empty polls a worker tolerates before exiting
    pub max_thread_check_count: u32,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_access_count: 0,
            max_depth: -1,
            thread_count: 10,
            max_thread_check_count: 20,
        }
    }
}

impl CrawlLimits {
    /// Returns true if an entry at `depth` may still be fetched
    pub fn allows_depth(&self, depth: u32) -> bool {
        self.max_depth < 0 || depth as i64 <= self.max_depth as i64
    }

    /// Returns true if children discovered at `depth` may be enqueued
    pub fn allows_children_of(&self, depth: u32) -> bool {
        self.max_depth < 0 || (depth as i64) < self.max_depth as i64
    }
}

/// Counters guarded by the session mutex
#[derive(Debug, Default)]
pub struct SessionCounters {
    pub access_count: u64,
}

impl SessionCounters {
    /// Returns true while another result may be accepted
    pub fn gate_open(&self, limits: &CrawlLimits) -> bool {
        limits.max_access_count == 0 || self.access_count < limits.max_access_count
    }
}

/// One isolated crawl run
///
/// Status advances monotonically. Every visited check and access-count change
/// happens while holding the guard returned by [`Session::lock`].
#[derive(Debug)]
pub struct Session {
    id: String,
    limits: CrawlLimits,
    status: AtomicU8,
    counters: Mutex<SessionCounters>,
    running_workers: AtomicUsize,
    busy_workers: AtomicUsize,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>, limits: CrawlLimits) -> Self {
        Self {
            id: id.into(),
            limits,
            status: AtomicU8::new(SessionStatus::Initialized.as_u8()),
            counters: Mutex::new(SessionCounters::default()),
            running_workers: AtomicUsize::new(0),
            busy_workers: AtomicUsize::new(0),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn limits(&self) -> &CrawlLimits {
        &self.limits
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Moves the session forward to `next`
    ///
    /// # Returns
    ///
    /// `true` if the status changed, `false` if the session was already at or
    /// past `next`
    pub fn advance_status(&self, next: SessionStatus) -> bool {
        let mut current = self.status.load(Ordering::SeqCst);
        loop {
            if SessionStatus::from_u8(current) >= next {
                return false;
            }
            match self.status.compare_exchange(
                current,
                next.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    tracing::debug!(
                        "Session {} {} -> {}",
                        self.id,
                        SessionStatus::from_u8(current),
                        next
                    );
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Requests the session to wind down
    pub fn stop(&self) -> bool {
        self.advance_status(SessionStatus::Finishing)
    }

    /// Acquires the session mutex
    pub fn lock(&self) -> Result<MutexGuard<'_, SessionCounters>, CrawlError> {
        self.counters
            .lock()
            .map_err(|_| CrawlError::LockPoisoned(format!("session {}", self.id)))
    }

    pub fn access_count(&self) -> Result<u64, CrawlError> {
        Ok(self.lock()?.access_count)
    }

    /// Returns true once `max_access_count` results were accepted
    pub fn access_limit_reached(&self) -> Result<bool, CrawlError> {
        Ok(!self.lock()?.gate_open(&self.limits))
    }

    // ===== Worker Accounting =====

    pub(crate) fn worker_started(&self) {
        self.running_workers.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a worker exit and returns how many are still running
    pub(crate) fn worker_exited(&self) -> usize {
        self.running_workers.fetch_sub(1, Ordering::SeqCst) - 1
    }

    pub fn running_workers(&self) -> usize {
        self.running_workers.load(Ordering::SeqCst)
    }

    /// Marks a worker busy until the returned guard is dropped
    pub(crate) fn begin_work(&self) -> BusyGuard<'_> {
        self.busy_workers.fetch_add(1, Ordering::SeqCst);
        BusyGuard { session: self }
    }

    pub fn busy_workers(&self) -> usize {
        self.busy_workers.load(Ordering::SeqCst)
    }
}

/// Keeps a worker counted as busy
pub(crate) struct BusyGuard<'a> {
    session: &'a Session,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.session.busy_workers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Generates a session id from the current time (`yyyyMMddHHmmssSSS`)
pub fn generate_session_id() -> String {
    Utc::now().format("%Y%m%d%H%M%S%3f").to_string()
}
