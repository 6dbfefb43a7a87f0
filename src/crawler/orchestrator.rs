//! Session orchestration
//!
//! The [`Crawler`] owns the shared frontier, stores and fetch clients, and runs
//! any number of concurrent sessions on top of them. Each session gets its own
//! [`Session`] state, scope filter and worker pool.

use crate::config::Config;
use crate::crawler::fault_tolerant::{FaultTolerantFetcher, LoggingListener, RequestListener};
use crate::crawler::fs::FileSystemClient;
use crate::crawler::http::HttpClient;
use crate::crawler::interval::IntervalController;
use crate::crawler::processor::ResponseProcessor;
use crate::crawler::registry::ClientRegistry;
use crate::crawler::worker::{CrawlWorker, WorkerContext};
use crate::frontier::Frontier;
use crate::robots::RobotsCache;
use crate::state::{generate_session_id, CrawlLimits, Session, SessionStatus};
use crate::storage::{FilterStore, QueueStore, ResultStore};
use crate::url::{normalize_url, ScopeFilter};
use crate::CrawlError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Parameters of a new session
#[derive(Debug, Clone, Default)]
pub struct SessionSpec {
    /// Generated from the current time when absent
    pub session_id: Option<String>,
    pub seeds: Vec<String>,
    pub limits: CrawlLimits,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    /// Session whose results seed this one (differential crawl)
    pub previous_session: Option<String>,
}

impl SessionSpec {
    pub fn new<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seeds: seeds.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Builds a spec from the crawler, filter and seed sections of a config
    pub fn from_config(config: &Config) -> Self {
        Self {
            session_id: None,
            seeds: config.seeds.clone(),
            limits: CrawlLimits::from(&config.crawler),
            includes: config.filter.includes.clone(),
            excludes: config.filter.excludes.clone(),
            previous_session: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_limits(mut self, limits: CrawlLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_include(mut self, pattern: impl Into<String>) -> Self {
        self.includes.push(pattern.into());
        self
    }

    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    pub fn with_previous_session(mut self, session_id: impl Into<String>) -> Self {
        self.previous_session = Some(session_id.into());
        self
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: SessionStatus,
    pub access_count: u64,
    pub queued: u64,
    pub running_workers: usize,
}

struct SessionHandle {
    session: Arc<Session>,
    task: Option<JoinHandle<crate::Result<()>>>,
}

/// Runs crawl sessions over shared storage
///
/// Finished sessions stay registered so their status can still be queried;
/// [`Crawler::cleanup`] forgets them.
pub struct Crawler {
    frontier: Arc<Frontier>,
    results: Arc<dyn ResultStore>,
    filters: Arc<dyn FilterStore>,
    clients: Arc<ClientRegistry>,
    processor: Arc<ResponseProcessor>,
    max_retry_count: u32,
    retry_interval: Duration,
    interval: IntervalController,
    include_template: Option<String>,
    exclude_template: Option<String>,
    listener: Option<Arc<dyn RequestListener>>,
    robots: Option<Arc<RobotsCache>>,
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl Crawler {
    pub fn new(
        frontier: Arc<Frontier>,
        results: Arc<dyn ResultStore>,
        filters: Arc<dyn FilterStore>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            frontier,
            results,
            filters,
            clients,
            processor: Arc::new(ResponseProcessor::default()),
            max_retry_count: 5,
            retry_interval: Duration::from_millis(500),
            interval: IntervalController::default(),
            include_template: None,
            exclude_template: None,
            listener: None,
            robots: None,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Builds a crawler with HTTP(S) and filesystem clients over one storage backend
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    /// * `storage` - Backend used as queue, result and filter store
    pub fn from_config<S>(config: &Config, storage: Arc<S>) -> crate::Result<Self>
    where
        S: QueueStore + ResultStore + FilterStore + 'static,
    {
        let max_content_length = config.http.max_content_length;
        let clients = Arc::new(
            ClientRegistry::new()
                .register("^https?://", Arc::new(HttpClient::new(&config.http)?))?
                .register("^file:", Arc::new(FileSystemClient::new(max_content_length)))?,
        );

        let frontier = Frontier::new(storage.clone(), storage.clone(), config.frontier);

        let mut crawler = Self::new(Arc::new(frontier), storage.clone(), storage, clients.clone());
        if config.http.robots_txt {
            crawler = crawler.with_robots(Arc::new(RobotsCache::new(
                clients,
                &config.http.user_agent,
            )));
        }

        Ok(
            crawler
                .with_processor(ResponseProcessor::from_config(&config.http))
                .with_retry(
                    config.retry.max_retry_count,
                    Duration::from_millis(config.retry.retry_interval),
                )
                .with_interval(IntervalController::from(&config.interval))
                .with_templates(
                    config.filter.include_template.clone(),
                    config.filter.exclude_template.clone(),
                )
                .with_listener(Arc::new(LoggingListener)),
        )
    }

    pub fn with_processor(mut self, processor: ResponseProcessor) -> Self {
        self.processor = Arc::new(processor);
        self
    }

    pub fn with_retry(mut self, max_retry_count: u32, retry_interval: Duration) -> Self {
        self.max_retry_count = max_retry_count;
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_interval(mut self, interval: IntervalController) -> Self {
        self.interval = interval;
        self
    }

    /// Templates used to derive filter patterns from seed URLs
    pub fn with_templates(
        mut self,
        include_template: Option<String>,
        exclude_template: Option<String>,
    ) -> Self {
        self.include_template = include_template;
        self.exclude_template = exclude_template;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Skips URLs disallowed by their host's robots.txt
    pub fn with_robots(mut self, robots: Arc<RobotsCache>) -> Self {
        self.robots = Some(robots);
        self
    }

    pub fn frontier(&self) -> &Arc<Frontier> {
        &self.frontier
    }

    /// Starts a session and returns its id
    ///
    /// Seeds are normalized and passed through the filter templates; seeds that
    /// end up out of scope are skipped. Must be called within a tokio runtime.
    pub fn start(&self, spec: SessionSpec) -> crate::Result<String> {
        let session_id = spec.session_id.clone().unwrap_or_else(generate_session_id);

        let mut sessions = self.lock_sessions()?;
        if sessions.contains_key(&session_id) {
            return Err(CrawlError::SessionExists(session_id));
        }

        let filter = ScopeFilter::new(self.filters.clone()).with_templates(
            self.include_template.clone(),
            self.exclude_template.clone(),
        );
        for pattern in &spec.includes {
            filter.add_include(pattern);
        }
        for pattern in &spec.excludes {
            filter.add_exclude(pattern);
        }
        filter.init(&session_id)?;

        if let Some(previous) = &spec.previous_session {
            let generated = self.frontier.generate_url_queues(previous, &session_id)?;
            tracing::info!(
                "Seeded session {} with {} URLs from session {}",
                session_id,
                generated,
                previous
            );
        }

        let mut seeded = 0;
        for seed in &spec.seeds {
            let url = match normalize_url(seed) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    tracing::warn!("Skipping seed {:?}: {}", seed, e);
                    continue;
                }
            };
            filter.process_url(&url);
            if !filter.matches(&url) {
                tracing::warn!("Seed {} is outside the session scope", url);
                continue;
            }
            if self.frontier.add(&session_id, &url)? {
                seeded += 1;
            }
        }

        let session = Arc::new(Session::new(&session_id, spec.limits));
        let ctx = Arc::new(WorkerContext {
            session: session.clone(),
            frontier: self.frontier.clone(),
            filter: Arc::new(filter),
            clients: self.clients.clone(),
            fetcher: Arc::new(self.build_fetcher()),
            processor: self.processor.clone(),
            results: self.results.clone(),
            robots: self.robots.clone(),
            interval: self.interval,
        });

        let task = tokio::spawn(run_session(ctx));
        sessions.insert(
            session_id.clone(),
            SessionHandle {
                session,
                task: Some(task),
            },
        );

        tracing::info!(
            "Started session {} with {} seeds and {} workers",
            session_id,
            seeded,
            spec.limits.thread_count
        );

        Ok(session_id)
    }

    pub fn session(&self, session_id: &str) -> crate::Result<Arc<Session>> {
        self.lock_sessions()?
            .get(session_id)
            .map(|handle| handle.session.clone())
            .ok_or_else(|| CrawlError::SessionNotFound(session_id.to_string()))
    }

    pub fn status(&self, session_id: &str) -> crate::Result<SessionSnapshot> {
        let session = self.session(session_id)?;
        Ok(SessionSnapshot {
            session_id: session_id.to_string(),
            status: session.status(),
            access_count: session.access_count()?,
            queued: self.frontier.len(session_id)?,
            running_workers: session.running_workers(),
        })
    }

    /// Waits until the session is done
    ///
    /// # Returns
    ///
    /// The first hard error raised while the session ran. Only the first
    /// caller receives it; later callers just wait for `Done`.
    pub async fn await_termination(&self, session_id: &str) -> crate::Result<()> {
        let (session, task) = {
            let mut sessions = self.lock_sessions()?;
            let handle = sessions
                .get_mut(session_id)
                .ok_or_else(|| CrawlError::SessionNotFound(session_id.to_string()))?;
            (handle.session.clone(), handle.task.take())
        };

        match task {
            Some(task) => task.await.map_err(|e| CrawlError::Worker(e.to_string()))?,
            None => {
                while session.status() != SessionStatus::Done {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Ok(())
            }
        }
    }

    /// Asks a session to wind down; in-flight fetches complete
    ///
    /// # Returns
    ///
    /// `false` if the session was already finishing or done
    pub fn stop(&self, session_id: &str) -> crate::Result<bool> {
        let session = self.session(session_id)?;
        let stopped = session.stop();
        if stopped {
            tracing::info!("Stopping session {}", session_id);
        }
        Ok(stopped)
    }

    /// Stops every running session
    pub fn stop_all(&self) -> crate::Result<()> {
        for handle in self.lock_sessions()?.values() {
            handle.session.stop();
        }
        Ok(())
    }

    /// Removes every trace of a session: queue, results and filter patterns
    ///
    /// A running session is stopped and awaited first. Works for sessions
    /// that only exist in storage.
    pub async fn cleanup(&self, session_id: &str) -> crate::Result<()> {
        let handle = self.lock_sessions()?.remove(session_id);
        if let Some(mut handle) = handle {
            handle.session.stop();
            if let Some(task) = handle.task.take() {
                match task.await {
                    Ok(Err(e)) => tracing::warn!("Session {} ended with error: {}", session_id, e),
                    Err(e) => tracing::warn!("Session {} task failed: {}", session_id, e),
                    Ok(Ok(())) => {}
                }
            }
        }

        self.frontier.delete(session_id)?;
        let results = self.results.delete(session_id)?;
        self.filters.delete_patterns(session_id)?;

        tracing::info!(
            "Cleaned up session {} ({} results removed)",
            session_id,
            results
        );
        Ok(())
    }

    fn build_fetcher(&self) -> FaultTolerantFetcher {
        let fetcher = FaultTolerantFetcher::new(self.clients.clone())
            .with_max_retry_count(self.max_retry_count)
            .with_retry_interval(self.retry_interval);
        match &self.listener {
            Some(listener) => fetcher.with_listener(listener.clone()),
            None => fetcher,
        }
    }

    fn lock_sessions(&self) -> crate::Result<MutexGuard<'_, HashMap<String, SessionHandle>>> {
        self.sessions
            .lock()
            .map_err(|_| CrawlError::LockPoisoned("session table".to_string()))
    }
}

/// Drives one session from `Running` to `Done`
async fn run_session(ctx: Arc<WorkerContext>) -> crate::Result<()> {
    let session = ctx.session.clone();
    let started = Instant::now();
    session.advance_status(SessionStatus::Running);

    let thread_count = session.limits().thread_count.max(1);
    let mut workers = Vec::with_capacity(thread_count);
    for index in 0..thread_count {
        session.worker_started();
        workers.push(tokio::spawn(CrawlWorker::new(index, ctx.clone()).run()));
    }

    let mut first_error = None;
    for worker in workers {
        let outcome = match worker.await {
            Ok(outcome) => outcome,
            Err(e) => Err(CrawlError::Worker(e.to_string())),
        };
        if let Err(e) = outcome {
            session.stop();
            first_error.get_or_insert(e);
        }
    }

    session.stop();
    let saved = ctx.frontier.save_session(session.id());
    session.advance_status(SessionStatus::Done);

    tracing::info!(
        "Session {} done: {} results in {:?}",
        session.id(),
        session.access_count().unwrap_or_default(),
        started.elapsed()
    );

    match (first_error, saved) {
        (Some(e), _) => Err(e),
        (None, Err(e)) => Err(e),
        (None, Ok(saved)) => {
            if saved > 0 {
                tracing::info!("Kept {} unvisited URLs of session {}", saved, session.id());
            }
            Ok(())
        }
    }
}
