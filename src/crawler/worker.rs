//! Worker loop draining one session's frontier
//!
//! Each worker repeatedly:
//! 1. Polls the session's frontier
//! 2. Claims the entry under the session mutex (visited and access-gate checks)
//! 3. Fetches it through the fault-tolerant fetcher
//! 4. Stores the result and offers in-scope children one level deeper
//!
//! Workers exit once the session leaves `Running`, or after repeatedly finding
//! the frontier empty while no other worker holds an entry.

use crate::crawler::client::{ChildRequest, FetchOutcome, FetchRequest, ResponseData};
use crate::crawler::fault_tolerant::FaultTolerantFetcher;
use crate::crawler::interval::{IntervalController, IntervalKind};
use crate::crawler::processor::{ResponseClass, ResponseProcessor};
use crate::crawler::registry::ClientRegistry;
use crate::crawler::transformer::TransformOutput;
use crate::frontier::Frontier;
use crate::robots::RobotsCache;
use crate::state::Session;
use crate::storage::{AccessResult, Method, QueueEntry, ResultStatus, ResultStore};
use crate::url::{is_blank, normalize_url, ScopeFilter};
use chrono::Utc;
use std::sync::Arc;

/// Everything the workers of one session share
pub(crate) struct WorkerContext {
    pub session: Arc<Session>,
    pub frontier: Arc<Frontier>,
    pub filter: Arc<ScopeFilter>,
    pub clients: Arc<ClientRegistry>,
    pub fetcher: Arc<FaultTolerantFetcher>,
    pub processor: Arc<ResponseProcessor>,
    pub results: Arc<dyn ResultStore>,
    pub robots: Option<Arc<RobotsCache>>,
    pub interval: IntervalController,
}

pub(crate) struct CrawlWorker {
    index: usize,
    ctx: Arc<WorkerContext>,
}

impl CrawlWorker {
    pub(crate) fn new(index: usize, ctx: Arc<WorkerContext>) -> Self {
        Self { index, ctx }
    }

    /// Runs until the session winds down
    ///
    /// The caller must have registered the worker with
    /// `Session::worker_started`. The last worker to exit moves the session to
    /// `Finishing`. A hard error stops the session.
    pub(crate) async fn run(self) -> crate::Result<()> {
        let session = &self.ctx.session;
        tracing::debug!("Worker {} of session {} started", self.index, session.id());

        let result = self.work().await;
        if let Err(e) = &result {
            tracing::error!(
                "Worker {} of session {} failed: {}",
                self.index,
                session.id(),
                e
            );
            session.stop();
        }

        if session.worker_exited() == 0 {
            session.stop();
        }
        tracing::debug!("Worker {} of session {} exited", self.index, session.id());

        result
    }

    async fn work(&self) -> crate::Result<()> {
        let session = &self.ctx.session;
        let limits = *session.limits();
        let mut empty_checks = 0u32;

        while session.status().is_running() {
            if session.access_limit_reached()? {
                tracing::info!(
                    "Session {} reached {} accesses",
                    session.id(),
                    limits.max_access_count
                );
                session.stop();
                break;
            }

            let busy = session.begin_work();
            let Some(entry) = self.ctx.frontier.poll(session.id())? else {
                drop(busy);
                empty_checks += 1;

                let others_busy = session.busy_workers() > 0;
                if empty_checks > limits.max_thread_check_count && !others_busy {
                    tracing::debug!(
                        "Worker {} found no URLs after {} checks",
                        self.index,
                        empty_checks
                    );
                    break;
                }

                let kind = if others_busy {
                    IntervalKind::WaitingNewUrl
                } else {
                    IntervalKind::NoUrlInQueue
                };
                self.ctx.interval.delay(kind).await;
                continue;
            };

            empty_checks = 0;
            self.process_entry(entry).await?;
            drop(busy);

            self.ctx.interval.delay(IntervalKind::AfterProcessing).await;
        }

        Ok(())
    }

    async fn process_entry(&self, entry: QueueEntry) -> crate::Result<()> {
        let ctx = &self.ctx;

        if !ctx.session.limits().allows_depth(entry.depth) {
            tracing::debug!("Skipping {} at depth {}", entry.url, entry.depth);
            return Ok(());
        }
        if !ctx.filter.matches(&entry.url) {
            tracing::debug!("Skipping out-of-scope {}", entry.url);
            return Ok(());
        }
        if !ctx.clients.supports(&entry.url) {
            tracing::warn!("No fetch client handles {}", entry.url);
            return Ok(());
        }
        if let Some(robots) = &ctx.robots {
            if !robots.is_allowed(&entry.url).await {
                tracing::info!("URL {} disallowed by robots.txt", entry.url);
                return Ok(());
            }
        }
        if !self.claim(&entry)? {
            return Ok(());
        }

        ctx.interval.delay(IntervalKind::BeforeProcessing).await;

        if let Some(response) = self.check_freshness(&entry).await {
            return self.handle_document(&entry, response);
        }

        match ctx.fetcher.fetch(&FetchRequest::from(&entry)).await {
            Ok(FetchOutcome::Document(response)) => self.handle_document(&entry, response),
            Ok(FetchOutcome::ChildExpansion { children, .. }) => {
                let accepted = self.enqueue_children(&entry, children)?;
                tracing::debug!("Expanded {} into {} entries", entry.url, accepted);
                Ok(())
            }
            Ok(FetchOutcome::TooLarge { url, size, limit }) => {
                tracing::warn!("Dropping {}: {} bytes exceeds limit of {}", url, size, limit);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Dropping {}: {}", entry.url, e);
                Ok(())
            }
        }
    }

    /// Returns false if the entry must not be fetched
    ///
    /// Entries blocked by the access gate go back to the frontier.
    fn claim(&self, entry: &QueueEntry) -> crate::Result<bool> {
        let session = &self.ctx.session;
        let counters = session.lock()?;

        if self.ctx.frontier.visited(entry)? {
            tracing::debug!("{} already fetched", entry.url);
            return Ok(false);
        }
        if !counters.gate_open(session.limits()) {
            self.ctx.frontier.requeue(entry.clone())?;
            return Ok(false);
        }

        Ok(true)
    }

    /// HEAD request for entries carried over from a previous session
    ///
    /// # Returns
    ///
    /// A not-modified response if the resource has not changed since
    /// `entry.last_modified`
    async fn check_freshness(&self, entry: &QueueEntry) -> Option<ResponseData> {
        let known = entry.last_modified?;
        let processor = &self.ctx.processor;

        let request = FetchRequest {
            url: entry.url.clone(),
            method: Method::Head,
            meta_data: entry.meta_data.clone(),
        };
        match self.ctx.fetcher.fetch(&request).await {
            Ok(FetchOutcome::Document(head))
                if processor.classify(&head) == ResponseClass::Successful =>
            {
                let modified = head.last_modified?;
                if modified > known {
                    return None;
                }
                let mut response =
                    ResponseData::new(&entry.url, entry.method, processor.not_modified_code());
                response.mime_type = head.mime_type;
                response.last_modified = Some(modified);
                response.execution_time = head.execution_time;
                Some(response)
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Freshness check for {} failed: {}", entry.url, e);
                None
            }
        }
    }

    fn handle_document(&self, entry: &QueueEntry, response: ResponseData) -> crate::Result<()> {
        if let Some(location) = &response.redirect_location {
            match normalize_url(location) {
                Ok(target) => {
                    tracing::debug!("{} redirects to {}", entry.url, target);
                    self.enqueue_children(entry, vec![ChildRequest::get(target.as_str())])?;
                }
                Err(e) => tracing::debug!("Ignoring redirect of {} to {}: {}", entry.url, location, e),
            }
            return Ok(());
        }

        let output = match self.ctx.processor.process(&response) {
            Ok(Some(output)) => output,
            Ok(None) => {
                tracing::debug!("Ignoring {} (status {})", entry.url, response.status_code);
                return Ok(());
            }
            Err(e) => {
                tracing::warn!("Dropping {}: {}", entry.url, e);
                return Ok(());
            }
        };

        self.commit(entry, &response, output)
    }

    /// Stores the result and offers its children
    fn commit(
        &self,
        entry: &QueueEntry,
        response: &ResponseData,
        output: TransformOutput,
    ) -> crate::Result<()> {
        let session = &self.ctx.session;
        let status = match self.ctx.processor.classify(response) {
            ResponseClass::NotModified => ResultStatus::NotModified,
            _ => ResultStatus::Ok,
        };

        let mut counters = session.lock()?;

        if self.ctx.frontier.visited(entry)? {
            tracing::debug!("{} was stored by another worker", entry.url);
            return Ok(());
        }
        if !counters.gate_open(session.limits()) {
            self.ctx.frontier.requeue(entry.clone())?;
            return Ok(());
        }

        let mut children = output.children;
        children.extend(response.child_requests.iter().cloned());

        self.ctx.results.store(&AccessResult {
            session_id: entry.session_id.clone(),
            url: entry.url.clone(),
            parent_url: entry.parent_url.clone(),
            method: entry.method,
            depth: entry.depth,
            status,
            http_status_code: response.status_code,
            mime_type: response.mime_type.clone(),
            content_length: response.content_length,
            last_modified: response.last_modified,
            execution_time_ms: response.execution_time.as_millis() as u64,
            transformer: output.transformer,
            encoding: output.encoding,
            data: output.data,
            create_time: Utc::now(),
        })?;
        counters.access_count += 1;
        tracing::debug!(
            "Stored {} for session {} ({} accesses)",
            entry.url,
            entry.session_id,
            counters.access_count
        );

        self.enqueue_children(entry, children)?;
        Ok(())
    }

    /// Offers in-scope children of `entry` one level deeper
    fn enqueue_children(&self, entry: &QueueEntry, children: Vec<ChildRequest>) -> crate::Result<usize> {
        if children.is_empty() || !self.ctx.session.limits().allows_children_of(entry.depth) {
            return Ok(0);
        }

        let entries: Vec<QueueEntry> = children
            .into_iter()
            .filter(|child| !is_blank(&child.url) && self.ctx.filter.matches(&child.url))
            .map(|child| QueueEntry::child(entry, &child.url, child.method, child.meta_data))
            .collect();

        self.ctx.frontier.offer_all(&entry.session_id, entries)
    }
}
