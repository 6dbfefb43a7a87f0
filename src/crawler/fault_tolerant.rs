//! Bounded-retry wrapper around any fetch client

use crate::crawler::client::{FetchClient, FetchOutcome, FetchRequest};
use crate::FetchError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Observer of fetch attempts
///
/// Hooks are informational only and cannot change the outcome of a fetch.
pub trait RequestListener: Send + Sync {
    fn on_request_start(&self, _request: &FetchRequest) {}

    /// Called before each attempt; `attempt` starts at 1
    fn on_request(&self, _request: &FetchRequest, _attempt: u32) {}

    fn on_exception(&self, _request: &FetchRequest, _attempt: u32, _error: &FetchError) {}

    fn on_request_end(&self, _request: &FetchRequest) {}
}

/// Listener that reports attempts through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl RequestListener for LoggingListener {
    fn on_request(&self, request: &FetchRequest, attempt: u32) {
        tracing::debug!("{} {} (attempt {})", request.method, request.url, attempt);
    }

    fn on_exception(&self, request: &FetchRequest, attempt: u32, error: &FetchError) {
        tracing::debug!(
            "Attempt {} for {} {} failed: {}",
            attempt,
            request.method,
            request.url,
            error
        );
    }
}

/// Retries failed fetches a fixed number of times with a fixed pause
///
/// Child-expansion and too-large outcomes are not failures and are returned
/// after a single attempt.
pub struct FaultTolerantFetcher {
    client: Arc<dyn FetchClient>,
    max_retry_count: u32,
    retry_interval: Duration,
    listener: Option<Arc<dyn RequestListener>>,
}

impl FaultTolerantFetcher {
    pub fn new(client: Arc<dyn FetchClient>) -> Self {
        Self {
            client,
            max_retry_count: 5,
            retry_interval: Duration::from_millis(500),
            listener: None,
        }
    }

    /// Sets the total number of attempts (at least one is always made)
    pub fn with_max_retry_count(mut self, max_retry_count: u32) -> Self {
        self.max_retry_count = max_retry_count.max(1);
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    /// Fetches with retries
    ///
    /// # Returns
    ///
    /// * `Ok(FetchOutcome)` - First attempt that did not fail
    /// * `Err(FetchError::RetriesExhausted)` - Every attempt failed; carries each error
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        if let Some(listener) = &self.listener {
            listener.on_request_start(request);
        }

        let result = self.fetch_with_retries(request).await;

        if let Some(listener) = &self.listener {
            listener.on_request_end(request);
        }

        result
    }

    async fn fetch_with_retries(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let mut causes = Vec::new();

        for attempt in 1..=self.max_retry_count {
            if let Some(listener) = &self.listener {
                listener.on_request(request, attempt);
            }

            match self.client.fetch(request).await {
                Ok(outcome) => return Ok(outcome),
                Err(error) => {
                    if let Some(listener) = &self.listener {
                        listener.on_exception(request, attempt, &error);
                    }
                    causes.push(error);

                    if attempt < self.max_retry_count && !self.retry_interval.is_zero() {
                        tokio::time::sleep(self.retry_interval).await;
                    }
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            method: request.method,
            url: request.url.clone(),
            causes,
        })
    }
}

#[async_trait]
impl FetchClient for FaultTolerantFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        FaultTolerantFetcher::fetch(self, request).await
    }
}
