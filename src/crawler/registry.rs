//! URL-pattern dispatch to fetch clients

use crate::crawler::client::{FetchClient, FetchOutcome, FetchRequest};
use crate::FetchError;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

/// Ordered (pattern, client) pairs; the first pattern matching a URL wins
#[derive(Default)]
pub struct ClientRegistry {
    entries: Vec<(Regex, Arc<dyn FetchClient>)>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client for URLs matching `pattern`
    ///
    /// # Returns
    ///
    /// * `Err(CrawlError::Pattern)` - The pattern does not compile
    pub fn register(mut self, pattern: &str, client: Arc<dyn FetchClient>) -> crate::Result<Self> {
        self.entries.push((Regex::new(pattern)?, client));
        Ok(self)
    }

    /// Returns the client responsible for a URL
    pub fn client_for(&self, url: &str) -> Option<&Arc<dyn FetchClient>> {
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.is_match(url))
            .map(|(_, client)| client)
    }

    pub fn supports(&self, url: &str) -> bool {
        self.client_for(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl FetchClient for ClientRegistry {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        match self.client_for(&request.url) {
            Some(client) => client.fetch(request).await,
            None => Err(FetchError::Unsupported {
                url: request.url.clone(),
            }),
        }
    }
}
