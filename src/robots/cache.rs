//! Per-host robots.txt cache
//!
//! Each host's robots.txt is fetched once and refreshed after 24 hours.
//! Concurrent lookups for the same host share a single fetch.

use crate::crawler::{FetchClient, FetchOutcome, FetchRequest};
use crate::robots::RobotsRules;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;
use url::Url;

/// Rules of one host along with when they were fetched
#[derive(Debug, Clone)]
pub struct CachedRules {
    pub rules: RobotsRules,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRules {
    pub fn new(rules: RobotsRules) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the rules are older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

type Slot = Arc<OnceCell<CachedRules>>;

/// Robots.txt gate shared by every session of a crawler
pub struct RobotsCache {
    client: Arc<dyn FetchClient>,
    user_agent: String,
    hosts: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    /// Creates a cache fetching through `client`
    ///
    /// Only the product token of `user_agent` (`driftnet` in
    /// `driftnet/0.1.0`) is matched against `User-agent` groups.
    pub fn new(client: Arc<dyn FetchClient>, user_agent: &str) -> Self {
        let token = user_agent
            .split(|c: char| c == '/' || c.is_whitespace())
            .next()
            .unwrap_or_default();
        Self {
            client,
            user_agent: token.to_string(),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Checks a URL against its host's robots.txt
    ///
    /// URLs without an http(s) host are always allowed. A missing or
    /// unreadable robots.txt allows everything.
    pub async fn is_allowed(&self, url: &str) -> bool {
        let Some(robots_url) = robots_url(url) else {
            return true;
        };

        let slot = self.slot(&robots_url);
        let cached = slot.get_or_init(|| self.fetch(&robots_url)).await;
        cached.rules.is_allowed(url, &self.user_agent)
    }

    /// Number of hosts with cached rules
    pub fn len(&self) -> usize {
        self.hosts().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn hosts(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.hosts.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slot(&self, robots_url: &str) -> Slot {
        let mut hosts = self.hosts();
        match hosts.get(robots_url) {
            Some(slot) if !slot.get().is_some_and(CachedRules::is_stale) => slot.clone(),
            _ => {
                let slot = Slot::default();
                hosts.insert(robots_url.to_string(), slot.clone());
                slot
            }
        }
    }

    async fn fetch(&self, robots_url: &str) -> CachedRules {
        tracing::debug!("Fetching {}", robots_url);
        let rules = match self.client.fetch(&FetchRequest::get(robots_url)).await {
            Ok(FetchOutcome::Document(data)) if (200..300).contains(&data.status_code) => {
                RobotsRules::from_content(&String::from_utf8_lossy(&data.body))
            }
            Ok(FetchOutcome::Document(data)) => {
                tracing::debug!("No robots.txt at {} (status {})", robots_url, data.status_code);
                RobotsRules::allow_all()
            }
            Ok(_) => {
                tracing::warn!("Ignoring unusable robots.txt at {}", robots_url);
                RobotsRules::allow_all()
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", robots_url, e);
                RobotsRules::allow_all()
            }
        };
        CachedRules::new(rules)
    }
}

/// Location of the robots.txt governing `url`, for http and https URLs
fn robots_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    parsed.join("/robots.txt").ok().map(|u| u.to_string())
}
