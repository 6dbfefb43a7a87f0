//! Driftnet: a session-partitioned crawl frontier and orchestration engine
//!
//! This crate discovers, deduplicates, filters and fetches reachable resources
//! from a set of seed URLs. Each crawl runs as an isolated session with its own
//! frontier partition, result partition and scope filter, drained by a fixed
//! pool of workers under access-count and depth limits.

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for driftnet operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Session already exists: {0}")]
    SessionExists(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Errors raised by fetch clients
///
/// Every variant except `RetriesExhausted` describes a single failed attempt and
/// is retried by [`crawler::FaultTolerantFetcher`]. Oversized content and
/// container expansion are not errors; they are reported through
/// [`crawler::FetchOutcome`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("IO error for {url}: {source}")]
    Io { url: String, source: std::io::Error },

    #[error("No fetch client registered for {url}")]
    Unsupported { url: String },

    #[error("Fetch failed for {url}: {message}")]
    Client { url: String, message: String },

    #[error("Failed to fetch {method} {url} after {} attempts", .causes.len())]
    RetriesExhausted {
        method: storage::Method,
        url: String,
        causes: Vec<FetchError>,
    },
}

impl FetchError {
    /// Returns the URL the failed request targeted
    pub fn url(&self) -> &str {
        match self {
            Self::Http { url, .. }
            | Self::Timeout { url }
            | Self::Io { url, .. }
            | Self::Unsupported { url }
            | Self::Client { url, .. }
            | Self::RetriesExhausted { url, .. } => url,
        }
    }
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Blank URL")]
    Blank,
}

/// Result type alias for driftnet operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Crawler, FaultTolerantFetcher, FetchClient, FetchOutcome, SessionSpec};
pub use frontier::{DedupCache, Frontier};
pub use state::{CrawlLimits, Session, SessionStatus};
pub use storage::{AccessResult, Method, QueueEntry};
pub use url::ScopeFilter;
