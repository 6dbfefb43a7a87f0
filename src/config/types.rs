use serde::Deserialize;

/// Main configuration structure for driftnet
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub frontier: FrontierConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub interval: IntervalConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Session limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of workers draining the frontier
    #[serde(rename = "thread-count")]
    pub thread_count: usize,

    /// Maximum link depth from a seed; negative means unlimited
    #[serde(rename = "max-depth")]
    pub max_depth: i32,

    /// Maximum number of stored results; 0 means unlimited
    #[serde(rename = "max-access-count")]
    pub max_access_count: u64,

    /// Consecutive empty polls a worker tolerates before exiting
    #[serde(rename = "max-thread-check-count")]
    pub max_thread_check_count: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            thread_count: 10,
            max_depth: -1,
            max_access_count: 0,
            max_thread_check_count: 20,
        }
    }
}

/// Frontier sizing
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FrontierConfig {
    /// Entries kept in memory per session before overflowing to storage
    #[serde(rename = "cache-size")]
    pub cache_size: usize,

    /// URLs remembered per session by the dedup cache
    #[serde(rename = "dedup-cache-size")]
    pub dedup_cache_size: usize,

    /// Results read per page when seeding from a previous session
    #[serde(rename = "generated-queue-size")]
    pub generated_queue_size: usize,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            cache_size: 1000,
            dedup_cache_size: 1000,
            generated_queue_size: 1000,
        }
    }
}

/// Fetch retry policy
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(rename = "max-retry-count")]
    pub max_retry_count: u32,

    /// Pause between attempts (milliseconds)
    #[serde(rename = "retry-interval")]
    pub retry_interval: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_count: 5,
            retry_interval: 500,
        }
    }
}

/// Worker pacing, all in milliseconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    #[serde(rename = "before-processing")]
    pub before_processing: u64,

    #[serde(rename = "after-processing")]
    pub after_processing: u64,

    #[serde(rename = "no-url-in-queue")]
    pub no_url_in_queue: u64,

    #[serde(rename = "waiting-new-url")]
    pub waiting_new_url: u64,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            before_processing: 0,
            after_processing: 0,
            no_url_in_queue: 500,
            waiting_new_url: 100,
        }
    }
}

/// Scope filter patterns and seed templates
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub includes: Vec<String>,

    pub excludes: Vec<String>,

    /// Template each seed is expanded into as an include pattern, e.g. `$1$2.*`
    ///
    /// `$1` is the scheme, `$2` the authority, `$3` the rest. Brace a
    /// reference followed by a word character: `$1${2}abc`.
    #[serde(rename = "include-template")]
    pub include_template: Option<String>,

    #[serde(rename = "exclude-template")]
    pub exclude_template: Option<String>,
}

/// HTTP client and response handling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Request timeout (seconds)
    pub timeout: u64,

    /// Largest body accepted, in bytes
    #[serde(rename = "max-content-length")]
    pub max_content_length: u64,

    #[serde(rename = "successful-status-codes")]
    pub successful_status_codes: Vec<u16>,

    #[serde(rename = "not-modified-status-codes")]
    pub not_modified_status_codes: Vec<u16>,

    /// Skip URLs disallowed by their host's robots.txt
    #[serde(rename = "robots-txt")]
    pub robots_txt: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("driftnet/{}", env!("CARGO_PKG_VERSION")),
            timeout: 30,
            max_content_length: 10 * 1024 * 1024,
            successful_status_codes: vec![200],
            not_modified_status_codes: vec![304],
            robots_txt: true,
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}
