//! Configuration module for driftnet
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use driftnet::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("driftnet.toml")).unwrap();
//! println!("Crawling with {} workers", config.crawler.thread_count);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FilterConfig, FrontierConfig, HttpConfig, IntervalConfig, RetryConfig,
    StorageConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

use crate::state::CrawlLimits;

impl From<&CrawlerConfig> for CrawlLimits {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_access_count: config.max_access_count,
            max_depth: config.max_depth,
            thread_count: config.thread_count,
            max_thread_check_count: config.max_thread_check_count,
        }
    }
}
