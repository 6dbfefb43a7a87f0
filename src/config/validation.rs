use crate::config::types::{
    Config, CrawlerConfig, FilterConfig, FrontierConfig, HttpConfig, RetryConfig, StorageConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_frontier_config(&config.frontier)?;
    validate_retry_config(&config.retry)?;
    validate_filter_config(&config.filter)?;
    validate_http_config(&config.http)?;
    validate_storage_config(&config.storage)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates session limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.thread_count < 1 || config.thread_count > 256 {
        return Err(ConfigError::Validation(format!(
            "thread_count must be between 1 and 256, got {}",
            config.thread_count
        )));
    }

    if config.max_thread_check_count < 1 {
        return Err(ConfigError::Validation(
            "max_thread_check_count must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_frontier_config(config: &FrontierConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("cache_size", config.cache_size),
        ("dedup_cache_size", config.dedup_cache_size),
        ("generated_queue_size", config.generated_queue_size),
    ] {
        if value < 1 {
            return Err(ConfigError::Validation(format!("{} must be >= 1", name)));
        }
    }
    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_retry_count < 1 {
        return Err(ConfigError::Validation(
            "max_retry_count must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates that every configured pattern compiles
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    for pattern in config.includes.iter().chain(config.excludes.iter()) {
        Regex::new(pattern).map_err(|e| {
            ConfigError::Validation(format!("Invalid filter pattern '{}': {}", pattern, e))
        })?;
    }

    for template in config
        .include_template
        .iter()
        .chain(config.exclude_template.iter())
    {
        crate::url::validate_template(template).map_err(ConfigError::Validation)?;
    }
    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout < 1 {
        return Err(ConfigError::Validation("timeout must be >= 1s".to_string()));
    }

    if config.successful_status_codes.is_empty() {
        return Err(ConfigError::Validation(
            "successful_status_codes cannot be empty".to_string(),
        ));
    }

    for code in config
        .successful_status_codes
        .iter()
        .chain(config.not_modified_status_codes.iter())
    {
        if !(100..=599).contains(code) {
            return Err(ConfigError::Validation(format!(
                "Status code {} is outside 100..=599",
                code
            )));
        }
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates seed URLs
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    if seeds.is_empty() {
        return Err(ConfigError::Validation(
            "At least one seed URL is required".to_string(),
        ));
    }

    for seed in seeds {
        Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;
    }

    Ok(())
}
