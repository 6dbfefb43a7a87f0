//! Statistics generation from session storage
//!
//! This module provides functionality for extracting and displaying
//! per-session crawl statistics from the storage layer.

use crate::storage::{QueueStore, ResultStatus, ResultStore};
use std::collections::BTreeMap;

/// Session statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatistics {
    pub session_id: String,

    /// Number of stored results
    pub total_results: u64,

    /// Results that were unchanged since the previous session
    pub not_modified: u64,

    /// Count of results by HTTP status code
    pub results_by_status_code: BTreeMap<u16, u64>,

    /// Count of results by link depth
    pub results_by_depth: BTreeMap<u32, u64>,

    /// Count of results by mime type
    pub results_by_mime_type: BTreeMap<String, u64>,

    /// Deepest stored result
    pub max_depth: u32,

    /// Sum of stored content lengths
    pub total_bytes: u64,

    /// Mean fetch time in milliseconds
    pub average_execution_ms: f64,

    /// Entries persisted in the queue store, not yet fetched
    pub queued: u64,
}

/// Loads statistics for one session
///
/// # Arguments
///
/// * `queue` - The queue store holding unvisited entries
/// * `results` - The result store to scan
/// * `session_id` - The session to summarize
///
/// # Returns
///
/// * `Ok(SessionStatistics)` - Successfully loaded statistics
/// * `Err(CrawlError)` - Failed to query storage
pub fn load_statistics(
    queue: &dyn QueueStore,
    results: &dyn ResultStore,
    session_id: &str,
) -> crate::Result<SessionStatistics> {
    let mut stats = SessionStatistics {
        session_id: session_id.to_string(),
        queued: queue.queue_len(session_id)?,
        ..Default::default()
    };
    let mut total_execution_ms = 0u64;

    results.iterate(session_id, &mut |result| {
        stats.total_results += 1;
        if result.status == ResultStatus::NotModified {
            stats.not_modified += 1;
        }
        *stats
            .results_by_status_code
            .entry(result.http_status_code)
            .or_default() += 1;
        *stats.results_by_depth.entry(result.depth).or_default() += 1;
        if let Some(mime_type) = &result.mime_type {
            *stats
                .results_by_mime_type
                .entry(mime_type.clone())
                .or_default() += 1;
        }
        stats.max_depth = stats.max_depth.max(result.depth);
        stats.total_bytes += result.content_length;
        total_execution_ms += result.execution_time_ms;
        Ok(())
    })?;

    if stats.total_results > 0 {
        stats.average_execution_ms = total_execution_ms as f64 / stats.total_results as f64;
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &SessionStatistics) {
    println!("=== Session {} ===\n", stats.session_id);

    println!("Overview:");
    println!("  Results stored: {}", stats.total_results);
    println!("  Not modified: {}", stats.not_modified);
    println!("  Still queued: {}", stats.queued);
    println!("  Bytes stored: {}", stats.total_bytes);
    println!("  Max depth: {}", stats.max_depth);
    println!("  Average fetch time: {:.1} ms", stats.average_execution_ms);
    println!();

    if !stats.results_by_status_code.is_empty() {
        println!("Results by Status Code:");
        for (code, count) in &stats.results_by_status_code {
            println!("  {}: {}", code, count);
        }
        println!();
    }

    if !stats.results_by_depth.is_empty() {
        println!("Results by Depth:");
        for (depth, count) in &stats.results_by_depth {
            let percentage = (*count as f64 / stats.total_results as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", depth, count, percentage);
        }
        println!();
    }

    if !stats.results_by_mime_type.is_empty() {
        println!("Results by Type:");
        let mut mime_counts: Vec<_> = stats.results_by_mime_type.iter().collect();
        mime_counts.sort_by(|a, b| b.1.cmp(a.1));
        for (mime_type, count) in mime_counts {
            println!("  {}: {}", mime_type, count);
        }
    }
}
