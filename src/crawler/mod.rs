//! Crawler module for fetching and processing resources
//!
//! This module contains the core crawling logic, including:
//! - The fetch client contract and its HTTP and filesystem implementations
//! - Bounded retries around any client
//! - Response classification and link extraction
//! - The per-session worker pool and the [`Crawler`] that runs sessions

mod client;
mod fault_tolerant;
mod fs;
mod http;
mod interval;
mod orchestrator;
mod processor;
mod registry;
mod transformer;
mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{
    parse_content_type, ChildRequest, FetchClient, FetchOutcome, FetchRequest, ResponseData,
};
pub use fault_tolerant::{FaultTolerantFetcher, LoggingListener, RequestListener};
pub use fs::FileSystemClient;
pub use http::{build_http_client, HttpClient};
pub use interval::{IntervalController, IntervalKind};
pub use orchestrator::{Crawler, SessionSnapshot, SessionSpec};
pub use processor::{ResponseClass, ResponseProcessor};
pub use registry::ClientRegistry;
pub use transformer::{
    parse_html, HtmlTransformer, ParsedPage, TransformOutput, Transformer, NO_TRANSFORMER,
};
