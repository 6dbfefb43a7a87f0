//! Uniform request/response contract every fetch client implements

use crate::storage::{Method, QueueEntry};
use crate::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// What a worker asks a fetch client for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    /// Opaque data handed through to the client
    pub meta_data: Option<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            meta_data: None,
        }
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Head,
            meta_data: None,
        }
    }
}

impl From<&QueueEntry> for FetchRequest {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            url: entry.url.clone(),
            method: entry.method,
            meta_data: entry.meta_data.clone(),
        }
    }
}

/// A resource discovered while fetching another one
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChildRequest {
    pub url: String,
    pub method: Method,
    pub meta_data: Option<String>,
}

impl ChildRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            meta_data: None,
        }
    }
}

/// A fetched document
#[derive(Debug, Clone, Default)]
pub struct ResponseData {
    pub url: String,
    pub method: Method,
    pub status_code: u16,
    pub mime_type: Option<String>,
    pub charset: Option<String>,
    pub content_length: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub body: Vec<u8>,
    pub execution_time: Duration,
    /// Children the client itself discovered (e.g. from headers)
    pub child_requests: Vec<ChildRequest>,
    /// Absolute target of a redirect response
    pub redirect_location: Option<String>,
}

impl ResponseData {
    pub fn new(url: impl Into<String>, method: Method, status_code: u16) -> Self {
        Self {
            url: url.into(),
            method,
            status_code,
            ..Default::default()
        }
    }

    /// Sets the body and its length
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.content_length = self.body.len() as u64;
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn is_html(&self) -> bool {
        self.mime_type
            .as_deref()
            .map_or(false, |mime| mime.eq_ignore_ascii_case("text/html"))
    }
}

/// Everything a fetch attempt can produce other than a retryable failure
#[derive(Debug)]
pub enum FetchOutcome {
    /// The resource itself
    Document(ResponseData),

    /// The resource is a container; only its children should be crawled
    ChildExpansion {
        url: String,
        children: Vec<ChildRequest>,
    },

    /// The resource exceeds the client's size limit
    TooLarge { url: String, size: u64, limit: u64 },
}

/// A protocol-specific fetcher
#[async_trait]
pub trait FetchClient: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError>;
}

/// Splits a `Content-Type` value into lowercase mime type and charset
pub fn parse_content_type(value: &str) -> (Option<String>, Option<String>) {
    let mut parts = value.split(';');
    let mime = parts
        .next()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty());
    let charset = parts.find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"').to_ascii_lowercase())
        } else {
            None
        }
    });
    (mime, charset)
}
