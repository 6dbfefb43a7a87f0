//! HTTP fetch client
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent string
//! - GET and HEAD requests
//! - Surfacing redirects as responses so their targets become children
//! - Enforcing the maximum content length
//! - Error classification

use crate::config::HttpConfig;
use crate::crawler::client::{parse_content_type, FetchClient, FetchOutcome, FetchRequest, ResponseData};
use crate::storage::Method;
use crate::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_TYPE, LAST_MODIFIED, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::time::{Duration, Instant};
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use driftnet::config::HttpConfig;
/// use driftnet::crawler::build_http_client;
///
/// let client = build_http_client(&HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout))
        .connect_timeout(Duration::from_secs(config.timeout.min(10)))
        .redirect(Policy::none()) // Redirect targets are crawled as children
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetch client for `http` and `https` URLs
pub struct HttpClient {
    client: Client,
    max_content_length: u64,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> crate::Result<Self> {
        let client = build_http_client(config).map_err(|e| FetchError::Http {
            url: String::new(),
            source: e,
        })?;
        Ok(Self::with_client(client, config.max_content_length))
    }

    pub fn with_client(client: Client, max_content_length: u64) -> Self {
        Self {
            client,
            max_content_length,
        }
    }
}

#[async_trait]
impl FetchClient for HttpClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let started = Instant::now();
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Head => self.client.head(&request.url),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| classify_error(&request.url, e))?;

        let status = response.status();
        let headers = response.headers();

        let (mime_type, charset) = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(parse_content_type)
            .unwrap_or((None, None));

        let last_modified = headers
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);

        let mut data = ResponseData::new(&request.url, request.method, status.as_u16());
        data.mime_type = mime_type;
        data.charset = charset;
        data.last_modified = last_modified;

        if status.is_redirection() {
            data.redirect_location = headers
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| resolve_location(&request.url, location));
            data.execution_time = started.elapsed();
            return Ok(FetchOutcome::Document(data));
        }

        if request.method == Method::Head {
            data.content_length = response.content_length().unwrap_or(0);
            data.execution_time = started.elapsed();
            return Ok(FetchOutcome::Document(data));
        }

        if let Some(size) = response.content_length() {
            if size > self.max_content_length {
                return Ok(FetchOutcome::TooLarge {
                    url: request.url.clone(),
                    size,
                    limit: self.max_content_length,
                });
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(&request.url, e))?;

        if body.len() as u64 > self.max_content_length {
            return Ok(FetchOutcome::TooLarge {
                url: request.url.clone(),
                size: body.len() as u64,
                limit: self.max_content_length,
            });
        }

        let mut data = data.with_body(body.to_vec());
        data.execution_time = started.elapsed();
        Ok(FetchOutcome::Document(data))
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

/// Parses an RFC 7231 date such as `Wed, 21 Oct 2015 07:28:00 GMT`
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn resolve_location(base: &str, location: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(location.trim()).ok().map(|url| url.to_string())
}
