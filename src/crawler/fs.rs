//! Local filesystem fetch client for `file://` URLs

use crate::crawler::client::{ChildRequest, FetchClient, FetchOutcome, FetchRequest, ResponseData};
use crate::storage::Method;
use crate::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Instant;
use url::Url;

/// Reads files and expands directories into their entries
pub struct FileSystemClient {
    max_content_length: u64,
}

impl FileSystemClient {
    pub fn new(max_content_length: u64) -> Self {
        Self { max_content_length }
    }

    async fn expand_directory(&self, url: &str, path: &Path) -> Result<FetchOutcome, FetchError> {
        let io_error = |source| FetchError::Io {
            url: url.to_string(),
            source,
        };

        let mut children = Vec::new();
        let mut dir = tokio::fs::read_dir(path).await.map_err(io_error)?;
        while let Some(entry) = dir.next_entry().await.map_err(io_error)? {
            let child_path = entry.path();
            let is_dir = entry.file_type().await.map_err(io_error)?.is_dir();
            let child_url = if is_dir {
                Url::from_directory_path(&child_path)
            } else {
                Url::from_file_path(&child_path)
            };
            match child_url {
                Ok(child_url) => children.push(ChildRequest::get(child_url.to_string())),
                Err(()) => tracing::warn!("Skipping unrepresentable path {}", child_path.display()),
            }
        }
        children.sort_by(|a, b| a.url.cmp(&b.url));

        Ok(FetchOutcome::ChildExpansion {
            url: url.to_string(),
            children,
        })
    }
}

#[async_trait]
impl FetchClient for FileSystemClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        let started = Instant::now();
        let url = Url::parse(&request.url).map_err(|e| FetchError::Client {
            url: request.url.clone(),
            message: e.to_string(),
        })?;
        if url.scheme() != "file" {
            return Err(FetchError::Unsupported {
                url: request.url.clone(),
            });
        }
        let path = url.to_file_path().map_err(|_| FetchError::Client {
            url: request.url.clone(),
            message: "not a local path".to_string(),
        })?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(FetchOutcome::Document(ResponseData::new(
                    &request.url,
                    request.method,
                    404,
                )));
            }
            Err(source) => {
                return Err(FetchError::Io {
                    url: request.url.clone(),
                    source,
                })
            }
        };

        if metadata.is_dir() {
            return self.expand_directory(&request.url, &path).await;
        }

        if metadata.len() > self.max_content_length {
            return Ok(FetchOutcome::TooLarge {
                url: request.url.clone(),
                size: metadata.len(),
                limit: self.max_content_length,
            });
        }

        let mut data = ResponseData::new(&request.url, request.method, 200)
            .with_mime_type(guess_mime_type(&path));
        data.last_modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        if request.method == Method::Get {
            let body = tokio::fs::read(&path).await.map_err(|source| FetchError::Io {
                url: request.url.clone(),
                source,
            })?;
            data = data.with_body(body);
        } else {
            data.content_length = metadata.len();
        }
        data.execution_time = started.elapsed();

        Ok(FetchOutcome::Document(data))
    }
}

fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("txt") | Some("md") => "text/plain",
        Some("xml") => "application/xml",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
