//! In-memory fetch client over a fixed link graph

use crate::crawler::client::{FetchClient, FetchOutcome, FetchRequest, ResponseData};
use crate::storage::Method;
use crate::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub(crate) struct GraphClient {
    pages: HashMap<String, Vec<String>>,
    last_modified: HashMap<String, DateTime<Utc>>,
    redirects: HashMap<String, String>,
    texts: HashMap<String, String>,
    calls: Mutex<Vec<(Method, String)>>,
}

impl GraphClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page(mut self, url: &str, links: &[&str]) -> Self {
        self.pages
            .insert(url.to_string(), links.iter().map(|l| l.to_string()).collect());
        self
    }

    pub(crate) fn with_last_modified(mut self, url: &str, ts: DateTime<Utc>) -> Self {
        self.last_modified.insert(url.to_string(), ts);
        self
    }

    pub(crate) fn with_redirect(mut self, url: &str, location: &str) -> Self {
        self.redirects.insert(url.to_string(), location.to_string());
        self
    }

    pub(crate) fn with_text(mut self, url: &str, body: &str) -> Self {
        self.texts.insert(url.to_string(), body.to_string());
        self
    }

    pub(crate) fn calls(&self, method: Method, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, u)| *m == method && u == url)
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl FetchClient for GraphClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.method, request.url.clone()));

        if let Some(location) = self.redirects.get(&request.url) {
            let mut data = ResponseData::new(&request.url, request.method, 302);
            data.redirect_location = Some(location.clone());
            return Ok(FetchOutcome::Document(data));
        }
        if let Some(text) = self.texts.get(&request.url) {
            let data = ResponseData::new(&request.url, request.method, 200)
                .with_mime_type("text/plain")
                .with_body(text.as_str());
            return Ok(FetchOutcome::Document(data));
        }

        let Some(links) = self.pages.get(&request.url) else {
            return Ok(FetchOutcome::Document(ResponseData::new(
                &request.url,
                request.method,
                404,
            )));
        };

        let body: String = links
            .iter()
            .map(|link| format!(r#"<a href="{}">{}</a>"#, link, link))
            .collect();
        let mut data = ResponseData::new(&request.url, request.method, 200).with_mime_type("text/html");
        if request.method == Method::Get {
            data = data.with_body(format!("<html><body>{}</body></html>", body));
        }
        data.last_modified = self.last_modified.get(&request.url).copied();
        Ok(FetchOutcome::Document(data))
    }
}
