//! Response transformers
//!
//! A transformer turns a fetched document into the bytes stored with its
//! access result, plus the child requests discovered in it.

use crate::crawler::client::{ChildRequest, ResponseData};
use crate::url::normalize_url;
use indexmap::IndexSet;
use scraper::{Html, Selector};
use url::Url;

/// Name recorded for results that were not transformed
pub const NO_TRANSFORMER: &str = "none";

/// Output of a transformer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutput {
    pub data: Vec<u8>,
    pub encoding: Option<String>,
    pub children: Vec<ChildRequest>,
    pub transformer: String,
}

impl TransformOutput {
    /// Output recorded for a resource that has not changed since the last crawl
    pub fn unchanged() -> Self {
        Self {
            transformer: NO_TRANSFORMER.to_string(),
            ..Default::default()
        }
    }
}

pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    fn transform(&self, response: &ResponseData) -> crate::Result<TransformOutput>;
}

/// Stores the body as-is and extracts links from HTML documents
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlTransformer;

impl Transformer for HtmlTransformer {
    fn name(&self) -> &str {
        "html"
    }

    fn transform(&self, response: &ResponseData) -> crate::Result<TransformOutput> {
        let children = if response.is_html() {
            let base_url = Url::parse(&response.url)?;
            let html = String::from_utf8_lossy(&response.body);
            parse_html(&html, &base_url)
                .links
                .into_iter()
                .map(ChildRequest::get)
                .collect()
        } else {
            Vec::new()
        };

        Ok(TransformOutput {
            data: response.body.clone(),
            encoding: response.charset.clone(),
            children,
            transformer: self.name().to_string(),
        })
    }
}

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// Distinct normalized links in document order
    pub links: Vec<String>,
}

/// Parses HTML content and extracts its links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - Fragment-only links
/// - Anything that does not normalize to an http, https or file URL
///   (`javascript:`, `mailto:`, `tel:`, data URIs)
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `base_url` - The base URL for resolving relative links
///
/// # Example
///
/// ```
/// use driftnet::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        links: extract_links(&document, base_url),
    }
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = IndexSet::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(link) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                links.insert(link);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(link) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                links.insert(link);
            }
        }
    }

    links.into_iter().collect()
}

fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_url(absolute.as_str()).ok().map(|url| url.to_string())
}
