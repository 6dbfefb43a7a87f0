//! Classifies fetched documents and runs the transformer on them

use crate::config::HttpConfig;
use crate::crawler::client::ResponseData;
use crate::crawler::transformer::{HtmlTransformer, TransformOutput, Transformer};
use std::sync::Arc;

/// How a fetched document is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// Unchanged since the previous crawl; stored without transformation
    NotModified,
    /// Transformed and stored
    Successful,
    /// Dropped
    Ignored,
}

/// Applies the configured status-code sets to fetched documents
pub struct ResponseProcessor {
    successful_codes: Vec<u16>,
    not_modified_codes: Vec<u16>,
    transformer: Arc<dyn Transformer>,
}

impl Default for ResponseProcessor {
    fn default() -> Self {
        Self::new(vec![200], vec![304], Arc::new(HtmlTransformer))
    }
}

impl ResponseProcessor {
    pub fn new(
        successful_codes: Vec<u16>,
        not_modified_codes: Vec<u16>,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        Self {
            successful_codes,
            not_modified_codes,
            transformer,
        }
    }

    pub fn from_config(config: &HttpConfig) -> Self {
        Self::new(
            config.successful_status_codes.clone(),
            config.not_modified_status_codes.clone(),
            Arc::new(HtmlTransformer),
        )
    }

    pub fn classify(&self, response: &ResponseData) -> ResponseClass {
        if self.not_modified_codes.contains(&response.status_code) {
            ResponseClass::NotModified
        } else if self.successful_codes.contains(&response.status_code) {
            ResponseClass::Successful
        } else {
            ResponseClass::Ignored
        }
    }

    /// Status code used when a freshness check finds a resource unchanged
    pub fn not_modified_code(&self) -> u16 {
        self.not_modified_codes.first().copied().unwrap_or(304)
    }

    /// Produces the data to store for a response
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The response is ignored
    pub fn process(&self, response: &ResponseData) -> crate::Result<Option<TransformOutput>> {
        match self.classify(response) {
            ResponseClass::NotModified => Ok(Some(TransformOutput::unchanged())),
            ResponseClass::Successful => self.transformer.transform(response).map(Some),
            ResponseClass::Ignored => Ok(None),
        }
    }
}
