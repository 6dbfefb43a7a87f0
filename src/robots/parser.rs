//! Robots.txt rules
//!
//! Matching is delegated to the robotstxt crate.

use robotstxt::DefaultMatcher;

/// Rules of one host's robots.txt
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    /// Raw robots.txt content (empty means allow all)
    content: String,
}

impl RobotsRules {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Rules for hosts without a usable robots.txt
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path (e.g., "/page.html")
    /// * `user_agent` - Product token of the crawler (e.g., "driftnet")
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }
}
