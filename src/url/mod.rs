//! URL handling module for driftnet
//!
//! This module provides the include/exclude scope filter sessions are gated by,
//! and the normalization applied to every discovered link.

mod filter;
mod normalize;

// Re-export main types
pub use filter::{validate_template, ScopeFilter};
pub use normalize::normalize_url;

/// Returns true if a URL is empty or whitespace only
pub fn is_blank(url: &str) -> bool {
    url.trim().is_empty()
}
