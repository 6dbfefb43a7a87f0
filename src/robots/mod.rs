//! Robots.txt handling module
//!
//! Fetches, parses and caches robots.txt per host so workers can skip
//! disallowed URLs.

mod cache;
mod parser;

pub use cache::{CachedRules, RobotsCache};
pub use parser::RobotsRules;
