//! Integration tests for driftnet
//!
//! These tests use wiremock to create mock HTTP servers and tempfile for
//! on-disk databases and directory trees, and drive full sessions end-to-end.

mod common;
mod crawl_tests;
mod fetch_tests;
mod filesystem_tests;
mod robots_tests;
mod session_tests;
