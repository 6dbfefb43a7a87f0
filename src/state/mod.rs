//! State module for tracking crawl sessions
//!
//! # Components
//!
//! - `SessionStatus`: Lifecycle of a crawl session (initialized, running, finishing, done)
//! - `Session`: Shared per-session counters and limits, guarded by the session mutex
//! - `CrawlLimits`: Access-count, depth and worker limits of a session

mod session;
mod status;

// Re-export main types
pub use session::{generate_session_id, CrawlLimits, Session, SessionCounters};
pub use status::SessionStatus;
