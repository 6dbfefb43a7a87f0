//! Output module for reporting on crawl sessions

pub mod stats;

pub use stats::{load_statistics, print_statistics, SessionStatistics};
