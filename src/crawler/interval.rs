//! Worker pacing

use crate::config::IntervalConfig;
use std::time::Duration;

/// Points in the worker loop where a pause may be taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalKind {
    BeforeProcessing,
    AfterProcessing,
    NoUrlInQueue,
    WaitingNewUrl,
}

/// Fixed delays applied by workers between steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalController {
    pub before_processing: Duration,
    pub after_processing: Duration,
    pub no_url_in_queue: Duration,
    pub waiting_new_url: Duration,
}

impl Default for IntervalController {
    fn default() -> Self {
        Self::from(&IntervalConfig::default())
    }
}

impl From<&IntervalConfig> for IntervalController {
    fn from(config: &IntervalConfig) -> Self {
        Self {
            before_processing: Duration::from_millis(config.before_processing),
            after_processing: Duration::from_millis(config.after_processing),
            no_url_in_queue: Duration::from_millis(config.no_url_in_queue),
            waiting_new_url: Duration::from_millis(config.waiting_new_url),
        }
    }
}

impl IntervalController {
    /// A controller that never waits
    pub fn none() -> Self {
        Self {
            before_processing: Duration::ZERO,
            after_processing: Duration::ZERO,
            no_url_in_queue: Duration::ZERO,
            waiting_new_url: Duration::ZERO,
        }
    }

    pub fn duration(&self, kind: IntervalKind) -> Duration {
        match kind {
            IntervalKind::BeforeProcessing => self.before_processing,
            IntervalKind::AfterProcessing => self.after_processing,
            IntervalKind::NoUrlInQueue => self.no_url_in_queue,
            IntervalKind::WaitingNewUrl => self.waiting_new_url,
        }
    }

    pub async fn delay(&self, kind: IntervalKind) {
        let duration = self.duration(kind);
        if duration.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(duration).await;
        }
    }
}
