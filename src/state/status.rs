/// Session lifecycle states
///
/// A session only ever moves forward through these states.
use std::fmt;

/// Represents where a crawl session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionStatus {
    /// Session has been created but no worker is running yet
    Initialized,

    /// Workers are draining the frontier
    Running,

    /// No new work will be taken; workers are winding down
    Finishing,

    /// All workers exited and the frontier has been saved
    Done,
}

impl SessionStatus {
    /// Returns true if workers should keep taking new entries
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true once the session can no longer make progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Finishing => "finishing",
            Self::Done => "done",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "initialized" => Some(Self::Initialized),
            "running" => Some(Self::Running),
            "finishing" => Some(Self::Finishing),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Initialized,
            1 => Self::Running,
            2 => Self::Finishing,
            _ => Self::Done,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
