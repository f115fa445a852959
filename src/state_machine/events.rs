use serde::{Deserialize, Serialize};

/// Events that can trigger task state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEvent {
    /// Scheduler granted the locks
    Start,
    /// Runner succeeded
    Complete,
    /// Retryable failure under budget with auto-retry on
    Requeue,
    /// Failure with no retry scheduled
    Fail,
    /// Caller cancellation
    Cancel,
    /// Manual retry of a failed task
    Retry,
    /// Startup recovery of a task persisted while running
    Recover,
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Requeue => "requeue",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
            Self::Retry => "retry",
            Self::Recover => "recover",
        }
    }
}
