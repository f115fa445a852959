use crate::models::TaskRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueEventKind {
    TaskAdded,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskCancelled,
    TaskRetrying,
    QueuePaused,
    QueueResumed,
}

impl fmt::Display for QueueEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TaskAdded => "task-added",
            Self::TaskStarted => "task-started",
            Self::TaskCompleted => "task-completed",
            Self::TaskFailed => "task-failed",
            Self::TaskCancelled => "task-cancelled",
            Self::TaskRetrying => "task-retrying",
            Self::QueuePaused => "queue-paused",
            Self::QueueResumed => "queue-resumed",
        };
        write!(f, "{name}")
    }
}

/// Event published by the task queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub kind: QueueEventKind,
    pub task_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Record as of the transition; survives history trimming
    pub task: Option<TaskRecord>,
}

impl QueueEvent {
    pub fn for_task(kind: QueueEventKind, task: &TaskRecord) -> Self {
        Self {
            kind,
            task_id: Some(task.id.clone()),
            timestamp: Utc::now(),
            task: Some(task.clone()),
        }
    }

    pub fn queue(kind: QueueEventKind) -> Self {
        Self {
            kind,
            task_id: None,
            timestamp: Utc::now(),
            task: None,
        }
    }
}
