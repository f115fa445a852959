use serde::{Deserialize, Serialize};
use std::fmt;

/// Queue task state definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for the scheduler to grant its locks
    #[default]
    Pending,
    /// Locks held, runner executing
    Running,
    /// Runner succeeded, result merged into the payload
    Completed,
    /// Runner failed and no retry is scheduled
    Failed,
    /// Cancelled by a caller
    Cancelled,
}

impl TaskState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Pending or Running: the task still occupies its entity
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// States that count toward history trimming
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

/// Workflow kind of a pipeline; decides the write routine and snapshot policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowKind {
    Create,
    IncrementalImprove,
    Merge,
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::IncrementalImprove => write!(f, "incremental-improve"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

/// Pipeline stage definitions, shared by all workflow kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStage {
    #[default]
    Idle,
    Standardizing,
    Enriching,
    Embedding,
    AwaitingCreateConfirm,
    Reasoning,
    Grounding,
    AwaitingWriteConfirm,
    Writing,
    Deduplicating,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Standardizing => "standardizing",
            Self::Enriching => "enriching",
            Self::Embedding => "embedding",
            Self::AwaitingCreateConfirm => "awaiting-create-confirm",
            Self::Reasoning => "reasoning",
            Self::Grounding => "grounding",
            Self::AwaitingWriteConfirm => "awaiting-write-confirm",
            Self::Writing => "writing",
            Self::Deduplicating => "deduplicating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_terminal_check() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(!TaskState::Failed.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(TaskState::Running.is_active());
        assert!(!TaskState::Failed.is_active());
    }

    #[test]
    fn test_state_string_conversion() {
        assert_eq!(TaskState::Running.to_string(), "running");
        assert_eq!("failed".parse::<TaskState>().unwrap(), TaskState::Failed);
        assert!("bogus".parse::<TaskState>().is_err());
    }

    #[test]
    fn test_stage_serde_matches_display() {
        let json = serde_json::to_string(&PipelineStage::AwaitingWriteConfirm).unwrap();
        assert_eq!(json, "\"awaiting-write-confirm\"");
        assert_eq!(
            PipelineStage::AwaitingWriteConfirm.to_string(),
            "awaiting-write-confirm"
        );
        let kind = serde_json::to_string(&WorkflowKind::IncrementalImprove).unwrap();
        assert_eq!(kind, "\"incremental-improve\"");
    }
}
