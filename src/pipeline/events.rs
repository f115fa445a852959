use super::context::PipelineContext;
use crate::error::PipelineError;
use crate::state_machine::PipelineStage;
use serde::{Deserialize, Serialize};

/// Which confirmation gate a pipeline is waiting at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationKind {
    Create,
    Write,
}

/// Event published by the orchestrator; every variant carries the full context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    StageChanged {
        context: PipelineContext,
        from: PipelineStage,
        to: PipelineStage,
    },
    ConfirmationRequired {
        context: PipelineContext,
        kind: ConfirmationKind,
    },
    PipelineCompleted {
        context: PipelineContext,
        snapshot_id: Option<String>,
    },
    PipelineFailed {
        context: PipelineContext,
        error: PipelineError,
    },
}

impl PipelineEvent {
    pub fn context(&self) -> &PipelineContext {
        match self {
            Self::StageChanged { context, .. }
            | Self::ConfirmationRequired { context, .. }
            | Self::PipelineCompleted { context, .. }
            | Self::PipelineFailed { context, .. } => context,
        }
    }

    pub fn pipeline_id(&self) -> &str {
        &self.context().id
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StageChanged { .. } => "stage_changed",
            Self::ConfirmationRequired { .. } => "confirmation_required",
            Self::PipelineCompleted { .. } => "pipeline_completed",
            Self::PipelineFailed { .. } => "pipeline_failed",
        }
    }
}
