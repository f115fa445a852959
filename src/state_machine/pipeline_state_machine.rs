use super::states::{PipelineStage, WorkflowKind};
use crate::constants::codes;
use crate::error::{PipelineError, Result};

/// Directed stage paths per workflow kind
///
/// ```text
/// create:      idle → standardizing → enriching → awaiting-create-confirm → reasoning
///              idle → enriching
/// all kinds:   idle → reasoning                     (incremental, merge)
///              reasoning → embedding → [grounding →] awaiting-write-confirm
///              reasoning → [grounding →] awaiting-write-confirm   (incremental)
///              awaiting-write-confirm → writing → deduplicating → completed
/// any non-terminal stage → failed
/// ```
///
/// The one backwards edge, `failed → awaiting-write-confirm`, is not part of
/// the table: it is only reachable through [`reenter_write`](Self::reenter_write).
pub struct PipelineStateMachine;

impl PipelineStateMachine {
    pub fn can_transition(kind: WorkflowKind, from: PipelineStage, to: PipelineStage) -> bool {
        use PipelineStage as S;

        if to == S::Failed {
            return !from.is_terminal();
        }

        match (from, to) {
            (S::Idle, S::Standardizing)
            | (S::Standardizing, S::Enriching)
            | (S::Idle, S::Enriching)
            | (S::Enriching, S::AwaitingCreateConfirm)
            | (S::AwaitingCreateConfirm, S::Reasoning) => kind == WorkflowKind::Create,

            (S::Idle, S::Reasoning) => kind != WorkflowKind::Create,

            (S::Reasoning, S::Grounding) | (S::Reasoning, S::AwaitingWriteConfirm) => {
                kind == WorkflowKind::IncrementalImprove
            }

            (S::Reasoning, S::Embedding)
            | (S::Embedding, S::Grounding)
            | (S::Embedding, S::AwaitingWriteConfirm)
            | (S::Grounding, S::AwaitingWriteConfirm)
            | (S::AwaitingWriteConfirm, S::Writing)
            | (S::Writing, S::Deduplicating)
            | (S::Deduplicating, S::Completed) => true,

            _ => false,
        }
    }

    /// Validate `from → to` for `kind`, returning the new stage
    pub fn transition(
        kind: WorkflowKind,
        from: PipelineStage,
        to: PipelineStage,
    ) -> Result<PipelineStage> {
        if Self::can_transition(kind, from, to) {
            Ok(to)
        } else {
            Err(PipelineError::new(
                codes::INVALID_STAGE,
                format!("Illegal {kind} pipeline transition {from} → {to}"),
            ))
        }
    }

    /// Re-enter write confirmation after corrected content. Only a pipeline
    /// whose write failed qualifies; a cancelled pipeline stays failed.
    pub fn reenter_write(
        from: PipelineStage,
        failed_stage: Option<PipelineStage>,
        error: Option<&PipelineError>,
    ) -> Result<PipelineStage> {
        if from != PipelineStage::Failed || failed_stage != Some(PipelineStage::Writing) {
            return Err(PipelineError::new(
                codes::INVALID_STAGE,
                format!("Cannot re-enter write confirmation from {from}"),
            ));
        }
        if error.is_some_and(|e| e.code == codes::USER_CANCELLED) {
            return Err(PipelineError::new(
                codes::INVALID_STAGE,
                "Pipeline was cancelled while writing and cannot be resumed",
            ));
        }
        Ok(PipelineStage::AwaitingWriteConfirm)
    }
}
