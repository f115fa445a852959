use super::note::NoteMetadata;
use crate::error::PipelineError;
use crate::models::{
    EnrichmentData, GeneratedContent, GroundingVerdict, KnowledgeType, StandardizedConcept,
};
use crate::state_machine::{PipelineStage, WorkflowKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A note taking part in a merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRef {
    pub node_id: String,
    pub path: String,
    pub name: String,
}

/// Input of [`start_merge_pipeline`](super::PipelineOrchestrator::start_merge_pipeline)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Duplicate-pair record that triggered the merge
    pub pair_id: String,
    /// Note that keeps its identity and receives the merged content
    pub survivor: NoteRef,
    /// Note that is deleted after the merge
    pub superseded: NoteRef,
    pub knowledge_type: KnowledgeType,
}

/// Merge-only state carried on the context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDetails {
    pub pair_id: String,
    pub superseded: NoteRef,
    pub superseded_content: String,
    #[serde(default)]
    pub superseded_snapshot_id: Option<String>,
}

/// In-flight (or finished) pipeline state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineContext {
    pub id: String,
    /// Entity id of the note being produced or changed
    pub node_id: String,
    pub kind: WorkflowKind,
    pub knowledge_type: KnowledgeType,
    pub stage: PipelineStage,
    pub user_input: String,
    /// Frontmatter the note will be written with
    pub metadata: NoteMetadata,
    pub standardized: Option<StandardizedConcept>,
    pub enrichment: Option<EnrichmentData>,
    pub embedding: Option<Vec<f32>>,
    pub generated: Option<GeneratedContent>,
    pub grounding: Option<GroundingVerdict>,
    /// Content on disk before the write, for the diff preview
    pub before_content: Option<String>,
    /// Content that `confirm_write` will write
    pub after_content: Option<String>,
    pub file_path: String,
    pub snapshot_id: Option<String>,
    pub error: Option<PipelineError>,
    /// Stage the pipeline was in when it failed
    pub failed_stage: Option<PipelineStage>,
    /// User instruction of an incremental improvement
    pub instruction: Option<String>,
    pub merge: Option<MergeDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineContext {
    pub fn new(
        id: String,
        kind: WorkflowKind,
        metadata: NoteMetadata,
        file_path: String,
        user_input: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            node_id: metadata.uid.clone(),
            kind,
            knowledge_type: metadata.note_type,
            stage: PipelineStage::Idle,
            user_input,
            metadata,
            standardized: None,
            enrichment: None,
            embedding: None,
            generated: None,
            grounding: None,
            before_content: None,
            after_content: None,
            file_path,
            snapshot_id: None,
            error: None,
            failed_stage: None,
            instruction: None,
            merge: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Completed and Failed pipelines stay queryable but are no longer active
    pub fn is_active(&self) -> bool {
        !self.stage.is_terminal()
    }
}
