//! Write confirmation: the kind-specific write routines and the duplicate pass.

use super::PipelineOrchestrator;
use crate::error::{PipelineError, Result};
use crate::logging::log_pipeline_operation;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::events::PipelineEvent;
use crate::ports::VectorEntry;
use crate::state_machine::{PipelineStage, WorkflowKind};
use chrono::Utc;
use tracing::{info, instrument, warn};

impl PipelineOrchestrator {
    /// Write the confirmed content. Legal only at `awaiting-write-confirm`.
    ///
    /// Returns the undo snapshot id; create pipelines take none since nothing
    /// pre-existed. A failed write leaves the pipeline Failed with the error,
    /// from where [`update_generated_content`](Self::update_generated_content)
    /// can re-enter confirmation. If the pipeline is cancelled while writing,
    /// the written note stays on disk and the cancellation error is returned.
    #[instrument(skip(self))]
    pub async fn confirm_write(&self, pipeline_id: &str) -> Result<Option<String>> {
        self.require_stage(pipeline_id, PipelineStage::AwaitingWriteConfirm)?;
        let context = self.transition(pipeline_id, PipelineStage::Writing)?;

        let written = match context.kind {
            WorkflowKind::Create => self.write_create(&context).await,
            WorkflowKind::IncrementalImprove => self.write_incremental(&context).await,
            WorkflowKind::Merge => self.write_merge(&context).await,
        };
        let (snapshot_id, note) = self.fail_on_err(pipeline_id, written)?;
        self.ensure_active(pipeline_id, "write")?;

        self.update(pipeline_id, |ctx| {
            ctx.snapshot_id = snapshot_id.clone();
            ctx.after_content = Some(note);
        })?;
        log_pipeline_operation(
            "write",
            pipeline_id,
            &context.node_id,
            &PipelineStage::Writing.to_string(),
            Some(&context.file_path),
        );

        self.transition(pipeline_id, PipelineStage::Deduplicating)?;
        self.detect_duplicates(&context).await;
        self.ensure_active(pipeline_id, "duplicate detection")?;

        let completed = self.transition(pipeline_id, PipelineStage::Completed)?;
        info!(
            pipeline_id,
            node_id = %completed.node_id,
            kind = %completed.kind,
            snapshot_id = ?snapshot_id,
            "🎯 ORCHESTRATOR: Pipeline completed"
        );
        self.events.publish(PipelineEvent::PipelineCompleted {
            context: completed,
            snapshot_id: snapshot_id.clone(),
        });
        Ok(snapshot_id)
    }

    /// Render the final note and write it atomically; returns the written text
    async fn write_note(&self, context: &PipelineContext) -> Result<String> {
        let content = context
            .generated
            .as_ref()
            .ok_or_else(|| PipelineError::missing_artifact(&context.id, "generated content"))?;
        let note = self.render_draft(context, content)?;
        self.storage.atomic_write(&context.file_path, &note).await?;
        Ok(note)
    }

    async fn upsert_vector(&self, context: &PipelineContext) -> Result<()> {
        let embedding = context
            .embedding
            .clone()
            .ok_or_else(|| PipelineError::missing_artifact(&context.id, "embedding"))?;
        self.vectors
            .upsert(VectorEntry {
                node_id: context.node_id.clone(),
                path: context.file_path.clone(),
                embedding,
                updated_at: Utc::now(),
            })
            .await
    }

    async fn write_create(&self, context: &PipelineContext) -> Result<(Option<String>, String)> {
        if context.embedding.is_none() {
            return Err(PipelineError::missing_artifact(&context.id, "embedding"));
        }
        let note = self.write_note(context).await?;
        self.upsert_vector(context).await?;
        Ok((None, note))
    }

    async fn write_incremental(
        &self,
        context: &PipelineContext,
    ) -> Result<(Option<String>, String)> {
        let previous = context
            .before_content
            .as_deref()
            .ok_or_else(|| PipelineError::missing_artifact(&context.id, "previous content"))?;
        let snapshot_id = self
            .undo
            .create_snapshot(&context.file_path, previous, &context.id, &context.node_id)
            .await?;

        // The existing vector entry stays in place for re-detection
        let note = self.write_note(context).await?;
        Ok((Some(snapshot_id), note))
    }

    async fn write_merge(&self, context: &PipelineContext) -> Result<(Option<String>, String)> {
        let merge = context
            .merge
            .as_ref()
            .ok_or_else(|| PipelineError::missing_artifact(&context.id, "merge details"))?;
        let previous = context
            .before_content
            .as_deref()
            .ok_or_else(|| PipelineError::missing_artifact(&context.id, "survivor content"))?;

        let snapshot_id = self
            .undo
            .create_snapshot(&context.file_path, previous, &context.id, &context.node_id)
            .await?;
        let superseded_snapshot_id = self
            .undo
            .create_snapshot(
                &merge.superseded.path,
                &merge.superseded_content,
                &context.id,
                &merge.superseded.node_id,
            )
            .await?;
        self.update(&context.id, |ctx| {
            if let Some(details) = ctx.merge.as_mut() {
                details.superseded_snapshot_id = Some(superseded_snapshot_id);
            }
        })?;

        let note = self.write_note(context).await?;
        self.storage.delete(&merge.superseded.path).await?;
        self.vectors.delete(&merge.superseded.node_id).await?;
        self.upsert_vector(context).await?;

        if let Err(e) = self.duplicates.remove_pair(&merge.pair_id).await {
            warn!(
                pipeline_id = %context.id,
                pair_id = %merge.pair_id,
                error = %e,
                "Could not clear the merged duplicate pair"
            );
        }
        Ok((Some(snapshot_id), note))
    }

    /// Re-run similarity detection for the written note, against the fresh
    /// embedding or else the note's existing vector entry. The write is
    /// already durable, so failures here are logged and do not fail the
    /// pipeline.
    async fn detect_duplicates(&self, context: &PipelineContext) {
        let embedding = match &context.embedding {
            Some(embedding) => Some(embedding.clone()),
            None => match self.vectors.get_entry(&context.node_id).await {
                Ok(entry) => entry.map(|e| e.embedding),
                Err(e) => {
                    warn!(pipeline_id = %context.id, error = %e, "Vector lookup failed");
                    None
                }
            },
        };
        let Some(embedding) = embedding else {
            warn!(pipeline_id = %context.id, "No embedding available for duplicate detection");
            return;
        };

        match self.duplicates.detect(&context.node_id, &embedding).await {
            Ok(pairs) => info!(
                pipeline_id = %context.id,
                node_id = %context.node_id,
                duplicates = pairs.len(),
                "Duplicate detection finished"
            ),
            Err(e) => warn!(
                pipeline_id = %context.id,
                error_code = %e.code,
                error = %e.message,
                "Duplicate detection failed after write"
            ),
        }
    }
}
