//! Queue-event driven stage advancement.

use super::PipelineOrchestrator;
use crate::error::{PipelineError, Result};
use crate::models::{
    EnrichmentData, GeneratedContent, GroundingVerdict, NewTask, TaskRecord, TaskWork,
};
use crate::queue::{QueueEvent, QueueEventKind};
use crate::state_machine::{PipelineStage, WorkflowKind};
use tracing::{debug, info, warn};

impl PipelineOrchestrator {
    /// Advance the pipeline owning the event's task. Completions dispatch on
    /// the task type; failures fail the pipeline with the task's last error.
    pub async fn handle_queue_event(&self, event: QueueEvent) {
        let Some(task) = event.task else {
            return;
        };
        let Some(pipeline_id) = task.pipeline_id().map(str::to_string) else {
            return;
        };

        let active = self
            .pipelines
            .lock()
            .get(&pipeline_id)
            .map(|p| p.is_active());
        match active {
            None => {
                debug!(pipeline_id = %pipeline_id, task_id = %task.id, "Queue event for an unknown pipeline");
                return;
            }
            Some(false) => {
                debug!(pipeline_id = %pipeline_id, task_id = %task.id, kind = %event.kind, "Ignoring event for a finished pipeline");
                return;
            }
            Some(true) => {}
        }

        match event.kind {
            QueueEventKind::TaskCompleted => {
                if let Err(e) = self.on_task_completed(&pipeline_id, task).await {
                    self.fail(&pipeline_id, e);
                }
            }
            QueueEventKind::TaskFailed => {
                self.fail(&pipeline_id, task.failure());
            }
            QueueEventKind::TaskRetrying => {
                debug!(pipeline_id = %pipeline_id, task_id = %task.id, attempt = task.attempt, "Pipeline task will be retried");
            }
            _ => {}
        }
    }

    async fn on_task_completed(&self, pipeline_id: &str, task: TaskRecord) -> Result<()> {
        match task.payload.work {
            TaskWork::Enrich {
                result: Some(enrichment),
                ..
            } => self.on_enriched(pipeline_id, enrichment).await,
            TaskWork::Generate {
                result: Some(content),
                ..
            } => self.on_generated(pipeline_id, content).await,
            TaskWork::FactCheck {
                result: Some(verdict),
                ..
            } => self.on_fact_checked(pipeline_id, verdict),
            other => Err(PipelineError::missing_artifact(
                pipeline_id,
                &format!("the {} result", other.task_type()),
            )),
        }
    }

    async fn on_enriched(&self, pipeline_id: &str, enrichment: EnrichmentData) -> Result<()> {
        self.update(pipeline_id, |ctx| {
            ctx.metadata.merge_aliases(&enrichment.aliases);
            ctx.metadata.merge_tags(&enrichment.tags);
            ctx.enrichment = Some(enrichment);
        })?;
        self.transition(pipeline_id, PipelineStage::AwaitingCreateConfirm)?;

        if self.config.auto_confirm_create {
            self.confirm_create(pipeline_id).await?;
        }
        Ok(())
    }

    /// Store content, embed it directly, then fact-check or go to write
    /// confirmation. Incremental pipelines keep the note's existing vector
    /// entry and skip the embed call.
    async fn on_generated(&self, pipeline_id: &str, content: GeneratedContent) -> Result<()> {
        let context = self.get_pipeline(pipeline_id)?;
        let preview = self.render_draft(&context, &content)?;
        self.update(pipeline_id, |ctx| {
            ctx.generated = Some(content.clone());
            ctx.after_content = Some(preview);
        })?;

        if context.kind != WorkflowKind::IncrementalImprove {
            self.transition(pipeline_id, PipelineStage::Embedding)?;
            let embedding = self
                .embed(embedding_text(&context.metadata.name, &content))
                .await;
            if !self.still_active(pipeline_id, "embedding") {
                return Ok(());
            }
            let embedding = embedding?;
            self.update(pipeline_id, |ctx| ctx.embedding = Some(embedding))?;
        }

        if !self.config.enable_grounding {
            self.transition(pipeline_id, PipelineStage::AwaitingWriteConfirm)?;
            return Ok(());
        }

        self.transition(pipeline_id, PipelineStage::Grounding)?;
        let task = NewTask::new(
            context.node_id.clone(),
            TaskWork::FactCheck {
                knowledge_type: context.knowledge_type,
                name: context.metadata.name.clone(),
                content,
                result: None,
            },
        )
        .for_pipeline(pipeline_id);
        self.enqueue_for(pipeline_id, task).await
    }

    fn on_fact_checked(&self, pipeline_id: &str, verdict: GroundingVerdict) -> Result<()> {
        if verdict.passed {
            info!(pipeline_id, "Fact check passed");
        } else {
            warn!(pipeline_id, issues = verdict.issues.len(), "Fact check raised issues");
        }
        self.update(pipeline_id, |ctx| ctx.grounding = Some(verdict))?;
        self.transition(pipeline_id, PipelineStage::AwaitingWriteConfirm)?;
        Ok(())
    }
}

/// Text embedded for similarity: the name plus the definition when present
fn embedding_text(name: &str, content: &GeneratedContent) -> String {
    match content.definition() {
        Some(definition) if !definition.trim().is_empty() => {
            format!("{name}\n\n{}", definition.trim())
        }
        _ => name.to_string(),
    }
}
