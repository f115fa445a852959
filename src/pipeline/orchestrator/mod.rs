//! # Pipeline Orchestrator
//!
//! Drives a concept through the stage sequence of its workflow kind.
//!
//! ## Architecture
//!
//! - Interactive steps (define, embed) call the provider directly so the user
//!   never waits behind queued work.
//! - Long-running steps (enrich, generate, fact-check) are enqueued on the
//!   [`TaskQueue`] and advanced from its events by [`handle_queue_event`].
//! - Two confirmation gates pause the pipeline: `awaiting-create-confirm`
//!   (before the stub is written) and `awaiting-write-confirm` (before the
//!   note is overwritten).
//! - Every stage change goes through [`PipelineStateMachine`], so a context can
//!   only advance along its workflow's directed path.
//!
//! The orchestrator never retries on its own: queued steps were already
//! retried by the queue, and direct-call failures are returned to the caller.
//!
//! [`handle_queue_event`]: PipelineOrchestrator::handle_queue_event

mod handlers;
mod writer;

use super::context::{MergeDetails, MergeRequest, PipelineContext};
use super::events::{ConfirmationKind, PipelineEvent};
use super::note::{compose_note, note_path, parse_metadata, split_frontmatter, NoteMetadata, NoteStatus};
use super::response_parser::parse_structured;
use super::sanitizer::sanitize_input;
use crate::config::PipelineConfig;
use crate::constants::{codes, templates};
use crate::error::{PipelineError, Result};
use crate::events::{EventBus, SharedEventBus, Subscription};
use crate::logging::log_pipeline_operation;
use crate::models::{
    GeneratedContent, GenerationMode, GenerationRequest, NewTask, StandardizedConcept, TaskWork,
};
use crate::ports::{
    ChatRequest, DuplicateManager, EmbedRequest, PromptBuilder, ProviderClient, StorageAdapter,
    UndoStore, VectorIndex,
};
use crate::queue::TaskQueue;
use crate::state_machine::{PipelineStage, PipelineStateMachine, TaskState, WorkflowKind};
use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Category lock shared by merge generations, so merges never overlap
const MERGE_CATEGORY: &str = "merge";

/// External collaborators of the orchestrator
#[derive(Clone)]
pub struct PipelineCollaborators {
    pub queue: Arc<TaskQueue>,
    pub provider: Arc<dyn ProviderClient>,
    pub prompts: Arc<dyn PromptBuilder>,
    pub vectors: Arc<dyn VectorIndex>,
    pub duplicates: Arc<dyn DuplicateManager>,
    pub undo: Arc<dyn UndoStore>,
    pub storage: Arc<dyn StorageAdapter>,
}

pub struct PipelineOrchestrator {
    config: PipelineConfig,
    queue: Arc<TaskQueue>,
    provider: Arc<dyn ProviderClient>,
    prompts: Arc<dyn PromptBuilder>,
    vectors: Arc<dyn VectorIndex>,
    duplicates: Arc<dyn DuplicateManager>,
    undo: Arc<dyn UndoStore>,
    storage: Arc<dyn StorageAdapter>,
    pipelines: Mutex<HashMap<String, PipelineContext>>,
    events: SharedEventBus<PipelineEvent>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("config", &self.config)
            .field("pipelines", &self.pipelines.lock().len())
            .finish()
    }
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig, collaborators: PipelineCollaborators) -> Self {
        Self {
            config,
            queue: collaborators.queue,
            provider: collaborators.provider,
            prompts: collaborators.prompts,
            vectors: collaborators.vectors,
            duplicates: collaborators.duplicates,
            undo: collaborators.undo,
            storage: collaborators.storage,
            pipelines: Mutex::new(HashMap::new()),
            events: Arc::new(EventBus::new("pipeline_orchestrator")),
            listener: Mutex::new(None),
        }
    }

    /// Subscribe once to queue events and advance pipelines from them.
    /// Each event is handled on its own task so the listener never stalls.
    pub fn start(self: &Arc<Self>) {
        let mut listener = self.listener.lock();
        if listener.is_some() {
            return;
        }

        let mut subscription = self.queue.subscribe();
        let orchestrator = Arc::clone(self);
        *listener = Some(tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                let handler = Arc::clone(&orchestrator);
                tokio::spawn(async move { handler.handle_queue_event(event).await });
            }
            debug!("Queue event stream closed");
        }));
        info!("🎯 ORCHESTRATOR: Listening for queue events");
    }

    /// Stop listening for queue events
    pub fn stop(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }

    pub fn subscribe(&self) -> Subscription<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> SharedEventBus<PipelineEvent> {
        Arc::clone(&self.events)
    }

    // ---------------------------------------------------------------------
    // Entry points
    // ---------------------------------------------------------------------

    /// Standardize raw user input with a direct provider call
    #[instrument(skip(self, user_input))]
    pub async fn define_direct(&self, user_input: &str) -> Result<StandardizedConcept> {
        let template_id = self.check_prerequisites()?;
        let input = sanitize_input(user_input, self.config.max_input_length)?;

        let raw = self
            .chat(&template_id, json!({ "input": input }))
            .await?;
        let concept: StandardizedConcept = parse_structured(&raw)?;
        if concept.standard_name.trim().is_empty() {
            return Err(PipelineError::new(
                codes::MODEL_OUTPUT_MISSING_FIELDS,
                "Model returned a concept without a name",
            ));
        }

        info!(
            standard_name = %concept.standard_name,
            primary_type = %concept.primary_type,
            "🎯 ORCHESTRATOR: Concept defined"
        );
        Ok(concept)
    }

    /// Start a create pipeline from a confirmed definition. A note with the
    /// same type and name already on disk is rejected before any task is queued.
    #[instrument(skip(self, standardized, user_input), fields(name = %standardized.standard_name))]
    pub async fn start_create_pipeline_with_standardized(
        &self,
        standardized: StandardizedConcept,
        user_input: &str,
    ) -> Result<String> {
        self.require_provider()?;
        let name = standardized.standard_name.trim().to_string();
        if name.is_empty() {
            return Err(PipelineError::new(codes::INPUT_EMPTY, "Concept name is empty"));
        }

        let path = note_path(&self.config.notes_dir, standardized.primary_type, &name);
        let in_flight = self
            .pipelines
            .lock()
            .values()
            .any(|p| p.is_active() && p.file_path == path);
        if in_flight || self.storage.exists(&path).await? {
            return Err(PipelineError::new(
                codes::DUPLICATE_NOTE_NAME,
                format!("A {} note named {name:?} already exists at {path}", standardized.primary_type),
            )
            .with_details(json!({ "path": path })));
        }

        let mut metadata = NoteMetadata::new(
            Uuid::new_v4().to_string(),
            standardized.primary_type,
            name,
        );
        metadata.merge_aliases(&standardized.aliases);

        let pipeline_id = Uuid::new_v4().to_string();
        let mut context = PipelineContext::new(
            pipeline_id.clone(),
            WorkflowKind::Create,
            metadata,
            path,
            user_input.to_string(),
        );
        context.standardized = Some(standardized.clone());
        let node_id = context.node_id.clone();
        self.insert(context);

        self.transition(&pipeline_id, PipelineStage::Enriching)?;
        let task = NewTask::new(
            node_id,
            TaskWork::Enrich {
                standardized,
                result: None,
            },
        )
        .for_pipeline(&pipeline_id);
        self.enqueue_for(&pipeline_id, task).await?;
        Ok(pipeline_id)
    }

    /// Confirm creation: write the metadata-only stub and queue generation.
    /// Legal only at `awaiting-create-confirm`.
    #[instrument(skip(self))]
    pub async fn confirm_create(&self, pipeline_id: &str) -> Result<()> {
        self.require_stage(pipeline_id, PipelineStage::AwaitingCreateConfirm)?;
        let result = self.write_stub_and_generate(pipeline_id).await;
        self.fail_on_err(pipeline_id, result)
    }

    async fn write_stub_and_generate(&self, pipeline_id: &str) -> Result<()> {
        let context = self.get_pipeline(pipeline_id)?;
        let stub = compose_note(&context.metadata, None)?;
        self.storage.atomic_write(&context.file_path, &stub).await?;
        self.ensure_active(pipeline_id, "stub write")?;
        log_pipeline_operation(
            "stub_written",
            pipeline_id,
            &context.node_id,
            &context.stage.to_string(),
            Some(&context.file_path),
        );

        self.transition(pipeline_id, PipelineStage::Reasoning)?;
        let request = GenerationRequest {
            mode: GenerationMode::Create,
            knowledge_type: context.knowledge_type,
            name: context.metadata.name.clone(),
            core_definition: context
                .standardized
                .as_ref()
                .map(|s| s.core_definition.clone())
                .filter(|d| !d.is_empty()),
            enrichment: context.enrichment.clone(),
            existing_content: None,
            secondary_content: None,
            instruction: None,
        };
        let task = NewTask::new(
            context.node_id,
            TaskWork::Generate {
                request,
                result: None,
            },
        )
        .for_pipeline(pipeline_id);
        self.enqueue_for(pipeline_id, task).await
    }

    /// Improve an existing note following `instruction`
    #[instrument(skip(self, instruction))]
    pub async fn start_incremental_pipeline(
        &self,
        node_id: &str,
        file_path: &str,
        instruction: &str,
    ) -> Result<String> {
        self.require_provider()?;
        let instruction = sanitize_input(instruction, self.config.max_input_length)?;
        let before = self.storage.read(file_path).await?;
        let mut metadata = parse_metadata(&before)?;
        metadata.uid = node_id.to_string();

        let pipeline_id = Uuid::new_v4().to_string();
        let mut context = PipelineContext::new(
            pipeline_id.clone(),
            WorkflowKind::IncrementalImprove,
            metadata,
            file_path.to_string(),
            instruction.clone(),
        );
        context.before_content = Some(before.clone());
        context.instruction = Some(instruction.clone());
        let request = GenerationRequest {
            mode: GenerationMode::Improve,
            knowledge_type: context.knowledge_type,
            name: context.metadata.name.clone(),
            core_definition: None,
            enrichment: None,
            existing_content: Some(note_body(&before).to_string()),
            secondary_content: None,
            instruction: Some(instruction),
        };
        self.insert(context);

        self.transition(&pipeline_id, PipelineStage::Reasoning)?;
        let task = NewTask::new(
            node_id,
            TaskWork::Generate {
                request,
                result: None,
            },
        )
        .for_pipeline(&pipeline_id);
        self.enqueue_for(&pipeline_id, task).await?;
        Ok(pipeline_id)
    }

    /// Merge the superseded note into the survivor
    #[instrument(skip(self, request), fields(pair_id = %request.pair_id))]
    pub async fn start_merge_pipeline(&self, request: MergeRequest) -> Result<String> {
        self.require_provider()?;
        let survivor_content = self.storage.read(&request.survivor.path).await?;
        let superseded_content = self.storage.read(&request.superseded.path).await?;

        let mut metadata = parse_metadata(&survivor_content)?;
        metadata.uid = request.survivor.node_id.clone();
        metadata.note_type = request.knowledge_type;
        metadata.merge_aliases([request.superseded.name.as_str()]);
        if let Ok(superseded) = parse_metadata(&superseded_content) {
            metadata.merge_aliases(&superseded.aliases);
            metadata.merge_tags(&superseded.tags);
        }

        let pipeline_id = Uuid::new_v4().to_string();
        let mut context = PipelineContext::new(
            pipeline_id.clone(),
            WorkflowKind::Merge,
            metadata,
            request.survivor.path.clone(),
            format!("merge {} into {}", request.superseded.name, request.survivor.name),
        );
        context.before_content = Some(survivor_content.clone());
        context.merge = Some(MergeDetails {
            pair_id: request.pair_id.clone(),
            superseded: request.superseded.clone(),
            superseded_content: superseded_content.clone(),
            superseded_snapshot_id: None,
        });
        let generation = GenerationRequest {
            mode: GenerationMode::Merge,
            knowledge_type: request.knowledge_type,
            name: context.metadata.name.clone(),
            core_definition: None,
            enrichment: None,
            existing_content: Some(note_body(&survivor_content).to_string()),
            secondary_content: Some(note_body(&superseded_content).to_string()),
            instruction: None,
        };
        self.insert(context);

        self.transition(&pipeline_id, PipelineStage::Reasoning)?;
        let task = NewTask::new(
            request.survivor.node_id,
            TaskWork::Generate {
                request: generation,
                result: None,
            },
        )
        .for_pipeline(&pipeline_id)
        .with_category(MERGE_CATEGORY);
        self.enqueue_for(&pipeline_id, task).await?;
        Ok(pipeline_id)
    }

    /// Replace the generated content with a user-corrected version. Legal at
    /// `awaiting-write-confirm`, or after a failed write, which re-enters
    /// `awaiting-write-confirm`. A pipeline cancelled while writing stays failed.
    #[instrument(skip(self, content))]
    pub async fn update_generated_content(
        &self,
        pipeline_id: &str,
        content: GeneratedContent,
    ) -> Result<PipelineContext> {
        let context = self.get_pipeline(pipeline_id)?;
        let reentry = match context.stage {
            PipelineStage::AwaitingWriteConfirm => false,
            PipelineStage::Failed => {
                PipelineStateMachine::reenter_write(
                    context.stage,
                    context.failed_stage,
                    context.error.as_ref(),
                )?;
                true
            }
            stage => {
                return Err(PipelineError::new(
                    codes::INVALID_STAGE,
                    format!("Cannot update generated content while {stage}"),
                ))
            }
        };

        let missing = content.missing_fields(context.knowledge_type);
        if !missing.is_empty() {
            return Err(PipelineError::new(
                codes::MODEL_OUTPUT_MISSING_FIELDS,
                format!("Content is missing: {}", missing.join(", ")),
            ));
        }

        let preview = self.render_draft(&context, &content)?;
        if !reentry {
            return self.update(pipeline_id, |ctx| {
                ctx.generated = Some(content);
                ctx.after_content = Some(preview);
            });
        }

        self.change_stage(pipeline_id, |ctx| {
            let to = PipelineStateMachine::reenter_write(ctx.stage, ctx.failed_stage, ctx.error.as_ref())?;
            ctx.generated = Some(content);
            ctx.after_content = Some(preview);
            ctx.error = None;
            ctx.failed_stage = None;
            Ok(to)
        })
    }

    /// Cancel every queued task of the pipeline and mark it failed. A note
    /// that was already written stays on disk.
    #[instrument(skip(self))]
    pub async fn cancel_pipeline(&self, pipeline_id: &str) -> Result<()> {
        let context = self.get_pipeline(pipeline_id)?;
        if !context.is_active() {
            return Err(PipelineError::new(
                codes::INVALID_STAGE,
                format!("Pipeline {pipeline_id} already {}", context.stage),
            ));
        }

        let cancellable: Vec<String> = self
            .queue
            .tasks_for_pipeline(pipeline_id)
            .into_iter()
            .filter(|t| {
                matches!(
                    t.state,
                    TaskState::Pending | TaskState::Running | TaskState::Failed
                )
            })
            .map(|t| t.id)
            .collect();
        let results = join_all(cancellable.iter().map(|id| self.queue.cancel(id))).await;
        for (task_id, result) in cancellable.iter().zip(results) {
            if let Err(e) = result {
                warn!(pipeline_id, task_id = %task_id, error = %e, "Could not cancel pipeline task");
            }
        }

        self.fail(pipeline_id, PipelineError::user_cancelled());
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn get_pipeline(&self, pipeline_id: &str) -> Result<PipelineContext> {
        self.pipelines
            .lock()
            .get(pipeline_id)
            .cloned()
            .ok_or_else(|| PipelineError::pipeline_not_found(pipeline_id))
    }

    pub fn active_pipelines(&self) -> Vec<PipelineContext> {
        let mut active: Vec<PipelineContext> = self
            .pipelines
            .lock()
            .values()
            .filter(|p| p.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|p| p.created_at);
        active
    }

    pub fn all_pipelines(&self) -> Vec<PipelineContext> {
        let mut all: Vec<PipelineContext> = self.pipelines.lock().values().cloned().collect();
        all.sort_by_key(|p| p.created_at);
        all
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn require_provider(&self) -> Result<()> {
        if self.config.provider_configured {
            Ok(())
        } else {
            Err(PipelineError::new(
                codes::PROVIDER_NOT_CONFIGURED,
                "No AI provider is configured",
            ))
        }
    }

    /// Provider configured and define template available; returns the template id
    fn check_prerequisites(&self) -> Result<String> {
        self.require_provider()?;
        let template_id = self
            .config
            .define_template_id
            .clone()
            .unwrap_or_else(|| templates::DEFINE.to_string());
        if self.config.define_template_id.is_some() && !self.prompts.has_template(&template_id) {
            return Err(PipelineError::new(
                codes::TEMPLATE_MISSING,
                format!("Prompt template {template_id:?} is missing or disabled"),
            ));
        }
        Ok(template_id)
    }

    async fn chat(&self, template_id: &str, variables: serde_json::Value) -> Result<String> {
        let messages = self.prompts.build(template_id, &variables)?;
        let response = self
            .provider
            .chat(ChatRequest {
                model: self.config.chat_model.clone(),
                messages,
                json_mode: true,
                temperature: None,
            })
            .await?;
        if response.finish_reason == "length" {
            return Err(PipelineError::new(
                codes::MODEL_OUTPUT_INCOMPLETE,
                "Response stopped at the token limit",
            ));
        }
        Ok(response.content)
    }

    async fn embed(&self, text: String) -> Result<Vec<f32>> {
        let response = self
            .provider
            .embed(EmbedRequest {
                model: self.config.embedding_model.clone(),
                input: text,
                dimensions: self.config.embedding_dimensions,
            })
            .await?;
        Ok(response.embedding)
    }

    fn render_draft(&self, context: &PipelineContext, content: &GeneratedContent) -> Result<String> {
        let mut metadata = context.metadata.clone();
        metadata.status = NoteStatus::Draft;
        metadata.updated = Utc::now();
        compose_note(&metadata, Some(content))
    }

    fn insert(&self, context: PipelineContext) {
        log_pipeline_operation(
            "create",
            &context.id,
            &context.node_id,
            &context.stage.to_string(),
            Some(&context.kind.to_string()),
        );
        self.pipelines.lock().insert(context.id.clone(), context);
    }

    fn require_stage(&self, pipeline_id: &str, expected: PipelineStage) -> Result<PipelineContext> {
        let context = self.get_pipeline(pipeline_id)?;
        if context.stage != expected {
            return Err(PipelineError::new(
                codes::INVALID_STAGE,
                format!(
                    "Pipeline {pipeline_id} is {}, expected {expected}",
                    context.stage
                ),
            ));
        }
        Ok(context)
    }

    /// Mutate artifacts of a context without changing its stage
    fn update(
        &self,
        pipeline_id: &str,
        apply: impl FnOnce(&mut PipelineContext),
    ) -> Result<PipelineContext> {
        let mut pipelines = self.pipelines.lock();
        let context = pipelines
            .get_mut(pipeline_id)
            .ok_or_else(|| PipelineError::pipeline_not_found(pipeline_id))?;
        apply(context);
        context.updated_at = Utc::now();
        Ok(context.clone())
    }

    /// Validated stage change along the workflow's table
    fn transition(&self, pipeline_id: &str, to: PipelineStage) -> Result<PipelineContext> {
        self.change_stage(pipeline_id, |ctx| {
            PipelineStateMachine::transition(ctx.kind, ctx.stage, to)
        })
    }

    /// Apply the stage chosen by `advance` under the pipeline lock; publishes
    /// `stage_changed` and, at a gate, `confirmation_required`
    fn change_stage(
        &self,
        pipeline_id: &str,
        advance: impl FnOnce(&mut PipelineContext) -> Result<PipelineStage>,
    ) -> Result<PipelineContext> {
        let (context, from, to) = {
            let mut pipelines = self.pipelines.lock();
            let context = pipelines
                .get_mut(pipeline_id)
                .ok_or_else(|| PipelineError::pipeline_not_found(pipeline_id))?;
            let from = context.stage;
            let to = advance(context)?;
            context.stage = to;
            context.updated_at = Utc::now();
            (context.clone(), from, to)
        };

        log_pipeline_operation(
            "transition",
            pipeline_id,
            &context.node_id,
            &to.to_string(),
            Some(&from.to_string()),
        );
        self.events.publish(PipelineEvent::StageChanged {
            context: context.clone(),
            from,
            to,
        });

        let gate = match to {
            PipelineStage::AwaitingCreateConfirm => Some(ConfirmationKind::Create),
            PipelineStage::AwaitingWriteConfirm => Some(ConfirmationKind::Write),
            _ => None,
        };
        if let Some(kind) = gate {
            self.events.publish(PipelineEvent::ConfirmationRequired {
                context: context.clone(),
                kind,
            });
        }
        Ok(context)
    }

    /// False once the pipeline failed or was cancelled; `arrival` names the
    /// result being dropped
    fn still_active(&self, pipeline_id: &str, arrival: &str) -> bool {
        let active = self
            .pipelines
            .lock()
            .get(pipeline_id)
            .is_some_and(PipelineContext::is_active);
        if !active {
            debug!(pipeline_id, arrival, "Discarding result for an inactive pipeline");
        }
        active
    }

    /// Like [`still_active`](Self::still_active), returning the pipeline's
    /// recorded error when it is no longer active
    fn ensure_active(&self, pipeline_id: &str, arrival: &str) -> Result<()> {
        if self.still_active(pipeline_id, arrival) {
            return Ok(());
        }
        let context = self.get_pipeline(pipeline_id)?;
        Err(context.error.unwrap_or_else(PipelineError::user_cancelled))
    }

    /// Move a non-terminal pipeline to Failed and publish `pipeline_failed`
    fn fail(&self, pipeline_id: &str, error: PipelineError) {
        let context = {
            let mut pipelines = self.pipelines.lock();
            let Some(context) = pipelines.get_mut(pipeline_id) else {
                warn!(pipeline_id, "Failure reported for an unknown pipeline");
                return;
            };
            if context.stage.is_terminal() {
                debug!(pipeline_id, stage = %context.stage, "Ignoring failure of a finished pipeline");
                return;
            }
            context.failed_stage = Some(context.stage);
            context.stage = PipelineStage::Failed;
            context.error = Some(error.clone());
            context.updated_at = Utc::now();
            context.clone()
        };

        error!(
            pipeline_id,
            node_id = %context.node_id,
            failed_stage = ?context.failed_stage,
            error_code = %error.code,
            error = %error.message,
            "🎯 ORCHESTRATOR: Pipeline failed"
        );
        self.events
            .publish(PipelineEvent::PipelineFailed { context, error });
    }

    fn fail_on_err<T>(&self, pipeline_id: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.fail(pipeline_id, e.clone());
        }
        result
    }

    /// Enqueue a pipeline task. A task queued while the pipeline was being
    /// cancelled is cancelled again right away.
    async fn enqueue_for(&self, pipeline_id: &str, task: NewTask) -> Result<()> {
        let record = self.fail_on_err(pipeline_id, self.queue.enqueue(task).await)?;
        if !self.still_active(pipeline_id, "queued task") {
            if let Err(e) = self.queue.cancel(&record.id).await {
                warn!(pipeline_id, task_id = %record.id, error = %e, "Could not cancel orphaned pipeline task");
            }
            return Ok(());
        }
        debug!(pipeline_id, task_id = %record.id, task_type = %record.task_type, "Queued pipeline task");
        Ok(())
    }
}

/// Body of a note without its frontmatter
fn note_body(raw: &str) -> &str {
    split_frontmatter(raw).map_or(raw, |(_, body)| body)
}
