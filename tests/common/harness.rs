//! Wiring of a queue and an orchestrator over in-memory collaborators.
//!
//! The scheduler loop is never started; tests drive scheduling with explicit
//! `tick()` calls so every promotion is deterministic.

use concept_pipeline::config::{CoreConfig, QueueConfig};
use concept_pipeline::pipeline::{
    PipelineCollaborators, PipelineContext, PipelineEvent, PipelineOrchestrator, PipelineStage,
};
use concept_pipeline::ports::TaskRunner;
use concept_pipeline::queue::{
    InMemoryLockManager, ProviderTaskRunner, QueueSnapshot, TaskQueue,
};
use concept_pipeline::resilience::RetryHandler;
use concept_pipeline::events::Subscription;
use concept_pipeline::test_helpers::{
    MemoryStorage, RecordingDuplicateManager, RecordingUndoStore, RecordingVectorIndex,
    ScriptedProvider, StaticPromptBuilder,
};
use std::sync::Arc;
use std::time::Duration;

const SETTLE_ROUNDS: usize = 400;
const SETTLE_STEP: Duration = Duration::from_millis(2);

/// Queue config for tests: generous timeout, defaults otherwise
pub fn queue_config() -> QueueConfig {
    QueueConfig {
        task_timeout_ms: 5_000,
        ..QueueConfig::default()
    }
}

/// Build and initialize a queue over `storage`, with `runner` attached
pub async fn build_queue(
    config: QueueConfig,
    storage: Arc<MemoryStorage>,
    runner: Arc<dyn TaskRunner>,
) -> Arc<TaskQueue> {
    let queue = Arc::new(TaskQueue::new(
        config,
        Arc::new(InMemoryLockManager::new()),
        storage,
        RetryHandler::new(),
    ));
    queue.initialize().await.expect("queue initializes");
    queue.attach_runner(runner).expect("runner attaches once");
    queue
}

/// Tick `queue` until `done` holds, yielding between rounds so spawned
/// executions and event handlers make progress
pub async fn tick_until(queue: &Arc<TaskQueue>, mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..SETTLE_ROUNDS {
        if done() {
            return true;
        }
        queue.tick().await;
        tokio::time::sleep(SETTLE_STEP).await;
    }
    done()
}

/// Decode the snapshot the queue last wrote to storage
pub fn persisted_snapshot(storage: &MemoryStorage, config: &QueueConfig) -> QueueSnapshot {
    let raw = storage
        .get(&config.snapshot_path)
        .expect("queue snapshot was written");
    serde_json::from_str(&raw).expect("queue snapshot is valid JSON")
}

/// Full orchestrator over in-memory collaborators and the provider-backed runner
pub struct PipelineHarness {
    pub config: CoreConfig,
    pub storage: Arc<MemoryStorage>,
    pub provider: Arc<ScriptedProvider>,
    pub vectors: Arc<RecordingVectorIndex>,
    pub duplicates: Arc<RecordingDuplicateManager>,
    pub undo: Arc<RecordingUndoStore>,
    pub queue: Arc<TaskQueue>,
    pub orchestrator: Arc<PipelineOrchestrator>,
}

impl PipelineHarness {
    pub async fn new() -> Self {
        Self::with(CoreConfig::default(), StaticPromptBuilder::new()).await
    }

    pub async fn with(mut config: CoreConfig, prompts: StaticPromptBuilder) -> Self {
        config.queue.task_timeout_ms = 5_000;
        config.pipeline.embedding_dimensions = 8;

        let storage = Arc::new(MemoryStorage::new());
        let provider = Arc::new(ScriptedProvider::new());
        let prompts = Arc::new(prompts);
        let vectors = Arc::new(RecordingVectorIndex::new());
        let duplicates = Arc::new(RecordingDuplicateManager::new());
        let undo = Arc::new(RecordingUndoStore::new());

        let runner = Arc::new(ProviderTaskRunner::new(
            provider.clone(),
            prompts.clone(),
            config.pipeline.clone(),
        ));
        let queue = build_queue(config.queue.clone(), storage.clone(), runner).await;

        let orchestrator = Arc::new(PipelineOrchestrator::new(
            config.pipeline.clone(),
            PipelineCollaborators {
                queue: queue.clone(),
                provider: provider.clone(),
                prompts,
                vectors: vectors.clone(),
                duplicates: duplicates.clone(),
                undo: undo.clone(),
                storage: storage.clone(),
            },
        ));
        orchestrator.start();

        Self {
            config,
            storage,
            provider,
            vectors,
            duplicates,
            undo,
            queue,
            orchestrator,
        }
    }

    pub fn stage(&self, pipeline_id: &str) -> PipelineStage {
        self.orchestrator
            .get_pipeline(pipeline_id)
            .expect("pipeline exists")
            .stage
    }

    /// Drive the queue until the pipeline reaches `stage`. Panics with the
    /// recorded error if it fails on the way.
    pub async fn drive_to(&self, pipeline_id: &str, stage: PipelineStage) -> PipelineContext {
        let reached = tick_until(&self.queue, || {
            let current = self.stage(pipeline_id);
            current == stage || (current == PipelineStage::Failed && stage != PipelineStage::Failed)
        })
        .await;

        let context = self
            .orchestrator
            .get_pipeline(pipeline_id)
            .expect("pipeline exists");
        assert!(reached, "pipeline stuck at {}", context.stage);
        assert_eq!(
            context.stage, stage,
            "pipeline failed at {:?}: {:?}",
            context.failed_stage, context.error
        );
        context
    }
}

/// Next event matching `predicate`, or `None` after a short wait
pub async fn next_event(
    subscription: &mut Subscription<PipelineEvent>,
    predicate: impl Fn(&PipelineEvent) -> bool,
) -> Option<PipelineEvent> {
    let wait = async {
        while let Some(event) = subscription.recv().await {
            if predicate(&event) {
                return Some(event);
            }
        }
        None
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .ok()
        .flatten()
}
