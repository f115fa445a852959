//! Task queue behavior over in-memory storage with a scripted runner.

mod common;

use common::*;
use concept_pipeline::constants::codes;
use concept_pipeline::models::{NewTask, TaskOutput, TaskType};
use concept_pipeline::ports::LockManager;
use concept_pipeline::queue::{InMemoryLockManager, QueueEventKind, TaskQueue};
use concept_pipeline::resilience::RetryHandler;
use concept_pipeline::state_machine::TaskState;
use concept_pipeline::test_helpers::{MemoryStorage, ScriptedRunner};
use concept_pipeline::PipelineError;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn enrich_task(node_id: &str) -> NewTask {
    NewTask::new(node_id, enrich_work(node_id))
}

fn enriched_output() -> TaskOutput {
    TaskOutput::Enriched(enrichment())
}

fn state_of(queue: &Arc<TaskQueue>, task_id: &str) -> TaskState {
    queue.get_task(task_id).expect("task tracked").state
}

#[tokio::test]
async fn test_second_enqueue_for_busy_entity_is_rejected() {
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(ScriptedRunner::new().with_output(enriched_output()));
    let queue = build_queue(queue_config(), storage, runner).await;

    let first = assert_ok!(queue.enqueue(enrich_task("n1")).await);
    assert_eq!(first.state, TaskState::Pending);

    let error = assert_err!(queue.enqueue(enrich_task("n1")).await);
    assert_eq!(error.code, codes::DUPLICATE_ACTIVE_TASK);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.tasks()[0].id, first.id);
}

#[tokio::test]
async fn test_successful_run_publishes_lifecycle_events() {
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(ScriptedRunner::new().with_output(enriched_output()));
    let queue = build_queue(queue_config(), storage, runner).await;
    let mut events = queue.subscribe();

    let task = queue.enqueue(enrich_task("n1")).await.unwrap();
    assert!(tick_until(&queue, || queue.get_task(&task.id).unwrap().state == TaskState::Completed).await);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mut kinds = Vec::new();
    while let Ok(event) = events.receiver.try_recv() {
        kinds.push(event.kind);
    }
    assert_eq!(
        kinds,
        vec![
            QueueEventKind::TaskAdded,
            QueueEventKind::TaskStarted,
            QueueEventKind::TaskCompleted
        ]
    );

    let completed = queue.get_task(&task.id).unwrap();
    assert_eq!(completed.attempt, 1);
    assert!(completed.locks.is_empty());
    assert!(completed.completed_at.is_some());
    assert_eq!(queue.status().stats.total_processed, 1);
}

#[tokio::test]
async fn test_every_mutation_is_persisted() {
    let config = queue_config();
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(ScriptedRunner::new().with_output(enriched_output()).hold_until_released());
    let queue = build_queue(config.clone(), storage.clone(), runner.clone()).await;

    let first = queue.enqueue(enrich_task("n1")).await.unwrap();
    let second = queue.enqueue(enrich_task("n2")).await.unwrap();
    assert_eq!(persisted_snapshot(&storage, &config).tasks, queue.tasks());

    assert_eq!(queue.tick().await, Some(first.id.clone()));
    let snapshot = persisted_snapshot(&storage, &config);
    assert_eq!(snapshot.tasks[0].state, TaskState::Running);
    assert_eq!(snapshot.locks.len(), 1);
    assert_eq!(snapshot.locks[0].key, "n1");

    queue.cancel(&second.id).await.unwrap();
    let snapshot = persisted_snapshot(&storage, &config);
    assert_eq!(snapshot.tasks[1].state, TaskState::Cancelled);
    assert_eq!(snapshot.stats.total_cancelled, 1);

    queue.pause().await;
    assert!(persisted_snapshot(&storage, &config).paused);
    queue.resume().await;
    assert!(!persisted_snapshot(&storage, &config).paused);

    queue.set_concurrency(3).await.unwrap();
    assert_eq!(persisted_snapshot(&storage, &config).concurrency, 3);

    runner.release();
    assert!(tick_until(&queue, || queue.get_task(&first.id).unwrap().state == TaskState::Completed).await);
    // the completion save lands right after the state change
    assert!(
        tick_until(&queue, || {
            persisted_snapshot(&storage, &config).tasks[0].state == TaskState::Completed
        })
        .await
    );
    assert_eq!(persisted_snapshot(&storage, &config).tasks, queue.tasks());
}

#[tokio::test]
async fn test_restart_recovers_running_tasks_as_pending() {
    let config = queue_config();
    let storage = Arc::new(MemoryStorage::new());
    let stalled = Arc::new(ScriptedRunner::new().hold_until_released());
    let before = build_queue(config.clone(), storage.clone(), stalled.clone()).await;

    let task = before
        .enqueue(enrich_task("n1").with_category("merge"))
        .await
        .unwrap();
    before.tick().await;
    let crashed = persisted_snapshot(&storage, &config);
    assert_eq!(crashed.tasks[0].state, TaskState::Running);
    assert!(crashed.tasks[0].started_at.is_some());
    assert_eq!(crashed.locks.len(), 2);

    // A fresh process over the same storage
    let locks = Arc::new(InMemoryLockManager::new());
    let after = Arc::new(TaskQueue::new(
        config.clone(),
        locks.clone(),
        storage.clone(),
        RetryHandler::new(),
    ));
    assert_ok!(after.initialize().await);

    let recovered = after.get_task(&task.id).unwrap();
    assert_eq!(recovered.state, TaskState::Pending);
    assert!(recovered.started_at.is_none());
    assert!(recovered.completed_at.is_none());
    assert!(recovered.locks.is_empty());
    assert!(locks.active_locks().is_empty());

    let rewritten = persisted_snapshot(&storage, &config);
    assert_eq!(rewritten.tasks[0].state, TaskState::Pending);
    assert!(rewritten.locks.is_empty());

    // and the recovered task runs again
    after
        .attach_runner(Arc::new(ScriptedRunner::new().with_output(enriched_output())))
        .unwrap();
    assert!(tick_until(&after, || after.get_task(&task.id).unwrap().state == TaskState::Completed).await);
    assert_eq!(after.get_task(&task.id).unwrap().attempt, 2);

    stalled.release();
}

#[tokio::test]
async fn test_unreadable_snapshot_starts_empty() {
    let config = queue_config();
    let storage = Arc::new(MemoryStorage::new());
    storage.insert(&config.snapshot_path, "{ not json");

    let queue = build_queue(config.clone(), storage.clone(), Arc::new(ScriptedRunner::new())).await;

    assert!(queue.is_empty());
    assert!(persisted_snapshot(&storage, &config).tasks.is_empty());
}

#[tokio::test]
async fn test_model_output_failure_is_retried_three_times() {
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(ScriptedRunner::new().failing(TaskType::Enrich, codes::MODEL_OUTPUT_MALFORMED));
    let queue = build_queue(queue_config(), storage, runner.clone()).await;

    let task = queue.enqueue(enrich_task("n1")).await.unwrap();
    assert!(tick_until(&queue, || queue.get_task(&task.id).unwrap().state == TaskState::Failed).await);

    let failed = queue.get_task(&task.id).unwrap();
    assert_eq!(runner.runs(), 3);
    assert_eq!(failed.attempt, 3);
    assert_eq!(failed.max_attempts, 3);
    assert_eq!(
        failed.errors.iter().map(|e| e.attempt).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(failed
        .errors
        .iter()
        .all(|e| e.code == codes::MODEL_OUTPUT_MALFORMED));

    // a Failed task is never promoted again
    for _ in 0..5 {
        assert_eq!(queue.tick().await, None);
    }
    assert_eq!(runner.runs(), 3);
    let stats = queue.status().stats;
    assert_eq!(stats.total_failed, 1);
    assert_eq!(stats.total_processed, 1);
}

#[tokio::test]
async fn test_non_retryable_failure_fails_on_first_attempt() {
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(ScriptedRunner::new().failing(TaskType::Enrich, codes::TEMPLATE_MISSING));
    let queue = build_queue(queue_config(), storage, runner.clone()).await;

    let task = queue.enqueue(enrich_task("n1")).await.unwrap();
    assert!(tick_until(&queue, || queue.get_task(&task.id).unwrap().state == TaskState::Failed).await);

    assert_eq!(runner.runs(), 1);
    let failure = queue.get_task(&task.id).unwrap().failure();
    assert_eq!(failure.code, codes::TEMPLATE_MISSING);
    assert_eq!(failure.details.as_ref().unwrap()["task_id"], task.id.as_str());
}

#[tokio::test]
async fn test_cancelling_failed_task_moves_it_to_cancelled_stats() {
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(ScriptedRunner::new().failing(TaskType::Enrich, codes::TEMPLATE_MISSING));
    let config = queue_config();
    let queue = build_queue(config.clone(), storage.clone(), runner).await;

    let task = queue.enqueue(enrich_task("n1")).await.unwrap();
    assert!(tick_until(&queue, || state_of(&queue, &task.id) == TaskState::Failed).await);
    assert_eq!(queue.status().stats.total_failed, 1);

    let cancelled = assert_ok!(queue.cancel(&task.id).await);
    assert_eq!(cancelled.state, TaskState::Cancelled);

    let stats = queue.status().stats;
    assert_eq!(stats.total_failed, 0);
    assert_eq!(stats.total_cancelled, 1);
    assert_eq!(stats.total_processed, 1);
    assert_eq!(persisted_snapshot(&storage, &config).stats, stats);
}

#[tokio::test]
async fn test_max_attempts_is_only_ever_raised_by_later_classifications() {
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(ScriptedRunner::new().failing(TaskType::Enrich, codes::MODEL_OUTPUT_MALFORMED));
    runner.push_result(
        TaskType::Enrich,
        Err(PipelineError::new(codes::PROVIDER_REQUEST_FAILED, "upstream 502")),
    );
    let queue = build_queue(queue_config(), storage, runner.clone()).await;

    let task = queue.enqueue(enrich_task("n1")).await.unwrap();
    assert!(tick_until(&queue, || queue.get_task(&task.id).unwrap().state == TaskState::Failed).await);

    // The provider error lifted the ceiling to 5; model-output errors never lower it
    let failed = queue.get_task(&task.id).unwrap();
    assert_eq!(failed.max_attempts, 5);
    assert_eq!(runner.runs(), 5);
    assert_eq!(failed.errors[0].code, codes::PROVIDER_REQUEST_FAILED);
    assert!(failed.errors[1..]
        .iter()
        .all(|e| e.code == codes::MODEL_OUTPUT_MALFORMED));
}

#[tokio::test]
async fn test_retry_disabled_fails_retryable_errors_immediately() {
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(ScriptedRunner::new().failing(TaskType::Enrich, codes::STORAGE_IO));
    let config = concept_pipeline::config::QueueConfig {
        auto_retry: false,
        ..queue_config()
    };
    let queue = build_queue(config, storage, runner.clone()).await;

    let task = queue.enqueue(enrich_task("n1")).await.unwrap();
    assert!(tick_until(&queue, || queue.get_task(&task.id).unwrap().state == TaskState::Failed).await);
    assert_eq!(runner.runs(), 1);

    // manual retry starts a fresh attempt count
    let retried = assert_ok!(queue.retry_task(&task.id).await);
    assert_eq!(retried.state, TaskState::Pending);
    assert_eq!(retried.attempt, 0);
    assert_eq!(retried.errors.len(), 1);
}

#[tokio::test]
async fn test_timed_out_task_is_aborted_and_recorded() {
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(
        ScriptedRunner::new()
            .with_output(enriched_output())
            .with_delay(Duration::from_millis(500)),
    );
    let config = concept_pipeline::config::QueueConfig {
        task_timeout_ms: 20,
        auto_retry: false,
        ..queue_config()
    };
    let queue = build_queue(config, storage, runner.clone()).await;

    let task = queue.enqueue(enrich_task("n1")).await.unwrap();
    assert!(tick_until(&queue, || queue.get_task(&task.id).unwrap().state == TaskState::Failed).await);

    let failed = queue.get_task(&task.id).unwrap();
    assert_eq!(failed.last_error().unwrap().code, codes::EXECUTION_TIMEOUT);
    assert!(failed.locks.is_empty());
    assert_eq!(runner.aborted(), vec![task.id.clone()]);
}

#[tokio::test]
async fn test_cancelling_running_task_discards_its_result() {
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(ScriptedRunner::new().with_output(enriched_output()).hold_until_released());
    let queue = build_queue(queue_config(), storage, runner.clone()).await;

    let task = queue.enqueue(enrich_task("n1")).await.unwrap();
    queue.tick().await;
    assert_eq!(state_of(&queue, &task.id), TaskState::Running);

    let cancelled = assert_ok!(queue.cancel(&task.id).await);
    assert_eq!(cancelled.state, TaskState::Cancelled);
    assert_eq!(runner.aborted(), vec![task.id.clone()]);

    runner.release();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let record = queue.get_task(&task.id).unwrap();
    assert_eq!(record.state, TaskState::Cancelled);
    assert_eq!(queue.status().stats.total_processed, 0);

    // the entity is free again
    assert_ok!(queue.enqueue(enrich_task("n1")).await);

    let error = assert_err!(queue.cancel(&task.id).await);
    assert_eq!(error.code, codes::ILLEGAL_TASK_TRANSITION);
    let error = assert_err!(queue.cancel("missing").await);
    assert_eq!(error.code, codes::TASK_NOT_FOUND);
}

#[tokio::test]
async fn test_category_lock_serializes_across_entities() {
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(ScriptedRunner::new().with_output(enriched_output()).hold_until_released());
    let queue = build_queue(queue_config(), storage, runner.clone()).await;
    queue.set_concurrency(2).await.unwrap();

    let first = queue
        .enqueue(enrich_task("n1").with_category("merge"))
        .await
        .unwrap();
    let second = queue
        .enqueue(enrich_task("n2").with_category("merge"))
        .await
        .unwrap();

    assert_eq!(queue.tick().await, Some(first.id.clone()));
    assert_eq!(queue.tick().await, None);
    assert_eq!(state_of(&queue, &second.id), TaskState::Pending);

    let error = assert_err!(queue.enqueue(enrich_task("n3").with_category("merge")).await);
    assert_eq!(error.code, codes::LOCK_HELD);

    runner.release();
    assert!(tick_until(&queue, || queue.get_task(&second.id).unwrap().state == TaskState::Completed).await);
    assert_eq!(state_of(&queue, &first.id), TaskState::Completed);
}

#[tokio::test]
async fn test_transient_snapshot_write_failures_are_retried() {
    let config = queue_config();
    let storage = Arc::new(MemoryStorage::new());
    let queue = build_queue(config.clone(), storage.clone(), Arc::new(ScriptedRunner::new())).await;

    storage.fail_next_writes(2);
    let task = queue.enqueue(enrich_task("n1")).await.unwrap();

    let snapshot = persisted_snapshot(&storage, &config);
    assert_eq!(snapshot.tasks.len(), 1);
    assert_eq!(snapshot.tasks[0].id, task.id);
}

#[tokio::test]
async fn test_persist_gives_up_after_system_budget() {
    let config = queue_config();
    let storage = Arc::new(MemoryStorage::new());
    let queue = build_queue(config.clone(), storage.clone(), Arc::new(ScriptedRunner::new())).await;

    storage.fail_next_writes(3);
    // the mutation itself stands even though its save was lost
    let task = assert_ok!(queue.enqueue(enrich_task("n1")).await);
    assert!(persisted_snapshot(&storage, &config).tasks.is_empty());
    assert!(queue.get_task(&task.id).is_some());

    assert_ok!(queue.persist().await);
    assert_eq!(persisted_snapshot(&storage, &config).tasks.len(), 1);
}

#[tokio::test]
async fn test_clear_finished_keeps_failed_tasks() {
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(
        ScriptedRunner::new()
            .with_output(enriched_output())
            .failing(TaskType::Generate, codes::TEMPLATE_MISSING),
    );
    let queue = build_queue(queue_config(), storage, runner).await;

    let done = queue.enqueue(enrich_task("n1")).await.unwrap();
    let cancelled = queue.enqueue(enrich_task("n2")).await.unwrap();
    queue.cancel(&cancelled.id).await.unwrap();
    let failing = queue
        .enqueue(NewTask::new(
            "n3",
            concept_pipeline::models::TaskWork::Generate {
                request: concept_pipeline::models::GenerationRequest {
                    mode: concept_pipeline::models::GenerationMode::Create,
                    knowledge_type: concept_pipeline::models::KnowledgeType::Theory,
                    name: "Entropy".to_string(),
                    core_definition: None,
                    enrichment: None,
                    existing_content: None,
                    secondary_content: None,
                    instruction: None,
                },
                result: None,
            },
        ))
        .await
        .unwrap();

    assert!(
        tick_until(&queue, || {
            queue.get_task(&done.id).unwrap().state == TaskState::Completed
                && queue.get_task(&failing.id).unwrap().state == TaskState::Failed
        })
        .await
    );

    assert_eq!(queue.clear_finished().await, 2);
    let remaining: Vec<String> = queue.tasks().into_iter().map(|t| t.id).collect();
    assert_eq!(remaining, vec![failing.id]);
}

#[tokio::test]
async fn test_zero_concurrency_is_rejected() {
    let storage = Arc::new(MemoryStorage::new());
    let queue = build_queue(queue_config(), storage, Arc::new(ScriptedRunner::new())).await;

    let error = assert_err!(queue.set_concurrency(0).await);
    assert_eq!(error.code, codes::INVALID_CONFIGURATION);
    assert_eq!(queue.concurrency(), 1);
}

#[tokio::test]
async fn test_scheduler_loop_runs_tasks_until_stopped() {
    let config = concept_pipeline::config::QueueConfig {
        tick_interval_ms: 5,
        ..queue_config()
    };
    let storage = Arc::new(MemoryStorage::new());
    let runner = Arc::new(ScriptedRunner::new().with_output(enriched_output()));
    let queue = build_queue(config, storage, runner).await;
    assert_ok!(queue.start());

    let task = queue.enqueue(enrich_task("n1")).await.unwrap();
    let mut done = false;
    for _ in 0..200 {
        if queue.get_task(&task.id).unwrap().state == TaskState::Completed {
            done = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(done);

    queue.stop().await;
}

#[tokio::test]
async fn test_start_requires_initialize() {
    let queue = Arc::new(TaskQueue::new(
        queue_config(),
        Arc::new(InMemoryLockManager::new()),
        Arc::new(MemoryStorage::new()),
        RetryHandler::new(),
    ));
    assert_err!(queue.start());
}
