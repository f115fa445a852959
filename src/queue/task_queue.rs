//! # Task Queue
//!
//! Durable, concurrency-limited task queue with per-entity and per-category
//! locking, crash recovery and error-classified retry.
//!
//! ## Architecture
//!
//! - The task list is the single source of truth, kept in insertion order behind
//!   one mutex; every mutation happens under that guard and is never held
//!   across an `.await`.
//! - A timer-driven scheduler calls [`TaskQueue::tick`], which is re-entrancy
//!   guarded and promotes at most one Pending task per pass once its locks are
//!   granted. Execution is spawned so the scheduler never waits on a runner.
//! - Every mutation is followed by a full snapshot written through the storage
//!   adapter's atomic write. Saves are chained through one async lock and each
//!   save captures state after acquiring it, so the latest state always wins.
//! - [`TaskQueue::initialize`] reloads the snapshot and demotes tasks persisted
//!   while Running, since no execution survives a restart.

use super::events::{QueueEvent, QueueEventKind};
use super::snapshot::{QueueSnapshot, QueueStats};
use crate::config::QueueConfig;
use crate::constants::{codes, QUEUE_SNAPSHOT_VERSION};
use crate::error::{PipelineError, Result};
use crate::events::{EventBus, SharedEventBus, Subscription};
use crate::logging::log_task_operation;
use crate::models::{NewTask, TaskErrorRecord, TaskOutput, TaskRecord};
use crate::ports::{LockKind, LockManager, StorageAdapter, TaskRunner};
use crate::resilience::{RetryHandler, RetryOptions};
use crate::state_machine::{TaskEvent, TaskState, TaskStateMachine};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Point-in-time counts for dashboards and tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub paused: bool,
    pub concurrency: usize,
    pub stats: QueueStats,
}

#[derive(Debug)]
struct QueueState {
    tasks: Vec<TaskRecord>,
    concurrency: usize,
    paused: bool,
    stats: QueueStats,
    /// Ids of tasks whose execution is in flight
    processing: HashSet<String>,
}

impl QueueState {
    fn find_mut(&mut self, task_id: &str) -> Option<&mut TaskRecord> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    fn has_active_task_for(&self, node_id: &str) -> bool {
        self.tasks
            .iter()
            .any(|t| t.node_id == node_id && t.state.is_active())
    }
}

/// Resets the scheduler re-entrancy flag when a tick ends
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct TaskQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
    lock_manager: Arc<dyn LockManager>,
    storage: Arc<dyn StorageAdapter>,
    retry_handler: RetryHandler,
    runner: OnceLock<Arc<dyn TaskRunner>>,
    events: SharedEventBus<QueueEvent>,
    save_lock: tokio::sync::Mutex<()>,
    ticking: AtomicBool,
    initialized: AtomicBool,
    shutdown: Arc<Notify>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("config", &self.config)
            .field("runner_attached", &self.runner.get().is_some())
            .finish()
    }
}

impl TaskQueue {
    pub fn new(
        config: QueueConfig,
        lock_manager: Arc<dyn LockManager>,
        storage: Arc<dyn StorageAdapter>,
        retry_handler: RetryHandler,
    ) -> Self {
        let concurrency = config.concurrency.max(1);
        Self {
            config,
            state: Mutex::new(QueueState {
                tasks: Vec::new(),
                concurrency,
                paused: false,
                stats: QueueStats::default(),
                processing: HashSet::new(),
            }),
            lock_manager,
            storage,
            retry_handler,
            runner: OnceLock::new(),
            events: Arc::new(EventBus::new("task_queue")),
            save_lock: tokio::sync::Mutex::new(()),
            ticking: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            shutdown: Arc::new(Notify::new()),
            scheduler: Mutex::new(None),
        }
    }

    /// Bind the runner. One-shot; the scheduler idles until a runner exists.
    pub fn attach_runner(&self, runner: Arc<dyn TaskRunner>) -> Result<()> {
        self.runner
            .set(runner)
            .map_err(|_| PipelineError::internal("A task runner is already attached"))
    }

    pub fn subscribe(&self) -> Subscription<QueueEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> SharedEventBus<QueueEvent> {
        Arc::clone(&self.events)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Load the persisted snapshot and recover from an unclean shutdown.
    ///
    /// Running tasks are demoted to Pending with their start/complete
    /// timestamps and lock fields cleared, every lock is released, and the
    /// cleaned snapshot is written back before returning.
    #[instrument(skip(self), fields(snapshot_path = %self.config.snapshot_path))]
    pub async fn initialize(&self) -> Result<()> {
        let loaded = self.load_snapshot().await?;

        let mut recovered = 0usize;
        let mut discarded_locks = 0usize;
        if let Some(snapshot) = loaded {
            if snapshot.version != QUEUE_SNAPSHOT_VERSION {
                warn!(
                    found = snapshot.version,
                    expected = QUEUE_SNAPSHOT_VERSION,
                    "Queue snapshot version differs, loading best effort"
                );
            }
            discarded_locks = snapshot.locks.len();

            let mut state = self.state.lock();
            state.tasks = snapshot.tasks;
            state.concurrency = snapshot.concurrency.max(1);
            state.paused = snapshot.paused;
            state.stats = snapshot.stats;
            state.processing.clear();

            let now = Utc::now();
            for task in state.tasks.iter_mut() {
                if task.state == TaskState::Running {
                    task.state = TaskStateMachine::determine_target_state(
                        task.state,
                        TaskEvent::Recover,
                    )?;
                    task.started_at = None;
                    task.completed_at = None;
                    task.locks.clear();
                    task.updated_at = now;
                    recovered += 1;
                }
            }
        }

        // Nothing is running after a restart, so no persisted lock has a live owner
        self.lock_manager.clear();
        self.persist().await?;
        self.initialized.store(true, Ordering::Release);

        info!(
            recovered_tasks = recovered,
            discarded_locks,
            "🔄 TASK_QUEUE: Initialized from snapshot"
        );
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<QueueSnapshot>> {
        let path = &self.config.snapshot_path;
        if !self.storage.exists(path).await? {
            debug!(path = %path, "No queue snapshot found, starting empty");
            return Ok(None);
        }
        let raw = self.storage.read(path).await?;
        match serde_json::from_str::<QueueSnapshot>(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                error!(path = %path, error = %e, "Queue snapshot is unreadable, starting empty");
                Ok(None)
            }
        }
    }

    /// Spawn the scheduler loop. Requires [`TaskQueue::initialize`] first.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(PipelineError::internal(
                "Task queue must be initialized before it is started",
            ));
        }
        let mut scheduler = self.scheduler.lock();
        if scheduler.is_some() {
            return Ok(());
        }

        let queue = Arc::clone(self);
        let shutdown = Arc::clone(&self.shutdown);
        let period = self.config.tick_interval();
        *scheduler = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        queue.tick().await;
                    }
                    _ = shutdown.notified() => {
                        info!("🔄 TASK_QUEUE: Scheduler loop shutting down");
                        break;
                    }
                }
            }
        }));

        info!(
            tick_interval_ms = self.config.tick_interval_ms,
            "🔄 TASK_QUEUE: Scheduler started"
        );
        Ok(())
    }

    /// Stop the scheduler loop. In-flight executions finish on their own.
    pub async fn stop(&self) {
        let handle = self.scheduler.lock().take();
        if let Some(handle) = handle {
            self.shutdown.notify_one();
            if let Err(e) = handle.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Add a task. Rejected without mutation when the entity already has a
    /// Pending/Running task, or its entity or category lock is held.
    #[instrument(skip(self, task), fields(node_id = %task.node_id, task_type = %task.task_type()))]
    pub async fn enqueue(&self, task: NewTask) -> Result<TaskRecord> {
        let record = {
            let mut state = self.state.lock();

            if state.has_active_task_for(&task.node_id) {
                return Err(PipelineError::new(
                    codes::DUPLICATE_ACTIVE_TASK,
                    format!("Entity {} already has an active task", task.node_id),
                ));
            }
            if self.lock_manager.is_locked(&task.node_id) {
                return Err(PipelineError::new(
                    codes::LOCK_HELD,
                    format!("Entity {} is locked", task.node_id),
                ));
            }
            if let Some(category_key) = task.payload.category_lock_key() {
                if self.lock_manager.is_locked(&category_key) {
                    return Err(PipelineError::new(
                        codes::LOCK_HELD,
                        format!("Category lock {category_key} is held"),
                    ));
                }
            }

            let record = task.into_record(Uuid::new_v4().to_string(), Utc::now());
            state.tasks.push(record.clone());
            record
        };

        self.save().await;
        log_task_operation(
            "enqueue",
            &record.id,
            &record.node_id,
            &record.task_type.to_string(),
            &record.state.to_string(),
            None,
        );
        self.events
            .publish(QueueEvent::for_task(QueueEventKind::TaskAdded, &record));
        Ok(record)
    }

    /// Cancel a Pending, Running or Failed task. A Running task's runner is
    /// asked to abort and its eventual result is discarded.
    #[instrument(skip(self))]
    pub async fn cancel(&self, task_id: &str) -> Result<TaskRecord> {
        let (record, was_running) = {
            let mut state = self.state.lock();
            let task = state
                .find_mut(task_id)
                .ok_or_else(|| PipelineError::task_not_found(task_id))?;

            let was_running = task.state == TaskState::Running;
            let was_failed = task.state == TaskState::Failed;
            task.state = TaskStateMachine::determine_target_state(task.state, TaskEvent::Cancel)?;
            let now = Utc::now();
            task.completed_at = Some(now);
            task.updated_at = now;
            self.lock_manager.release_by_task_id(task_id);
            task.locks.clear();
            let record = task.clone();

            state.processing.remove(task_id);
            state.stats.total_cancelled += 1;
            if was_failed {
                state.stats.total_failed = state.stats.total_failed.saturating_sub(1);
            }
            self.trim_history(&mut state);
            (record, was_running)
        };

        if was_running {
            if let Some(runner) = self.runner.get() {
                runner.abort(task_id);
            }
        }

        self.save().await;
        log_task_operation(
            "cancel",
            &record.id,
            &record.node_id,
            &record.task_type.to_string(),
            &record.state.to_string(),
            was_running.then_some("aborted while running"),
        );
        self.events
            .publish(QueueEvent::for_task(QueueEventKind::TaskCancelled, &record));
        Ok(record)
    }

    pub async fn pause(&self) {
        self.set_paused(true).await;
    }

    pub async fn resume(&self) {
        self.set_paused(false).await;
    }

    async fn set_paused(&self, paused: bool) {
        {
            let mut state = self.state.lock();
            if state.paused == paused {
                return;
            }
            state.paused = paused;
        }
        self.save().await;

        let kind = if paused {
            QueueEventKind::QueuePaused
        } else {
            QueueEventKind::QueueResumed
        };
        info!(paused, "🔄 TASK_QUEUE: {kind}");
        self.events.publish(QueueEvent::queue(kind));
    }

    /// Manually retry a Failed task with a fresh attempt counter
    #[instrument(skip(self))]
    pub async fn retry_task(&self, task_id: &str) -> Result<TaskRecord> {
        let record = {
            let mut state = self.state.lock();
            let node_id = state
                .tasks
                .iter()
                .find(|t| t.id == task_id)
                .map(|t| t.node_id.clone())
                .ok_or_else(|| PipelineError::task_not_found(task_id))?;
            if state.has_active_task_for(&node_id) {
                return Err(PipelineError::new(
                    codes::DUPLICATE_ACTIVE_TASK,
                    format!("Entity {node_id} already has an active task"),
                ));
            }

            let task = state
                .find_mut(task_id)
                .ok_or_else(|| PipelineError::task_not_found(task_id))?;
            task.state = TaskStateMachine::determine_target_state(task.state, TaskEvent::Retry)?;
            task.attempt = 0;
            task.started_at = None;
            task.completed_at = None;
            task.updated_at = Utc::now();
            task.clone()
        };

        self.save().await;
        log_task_operation(
            "retry",
            &record.id,
            &record.node_id,
            &record.task_type.to_string(),
            &record.state.to_string(),
            Some("manual retry"),
        );
        self.events
            .publish(QueueEvent::for_task(QueueEventKind::TaskRetrying, &record));
        Ok(record)
    }

    /// Drop every Completed and Cancelled record; returns how many were removed
    pub async fn clear_finished(&self) -> usize {
        let removed = {
            let mut state = self.state.lock();
            let before = state.tasks.len();
            state.tasks.retain(|t| !t.state.is_terminal());
            before - state.tasks.len()
        };
        if removed > 0 {
            self.save().await;
        }
        debug!(removed, "Cleared finished tasks");
        removed
    }

    pub async fn set_concurrency(&self, concurrency: usize) -> Result<()> {
        if concurrency == 0 {
            return Err(PipelineError::new(
                codes::INVALID_CONFIGURATION,
                "Concurrency must be at least 1",
            ));
        }
        self.state.lock().concurrency = concurrency;
        self.save().await;
        info!(concurrency, "🔄 TASK_QUEUE: Concurrency updated");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Scheduling and execution
    // ---------------------------------------------------------------------

    /// One scheduling pass. Returns the id of the task it promoted, if any.
    ///
    /// Re-entrant calls return immediately. Nothing happens while paused,
    /// without a runner, or with the concurrency limit reached.
    pub async fn tick(self: &Arc<Self>) -> Option<String> {
        if self
            .ticking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let _guard = TickGuard(&self.ticking);

        let runner = Arc::clone(self.runner.get()?);
        let promoted = self.promote_next()?;

        self.save().await;
        log_task_operation(
            "start",
            &promoted.id,
            &promoted.node_id,
            &promoted.task_type.to_string(),
            &promoted.state.to_string(),
            None,
        );
        self.events
            .publish(QueueEvent::for_task(QueueEventKind::TaskStarted, &promoted));

        let task_id = promoted.id.clone();
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.execute(promoted, runner).await });
        Some(task_id)
    }

    /// Grant locks to the first eligible Pending task and mark it Running
    fn promote_next(&self) -> Option<TaskRecord> {
        let mut state = self.state.lock();
        if state.paused || state.processing.len() >= state.concurrency {
            return None;
        }

        let index = state.tasks.iter().position(|task| {
            task.state == TaskState::Pending && self.try_acquire_locks(task)
        })?;

        let task = &mut state.tasks[index];
        task.state = match TaskStateMachine::determine_target_state(task.state, TaskEvent::Start) {
            Ok(next) => next,
            Err(e) => {
                self.lock_manager.release_by_task_id(&task.id);
                error!(task_id = %task.id, error = %e, "Refusing to start task");
                return None;
            }
        };
        let now = Utc::now();
        task.attempt += 1;
        task.started_at = Some(now);
        task.completed_at = None;
        task.updated_at = now;
        task.locks = std::iter::once(task.node_id.clone())
            .chain(task.payload.category_lock_key())
            .collect();
        let record = task.clone();

        state.processing.insert(record.id.clone());
        debug!(
            task_id = %record.id,
            attempt = record.attempt,
            running = state.processing.len(),
            "Promoted task"
        );
        Some(record)
    }

    /// Entity lock first, then the category lock; all-or-nothing
    fn try_acquire_locks(&self, task: &TaskRecord) -> bool {
        if self
            .lock_manager
            .acquire(&task.node_id, LockKind::Entity, &task.id)
            .is_err()
        {
            return false;
        }
        if let Some(category_key) = task.payload.category_lock_key() {
            if self
                .lock_manager
                .acquire(&category_key, LockKind::Category, &task.id)
                .is_err()
            {
                self.lock_manager.release(&task.node_id);
                return false;
            }
        }
        true
    }

    async fn execute(self: Arc<Self>, task: TaskRecord, runner: Arc<dyn TaskRunner>) {
        let timeout = self.config.task_timeout();
        let call_runner = Arc::clone(&runner);
        let call_task = task.clone();
        let handle = tokio::spawn(async move { call_runner.run(&call_task).await });

        let outcome = match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(PipelineError::new(
                codes::EXECUTION_PANICKED,
                format!("Task execution aborted: {join_error}"),
            )),
            Err(_) => {
                runner.abort(&task.id);
                Err(PipelineError::new(
                    codes::EXECUTION_TIMEOUT,
                    format!("Task timed out after {}ms", self.config.task_timeout_ms),
                ))
            }
        };

        self.finish(&task.id, outcome).await;
    }

    /// Apply an execution outcome to a Running task
    async fn finish(&self, task_id: &str, outcome: Result<TaskOutput>) {
        let (record, kind) = {
            let mut state = self.state.lock();
            state.processing.remove(task_id);

            let auto_retry = self.config.auto_retry;
            let Some(task) = state.find_mut(task_id) else {
                debug!(task_id, "Discarding result of a task no longer tracked");
                return;
            };
            if task.state != TaskState::Running {
                debug!(task_id, state = %task.state, "Discarding result of a task that left Running");
                return;
            }

            self.lock_manager.release_by_task_id(task_id);
            task.locks.clear();
            let now = Utc::now();
            task.updated_at = now;

            let result = outcome.and_then(|output| task.payload.work.apply_output(output));
            let kind = match result {
                Ok(()) => {
                    task.state = TaskState::Completed;
                    task.completed_at = Some(now);
                    QueueEventKind::TaskCompleted
                }
                Err(error) => {
                    let classification = self.retry_handler.classify(&error.code);
                    task.errors.push(TaskErrorRecord {
                        code: error.code.clone(),
                        message: error.message.clone(),
                        timestamp: now,
                        attempt: task.attempt,
                    });
                    if classification.retryable {
                        task.max_attempts = task.max_attempts.max(classification.max_attempts);
                    }

                    if classification.retryable && auto_retry && task.attempt < task.max_attempts {
                        task.state = TaskState::Pending;
                        task.started_at = None;
                        warn!(
                            task_id,
                            attempt = task.attempt,
                            max_attempts = task.max_attempts,
                            error_code = %error.code,
                            "Task failed, scheduled for retry"
                        );
                        QueueEventKind::TaskRetrying
                    } else {
                        task.state = TaskState::Failed;
                        task.completed_at = Some(now);
                        error!(
                            task_id,
                            attempt = task.attempt,
                            error_code = %error.code,
                            error = %error.message,
                            "Task failed"
                        );
                        QueueEventKind::TaskFailed
                    }
                }
            };
            let record = task.clone();

            match kind {
                QueueEventKind::TaskCompleted => {
                    state.stats.total_processed += 1;
                    state.stats.last_processed_at = Some(now);
                }
                QueueEventKind::TaskFailed => {
                    state.stats.total_processed += 1;
                    state.stats.total_failed += 1;
                    state.stats.last_processed_at = Some(now);
                }
                _ => {}
            }
            self.trim_history(&mut state);
            (record, kind)
        };

        self.save().await;
        log_task_operation(
            "finish",
            &record.id,
            &record.node_id,
            &record.task_type.to_string(),
            &record.state.to_string(),
            record.last_error().map(|e| e.code.as_str()),
        );
        self.events.publish(QueueEvent::for_task(kind, &record));
    }

    /// Keep at most `max_history` finished tasks, dropping the oldest first
    fn trim_history(&self, state: &mut QueueState) {
        // (finished_at, insertion index); the index breaks timestamp ties
        let mut finished: Vec<(chrono::DateTime<Utc>, usize)> = state
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.state.is_finished())
            .map(|(i, t)| (t.completed_at.unwrap_or(t.updated_at), i))
            .collect();
        if finished.len() <= self.config.max_history {
            return;
        }

        finished.sort();
        let excess = finished.len() - self.config.max_history;
        let drop: HashSet<usize> = finished.into_iter().take(excess).map(|(_, i)| i).collect();
        let mut index = 0;
        state.tasks.retain(|_| {
            let keep = !drop.contains(&index);
            index += 1;
            keep
        });
        debug!(trimmed = excess, "Trimmed task history");
    }

    // ---------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------

    /// Current state as a snapshot
    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock();
        QueueSnapshot::new(
            state.tasks.clone(),
            state.concurrency,
            state.paused,
            state.stats.clone(),
            self.lock_manager.active_locks(),
        )
    }

    /// Write the snapshot through the atomic-write primitive. Saves are
    /// serialized; transient I/O failures are retried under the system policy.
    pub async fn persist(&self) -> Result<()> {
        let _chain = self.save_lock.lock().await;
        let body = serde_json::to_string_pretty(&self.snapshot())?;

        let storage = self.storage.as_ref();
        let path = self.config.snapshot_path.as_str();
        let content = body.as_str();
        self.retry_handler
            .execute_with_retry(
                move |_| storage.atomic_write(path, content),
                RetryOptions::default(),
            )
            .await?;
        Ok(())
    }

    /// Persist after a mutation; failures are logged, the mutation stands
    async fn save(&self) {
        if let Err(e) = self.persist().await {
            error!(error_code = %e.code, error = %e.message, "Failed to persist queue snapshot");
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn get_task(&self, task_id: &str) -> Option<TaskRecord> {
        self.state.lock().tasks.iter().find(|t| t.id == task_id).cloned()
    }

    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.state.lock().tasks.clone()
    }

    pub fn tasks_for_node(&self, node_id: &str) -> Vec<TaskRecord> {
        self.state
            .lock()
            .tasks
            .iter()
            .filter(|t| t.node_id == node_id)
            .cloned()
            .collect()
    }

    pub fn tasks_for_pipeline(&self, pipeline_id: &str) -> Vec<TaskRecord> {
        self.state
            .lock()
            .tasks
            .iter()
            .filter(|t| t.pipeline_id() == Some(pipeline_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn concurrency(&self) -> usize {
        self.state.lock().concurrency
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.state.lock();
        let count = |s: TaskState| state.tasks.iter().filter(|t| t.state == s).count();
        QueueStatus {
            pending: count(TaskState::Pending),
            running: count(TaskState::Running),
            completed: count(TaskState::Completed),
            failed: count(TaskState::Failed),
            cancelled: count(TaskState::Cancelled),
            paused: state.paused,
            concurrency: state.concurrency,
            stats: state.stats.clone(),
        }
    }
}
