use crate::constants::codes;
use crate::error::{PipelineError, Result};
use crate::models::{TaskOutput, TaskRecord, TaskType};
use crate::ports::TaskRunner;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Task runner double with per-task-type scripted results.
///
/// One-shot results queued with [`push_result`](Self::push_result) are used
/// first, then the sticky result registered for the task type.
#[derive(Debug)]
pub struct ScriptedRunner {
    queued: Mutex<HashMap<TaskType, VecDeque<Result<TaskOutput>>>>,
    sticky: Mutex<HashMap<TaskType, Result<TaskOutput>>>,
    hold: AtomicBool,
    gate: Semaphore,
    delay: Mutex<Option<Duration>>,
    runs: AtomicU32,
    aborted: Mutex<Vec<String>>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self {
            queued: Mutex::new(HashMap::new()),
            sticky: Mutex::new(HashMap::new()),
            hold: AtomicBool::new(false),
            gate: Semaphore::new(0),
            delay: Mutex::new(None),
            runs: AtomicU32::new(0),
            aborted: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every run of `output`'s task type succeeds with `output`
    pub fn with_output(self, output: TaskOutput) -> Self {
        self.sticky.lock().insert(output.task_type(), Ok(output));
        self
    }

    /// Every run of `task_type` fails with `code`
    pub fn failing(self, task_type: TaskType, code: &str) -> Self {
        self.sticky.lock().insert(
            task_type,
            Err(PipelineError::new(code, format!("scripted {code} failure"))),
        );
        self
    }

    /// Block every run until [`release`](Self::release) is called
    pub fn hold_until_released(self) -> Self {
        self.hold.store(true, Ordering::SeqCst);
        self
    }

    /// Sleep this long inside every run
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    pub fn push_result(&self, task_type: TaskType, result: Result<TaskOutput>) {
        self.queued
            .lock()
            .entry(task_type)
            .or_default()
            .push_back(result);
    }

    pub fn release(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.gate.add_permits(1024);
    }

    pub fn runs(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn aborted(&self) -> Vec<String> {
        self.aborted.lock().clone()
    }

    fn next_result(&self, task_type: TaskType) -> Result<TaskOutput> {
        if let Some(result) = self
            .queued
            .lock()
            .get_mut(&task_type)
            .and_then(VecDeque::pop_front)
        {
            return result;
        }
        self.sticky
            .lock()
            .get(&task_type)
            .cloned()
            .unwrap_or_else(|| {
                Err(PipelineError::new(
                    codes::RESULT_MISMATCH,
                    format!("No scripted result for {task_type}"),
                ))
            })
    }
}

#[async_trait]
impl TaskRunner for ScriptedRunner {
    async fn run(&self, task: &TaskRecord) -> Result<TaskOutput> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                drop(permit);
            }
        }
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.next_result(task.task_type)
    }

    fn abort(&self, task_id: &str) {
        self.aborted.lock().push(task_id.to_string());
    }
}
