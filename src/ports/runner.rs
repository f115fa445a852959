use crate::error::Result;
use crate::models::{TaskOutput, TaskRecord};
use async_trait::async_trait;

/// Executes queued tasks on behalf of the [`TaskQueue`](crate::queue::TaskQueue)
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Run one attempt of `task`. The returned output is merged into the
    /// task payload's result slot.
    async fn run(&self, task: &TaskRecord) -> Result<TaskOutput>;

    /// Request cooperative abort; the in-flight call is not force-terminated
    fn abort(&self, task_id: &str);
}
