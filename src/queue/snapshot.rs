use crate::constants::QUEUE_SNAPSHOT_VERSION;
use crate::models::TaskRecord;
use crate::ports::LockRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate counters carried across restarts.
///
/// `total_processed` counts every finished run, completed or failed. Each
/// task is counted under at most one of `total_failed` and `total_cancelled`:
/// cancelling a Failed task moves it from the first to the second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total_processed: u64,
    pub total_failed: u64,
    pub total_cancelled: u64,
    #[serde(default)]
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// Durable queue state, written after every mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub version: u32,
    pub tasks: Vec<TaskRecord>,
    pub concurrency: usize,
    pub paused: bool,
    #[serde(default)]
    pub stats: QueueStats,
    #[serde(default)]
    pub locks: Vec<LockRecord>,
}

impl QueueSnapshot {
    pub fn new(
        tasks: Vec<TaskRecord>,
        concurrency: usize,
        paused: bool,
        stats: QueueStats,
        locks: Vec<LockRecord>,
    ) -> Self {
        Self {
            version: QUEUE_SNAPSHOT_VERSION,
            tasks,
            concurrency,
            paused,
            stats,
            locks,
        }
    }
}
