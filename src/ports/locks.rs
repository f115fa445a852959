use crate::error::Result;
use serde::{Deserialize, Serialize};

/// What a lock key protects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// A single note, keyed by entity id
    Entity,
    /// Every note of a class, keyed `type:<category>`
    Category,
}

/// A held lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub key: String,
    pub kind: LockKind,
    pub owner_task_id: String,
}

/// Mutual exclusion for running tasks.
///
/// All operations are synchronous: the queue acquires locks while it already
/// holds its own task-store guard, and lock bookkeeping never blocks on I/O.
pub trait LockManager: Send + Sync {
    /// Acquire `key` for `owner_task_id`; fails with `E1006` when held by another owner
    fn acquire(&self, key: &str, kind: LockKind, owner_task_id: &str) -> Result<()>;

    /// Release `key`; returns whether a lock was removed
    fn release(&self, key: &str) -> bool;

    fn is_locked(&self, key: &str) -> bool;

    fn active_locks(&self) -> Vec<LockRecord>;

    /// Re-install persisted locks, replacing nothing that is already held
    fn restore_locks(&self, locks: Vec<LockRecord>);

    /// Release every lock owned by `task_id`; returns the released keys
    fn release_by_task_id(&self, task_id: &str) -> Vec<String>;

    fn clear(&self);
}
