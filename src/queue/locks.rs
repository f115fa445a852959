use crate::constants::codes;
use crate::error::{PipelineError, Result};
use crate::ports::{LockKind, LockManager, LockRecord};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Lock table keyed by lock key
#[derive(Debug, Default)]
pub struct InMemoryLockManager {
    locks: DashMap<String, LockRecord>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockManager for InMemoryLockManager {
    fn acquire(&self, key: &str, kind: LockKind, owner_task_id: &str) -> Result<()> {
        match self.locks.entry(key.to_string()) {
            Entry::Occupied(held) if held.get().owner_task_id == owner_task_id => Ok(()),
            Entry::Occupied(held) => Err(PipelineError::new(
                codes::LOCK_HELD,
                format!("Lock {key} is held by task {}", held.get().owner_task_id),
            )),
            Entry::Vacant(slot) => {
                slot.insert(LockRecord {
                    key: key.to_string(),
                    kind,
                    owner_task_id: owner_task_id.to_string(),
                });
                debug!(lock_key = key, task_id = owner_task_id, "Lock acquired");
                Ok(())
            }
        }
    }

    fn release(&self, key: &str) -> bool {
        self.locks.remove(key).is_some()
    }

    fn is_locked(&self, key: &str) -> bool {
        self.locks.contains_key(key)
    }

    fn active_locks(&self) -> Vec<LockRecord> {
        let mut locks: Vec<LockRecord> = self.locks.iter().map(|e| e.value().clone()).collect();
        locks.sort_by(|a, b| a.key.cmp(&b.key));
        locks
    }

    fn restore_locks(&self, locks: Vec<LockRecord>) {
        for lock in locks {
            self.locks.entry(lock.key.clone()).or_insert(lock);
        }
    }

    fn release_by_task_id(&self, task_id: &str) -> Vec<String> {
        let keys: Vec<String> = self
            .locks
            .iter()
            .filter(|e| e.value().owner_task_id == task_id)
            .map(|e| e.key().clone())
            .collect();
        for key in &keys {
            self.locks
                .remove_if(key, |_, lock| lock.owner_task_id == task_id);
        }
        keys
    }

    fn clear(&self) {
        self.locks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_is_exclusive_per_key() {
        let locks = InMemoryLockManager::new();
        locks.acquire("n1", LockKind::Entity, "t1").unwrap();
        locks.acquire("n1", LockKind::Entity, "t1").unwrap();

        let err = locks.acquire("n1", LockKind::Entity, "t2").unwrap_err();
        assert_eq!(err.code, codes::LOCK_HELD);
        assert!(locks.is_locked("n1"));
    }

    #[test]
    fn test_release_by_task_id() {
        let locks = InMemoryLockManager::new();
        locks.acquire("n1", LockKind::Entity, "t1").unwrap();
        locks.acquire("type:theory", LockKind::Category, "t1").unwrap();
        locks.acquire("n2", LockKind::Entity, "t2").unwrap();

        let mut released = locks.release_by_task_id("t1");
        released.sort();
        assert_eq!(released, vec!["n1", "type:theory"]);
        assert_eq!(locks.active_locks().len(), 1);

        locks.clear();
        assert!(locks.active_locks().is_empty());
    }

    #[test]
    fn test_restore_keeps_existing_owner() {
        let locks = InMemoryLockManager::new();
        locks.acquire("n1", LockKind::Entity, "t1").unwrap();

        locks.restore_locks(vec![
            LockRecord {
                key: "n1".to_string(),
                kind: LockKind::Entity,
                owner_task_id: "t9".to_string(),
            },
            LockRecord {
                key: "type:merge".to_string(),
                kind: LockKind::Category,
                owner_task_id: "t2".to_string(),
            },
        ]);

        let active = locks.active_locks();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].owner_task_id, "t1");
        assert_eq!(active[1].key, "type:merge");
    }
}
