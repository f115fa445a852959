use crate::constants::codes;
use crate::error::{PipelineError, Result};
use crate::ports::StorageAdapter;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// In-memory [`StorageAdapter`] with fault injection
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<BTreeMap<String, String>>,
    atomic_writes: AtomicUsize,
    failing_writes: AtomicU32,
    corrupt_writes: AtomicU32,
    write_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, content: &str) {
        self.files.lock().insert(path.to_string(), content.to_string());
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files.lock().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }

    /// Number of successful atomic writes
    pub fn atomic_write_count(&self) -> usize {
        self.atomic_writes.load(Ordering::SeqCst)
    }

    /// Make the next `n` atomic writes fail with a storage I/O error
    pub fn fail_next_writes(&self, n: u32) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` atomic writes fail read-back verification
    pub fn corrupt_next_writes(&self, n: u32) {
        self.corrupt_writes.store(n, Ordering::SeqCst);
    }

    /// Block atomic writes until [`release_writes`](Self::release_writes)
    pub fn hold_atomic_writes(&self) {
        *self.write_gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_writes(&self) {
        if let Some(gate) = self.write_gate.lock().take() {
            gate.add_permits(1024);
        }
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn read(&self, path: &str) -> Result<String> {
        self.get(path).ok_or_else(|| {
            PipelineError::new(codes::FILE_NOT_FOUND, format!("{path} does not exist"))
        })
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        self.insert(path, content);
        Ok(())
    }

    async fn atomic_write(&self, path: &str, content: &str) -> Result<()> {
        let gate = self.write_gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                drop(permit);
            }
        }
        if Self::take(&self.failing_writes) {
            return Err(PipelineError::storage(format!("Injected write failure for {path}")));
        }
        if Self::take(&self.corrupt_writes) {
            return Err(PipelineError::new(
                codes::WRITE_VERIFICATION_FAILED,
                format!("Injected read-back mismatch for {path}"),
            ));
        }
        self.insert(path, content);
        self.atomic_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.lock().contains_key(path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.files.lock().remove(path);
        Ok(())
    }

    async fn ensure_dir(&self, _path: &str) -> Result<()> {
        Ok(())
    }
}
