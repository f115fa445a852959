use crate::constants::codes;
use crate::error::{PipelineError, Result};
use crate::ports::{
    DuplicateManager, DuplicatePair, DuplicateStatus, UndoSnapshot, UndoStore, VectorEntry,
    VectorIndex,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct RecordingVectorIndex {
    entries: Mutex<HashMap<String, VectorEntry>>,
    upserts: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
}

impl RecordingVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node ids passed to `upsert`, in call order
    pub fn upserts(&self) -> Vec<String> {
        self.upserts.lock().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().clone()
    }

    pub fn entry(&self, node_id: &str) -> Option<VectorEntry> {
        self.entries.lock().get(node_id).cloned()
    }

    pub fn seed(&self, entry: VectorEntry) {
        self.entries.lock().insert(entry.node_id.clone(), entry);
    }
}

#[async_trait]
impl VectorIndex for RecordingVectorIndex {
    async fn upsert(&self, entry: VectorEntry) -> Result<()> {
        self.upserts.lock().push(entry.node_id.clone());
        self.entries.lock().insert(entry.node_id.clone(), entry);
        Ok(())
    }

    async fn delete(&self, node_id: &str) -> Result<bool> {
        self.deletes.lock().push(node_id.to_string());
        Ok(self.entries.lock().remove(node_id).is_some())
    }

    async fn get_entry(&self, node_id: &str) -> Result<Option<VectorEntry>> {
        Ok(self.entries.lock().get(node_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct RecordingDuplicateManager {
    pairs: Mutex<HashMap<String, DuplicatePair>>,
    detections: Mutex<Vec<(String, Vec<f32>)>>,
    removed: Mutex<Vec<String>>,
    fail_detection: AtomicBool,
}

impl RecordingDuplicateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, pair: DuplicatePair) {
        self.pairs.lock().insert(pair.id.clone(), pair);
    }

    pub fn pair(&self, pair_id: &str) -> Option<DuplicatePair> {
        self.pairs.lock().get(pair_id).cloned()
    }

    /// Node ids detection ran for
    pub fn detections(&self) -> Vec<String> {
        self.detections.lock().iter().map(|(node_id, _)| node_id.clone()).collect()
    }

    /// Embedding passed to the latest detection for `node_id`
    pub fn detected_embedding(&self, node_id: &str) -> Option<Vec<f32>> {
        self.detections
            .lock()
            .iter()
            .rev()
            .find(|(id, _)| id == node_id)
            .map(|(_, embedding)| embedding.clone())
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().clone()
    }

    pub fn set_fail_detection(&self, fail: bool) {
        self.fail_detection.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DuplicateManager for RecordingDuplicateManager {
    async fn detect(&self, node_id: &str, embedding: &[f32]) -> Result<Vec<DuplicatePair>> {
        self.detections
            .lock()
            .push((node_id.to_string(), embedding.to_vec()));
        if self.fail_detection.load(Ordering::SeqCst) {
            return Err(PipelineError::new(
                codes::PROVIDER_UNAVAILABLE,
                "Similarity backend unavailable",
            ));
        }
        Ok(self
            .pairs
            .lock()
            .values()
            .filter(|p| p.node_a == node_id || p.node_b == node_id)
            .cloned()
            .collect())
    }

    async fn update_status(&self, pair_id: &str, status: DuplicateStatus) -> Result<()> {
        let mut pairs = self.pairs.lock();
        let pair = pairs.get_mut(pair_id).ok_or_else(|| {
            PipelineError::new(codes::INVARIANT_BROKEN, format!("Unknown pair {pair_id}"))
        })?;
        pair.status = status;
        Ok(())
    }

    async fn remove_pair(&self, pair_id: &str) -> Result<()> {
        self.removed.lock().push(pair_id.to_string());
        self.pairs.lock().remove(pair_id);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingUndoStore {
    snapshots: Mutex<Vec<UndoSnapshot>>,
}

impl RecordingUndoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<UndoSnapshot> {
        self.snapshots.lock().clone()
    }
}

#[async_trait]
impl UndoStore for RecordingUndoStore {
    async fn create_snapshot(
        &self,
        path: &str,
        previous_content: &str,
        pipeline_id: &str,
        node_id: &str,
    ) -> Result<String> {
        let mut snapshots = self.snapshots.lock();
        let snapshot_id = format!("snap-{}", snapshots.len() + 1);
        snapshots.push(UndoSnapshot {
            snapshot_id: snapshot_id.clone(),
            path: path.to_string(),
            previous_content: previous_content.to_string(),
            pipeline_id: pipeline_id.to_string(),
            node_id: node_id.to_string(),
            created_at: Utc::now(),
        });
        Ok(snapshot_id)
    }
}
