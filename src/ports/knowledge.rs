use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorEntry {
    pub node_id: String,
    pub path: String,
    pub embedding: Vec<f32>,
    pub updated_at: DateTime<Utc>,
}

/// Similarity index over note embeddings
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, entry: VectorEntry) -> Result<()>;

    /// Remove an entry; returns whether one existed
    async fn delete(&self, node_id: &str) -> Result<bool>;

    async fn get_entry(&self, node_id: &str) -> Result<Option<VectorEntry>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStatus {
    Pending,
    Dismissed,
    Merged,
}

/// A suspected duplicate between two notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub id: String,
    pub node_a: String,
    pub node_b: String,
    pub similarity: f32,
    pub status: DuplicateStatus,
}

/// Tracks duplicate pairs found by similarity detection
#[async_trait]
pub trait DuplicateManager: Send + Sync {
    /// Compare `embedding` of `node_id` against the index, recording new pairs
    async fn detect(&self, node_id: &str, embedding: &[f32]) -> Result<Vec<DuplicatePair>>;

    async fn update_status(&self, pair_id: &str, status: DuplicateStatus) -> Result<()>;

    async fn remove_pair(&self, pair_id: &str) -> Result<()>;
}

/// Prior file content saved before a destructive write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoSnapshot {
    pub snapshot_id: String,
    pub path: String,
    pub previous_content: String,
    pub pipeline_id: String,
    pub node_id: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait UndoStore: Send + Sync {
    /// Save `previous_content` of `path`; returns the snapshot id
    async fn create_snapshot(
        &self,
        path: &str,
        previous_content: &str,
        pipeline_id: &str,
        node_id: &str,
    ) -> Result<String>;
}
