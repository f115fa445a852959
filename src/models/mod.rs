//! # Models
//!
//! Plain data types shared by the queue, the task runner and the orchestrator:
//! knowledge-note artifacts and durable task records.

pub mod knowledge;
pub mod task;

pub use knowledge::{
    EnrichmentData, FieldSpec, GeneratedContent, GenerationMode, GenerationRequest,
    GroundingVerdict, KnowledgeType, StandardizedConcept,
};
pub use task::{
    NewTask, TaskErrorRecord, TaskOutput, TaskPayload, TaskRecord, TaskType, TaskWork,
};
