// Test Helpers Module - In-memory collaborators
//
// Doubles for every port so unit and integration tests can drive the queue and
// the orchestrator deterministically, without a filesystem or an AI provider.

pub mod knowledge;
pub mod provider;
pub mod runner;
pub mod storage;

pub use knowledge::{RecordingDuplicateManager, RecordingUndoStore, RecordingVectorIndex};
pub use provider::{fake_embedding, ScriptedProvider, StaticPromptBuilder};
pub use runner::ScriptedRunner;
pub use storage::MemoryStorage;
