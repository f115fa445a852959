// State machine module for queue tasks and pipeline stages
//
// Transition tables are pure functions so the queue and the orchestrator can
// validate every state change before mutating their stores.

pub mod events;
pub mod pipeline_state_machine;
pub mod states;
pub mod task_state_machine;

// Re-export main types for convenient access
pub use events::TaskEvent;
pub use pipeline_state_machine::PipelineStateMachine;
pub use states::{PipelineStage, TaskState, WorkflowKind};
pub use task_state_machine::TaskStateMachine;
