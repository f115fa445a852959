use super::{events::TaskEvent, states::TaskState};
use crate::constants::codes;
use crate::error::{PipelineError, Result};

/// Transition table for queue tasks
///
/// ```text
/// Pending --Start--> Running --Complete--> Completed
///                    Running --Requeue---> Pending
///                    Running --Fail------> Failed --Retry--> Pending
/// {Pending, Running, Failed} --Cancel--> Cancelled
/// Running --Recover--> Pending   (startup only)
/// ```
pub struct TaskStateMachine;

impl TaskStateMachine {
    /// Determine the target state based on current state and event
    pub fn determine_target_state(current: TaskState, event: TaskEvent) -> Result<TaskState> {
        let target = match (current, event) {
            (TaskState::Pending, TaskEvent::Start) => TaskState::Running,

            (TaskState::Running, TaskEvent::Complete) => TaskState::Completed,
            (TaskState::Running, TaskEvent::Requeue) => TaskState::Pending,
            (TaskState::Running, TaskEvent::Fail) => TaskState::Failed,
            (TaskState::Running, TaskEvent::Recover) => TaskState::Pending,

            (TaskState::Failed, TaskEvent::Retry) => TaskState::Pending,

            (TaskState::Pending | TaskState::Running | TaskState::Failed, TaskEvent::Cancel) => {
                TaskState::Cancelled
            }

            (from, event) => {
                return Err(PipelineError::new(
                    codes::ILLEGAL_TASK_TRANSITION,
                    format!(
                        "Cannot apply '{}' to a task in state '{from}'",
                        event.event_type()
                    ),
                ))
            }
        };

        Ok(target)
    }
}
