//! Queue task records and their typed payloads.

use super::knowledge::{
    EnrichmentData, GeneratedContent, GenerationRequest, GroundingVerdict, KnowledgeType,
    StandardizedConcept,
};
use crate::constants::{codes, retry_limits, CATEGORY_LOCK_PREFIX};
use crate::error::{PipelineError, Result};
use crate::state_machine::TaskState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed task-type vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    Classify,
    Enrich,
    Embed,
    Generate,
    FactCheck,
    ImageGenerate,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Classify => "classify",
            Self::Enrich => "enrich",
            Self::Embed => "embed",
            Self::Generate => "generate",
            Self::FactCheck => "fact-check",
            Self::ImageGenerate => "image-generate",
        };
        write!(f, "{name}")
    }
}

/// Type-specific work description; the `result` slot is filled on completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "kebab-case")]
pub enum TaskWork {
    Classify {
        input: String,
        #[serde(default)]
        result: Option<StandardizedConcept>,
    },
    Enrich {
        standardized: StandardizedConcept,
        #[serde(default)]
        result: Option<EnrichmentData>,
    },
    Embed {
        text: String,
        #[serde(default)]
        result: Option<Vec<f32>>,
    },
    Generate {
        request: GenerationRequest,
        #[serde(default)]
        result: Option<GeneratedContent>,
    },
    FactCheck {
        knowledge_type: KnowledgeType,
        name: String,
        content: GeneratedContent,
        #[serde(default)]
        result: Option<GroundingVerdict>,
    },
    ImageGenerate {
        prompt: String,
        #[serde(default)]
        result: Option<String>,
    },
}

/// Output reported by a task runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TaskOutput {
    Classified(StandardizedConcept),
    Enriched(EnrichmentData),
    Embedded(Vec<f32>),
    Generated(GeneratedContent),
    FactChecked(GroundingVerdict),
    ImageGenerated(String),
}

impl TaskOutput {
    /// Task type whose result slot this output fills
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::Classified(_) => TaskType::Classify,
            Self::Enriched(_) => TaskType::Enrich,
            Self::Embedded(_) => TaskType::Embed,
            Self::Generated(_) => TaskType::Generate,
            Self::FactChecked(_) => TaskType::FactCheck,
            Self::ImageGenerated(_) => TaskType::ImageGenerate,
        }
    }
}

impl TaskWork {
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::Classify { .. } => TaskType::Classify,
            Self::Enrich { .. } => TaskType::Enrich,
            Self::Embed { .. } => TaskType::Embed,
            Self::Generate { .. } => TaskType::Generate,
            Self::FactCheck { .. } => TaskType::FactCheck,
            Self::ImageGenerate { .. } => TaskType::ImageGenerate,
        }
    }

    /// Merge a runner output into the matching result slot
    pub fn apply_output(&mut self, output: TaskOutput) -> Result<()> {
        match (self, output) {
            (Self::Classify { result, .. }, TaskOutput::Classified(value)) => *result = Some(value),
            (Self::Enrich { result, .. }, TaskOutput::Enriched(value)) => *result = Some(value),
            (Self::Embed { result, .. }, TaskOutput::Embedded(value)) => *result = Some(value),
            (Self::Generate { result, .. }, TaskOutput::Generated(value)) => *result = Some(value),
            (Self::FactCheck { result, .. }, TaskOutput::FactChecked(value)) => {
                *result = Some(value)
            }
            (Self::ImageGenerate { result, .. }, TaskOutput::ImageGenerated(value)) => {
                *result = Some(value)
            }
            (work, output) => {
                return Err(PipelineError::new(
                    codes::RESULT_MISMATCH,
                    format!(
                        "Runner returned {output:?} for a {} task",
                        work.task_type()
                    ),
                ))
            }
        }
        Ok(())
    }
}

/// Opaque-to-the-queue payload: owning pipeline, optional category lock and the work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    #[serde(default)]
    pub pipeline_id: Option<String>,
    /// Cross-entity serialization class; locked as `type:<category>` while running
    #[serde(default)]
    pub category: Option<String>,
    pub work: TaskWork,
}

impl TaskPayload {
    pub fn new(work: TaskWork) -> Self {
        Self {
            pipeline_id: None,
            category: None,
            work,
        }
    }

    pub fn category_lock_key(&self) -> Option<String> {
        self.category
            .as_ref()
            .map(|category| format!("{CATEGORY_LOCK_PREFIX}{category}"))
    }
}

/// One entry of a task's ordered error history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskErrorRecord {
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub attempt: u32,
}

/// Durable task record owned by the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub node_id: String,
    pub task_type: TaskType,
    pub state: TaskState,
    pub attempt: u32,
    pub max_attempts: u32,
    pub payload: TaskPayload,
    #[serde(default)]
    pub errors: Vec<TaskErrorRecord>,
    /// Lock keys held while running
    #[serde(default)]
    pub locks: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn pipeline_id(&self) -> Option<&str> {
        self.payload.pipeline_id.as_deref()
    }

    pub fn last_error(&self) -> Option<&TaskErrorRecord> {
        self.errors.last()
    }

    /// Last error as a structured pipeline error, with the full attempt history attached
    pub fn failure(&self) -> PipelineError {
        let history = serde_json::to_value(&self.errors).unwrap_or_default();
        match self.last_error() {
            Some(last) => PipelineError::new(last.code.clone(), last.message.clone()),
            None => PipelineError::internal(format!("Task {} failed without an error", self.id)),
        }
        .with_details(serde_json::json!({ "task_id": self.id, "attempts": history }))
    }
}

/// Enqueue request
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub node_id: String,
    pub payload: TaskPayload,
    pub max_attempts: Option<u32>,
}

impl NewTask {
    pub fn new(node_id: impl Into<String>, work: TaskWork) -> Self {
        Self {
            node_id: node_id.into(),
            payload: TaskPayload::new(work),
            max_attempts: None,
        }
    }

    pub fn for_pipeline(mut self, pipeline_id: impl Into<String>) -> Self {
        self.payload.pipeline_id = Some(pipeline_id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.payload.category = Some(category.into());
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn task_type(&self) -> TaskType {
        self.payload.work.task_type()
    }

    pub(crate) fn into_record(self, id: String, now: DateTime<Utc>) -> TaskRecord {
        TaskRecord {
            id,
            node_id: self.node_id,
            task_type: self.payload.work.task_type(),
            state: TaskState::Pending,
            attempt: 0,
            max_attempts: self.max_attempts.unwrap_or(retry_limits::DEFAULT_TASK).max(1),
            payload: self.payload,
            errors: Vec::new(),
            locks: Vec::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn enrich_work() -> TaskWork {
        TaskWork::Enrich {
            standardized: StandardizedConcept {
                standard_name: "Entropy".to_string(),
                aliases: vec![],
                primary_type: KnowledgeType::Theory,
                core_definition: "Disorder".to_string(),
            },
            result: None,
        }
    }

    #[test]
    fn test_payload_serializes_with_task_type_tag() {
        let payload = TaskPayload::new(enrich_work());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["work"]["task_type"], json!("enrich"));

        let back: TaskPayload = serde_json::from_value(value).unwrap();
        assert_eq!(back.work.task_type(), TaskType::Enrich);
    }

    #[test]
    fn test_apply_output_fills_matching_slot() {
        let mut work = enrich_work();
        work.apply_output(TaskOutput::Enriched(EnrichmentData {
            aliases: vec!["S".to_string()],
            tags: vec![],
        }))
        .unwrap();
        match work {
            TaskWork::Enrich { result, .. } => assert_eq!(result.unwrap().aliases, vec!["S"]),
            other => panic!("unexpected work {other:?}"),
        }
    }

    #[test]
    fn test_apply_output_rejects_mismatch() {
        let mut work = enrich_work();
        let err = work
            .apply_output(TaskOutput::Embedded(vec![0.1]))
            .unwrap_err();
        assert_eq!(err.code, codes::RESULT_MISMATCH);
    }

    #[test]
    fn test_category_lock_key() {
        let task = NewTask::new("n1", enrich_work()).with_category("theory");
        assert_eq!(
            task.payload.category_lock_key().as_deref(),
            Some("type:theory")
        );
        let record = task.into_record("t1".to_string(), Utc::now());
        assert_eq!(record.max_attempts, retry_limits::DEFAULT_TASK);
        assert_eq!(record.state, TaskState::Pending);
    }
}
