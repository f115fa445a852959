//! # Provider Task Runner
//!
//! The production [`TaskRunner`]: renders the prompt for a task's work,
//! calls the AI provider and parses the reply into a typed [`TaskOutput`].
//!
//! Provider failures keep their own codes so the queue's retry policy can
//! classify them; output problems map into the model-output range
//! (`E2301` unparseable, `E2302` truncated, `E2303` missing schema fields).

use crate::config::PipelineConfig;
use crate::constants::{codes, templates};
use crate::error::{PipelineError, Result};
use crate::models::{
    EnrichmentData, GeneratedContent, GenerationMode, GenerationRequest, GroundingVerdict,
    StandardizedConcept, TaskOutput, TaskRecord, TaskWork,
};
use crate::pipeline::response_parser::parse_structured;
use crate::ports::{ChatRequest, EmbedRequest, PromptBuilder, ProviderClient, TaskRunner};
use async_trait::async_trait;
use dashmap::DashSet;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct ProviderTaskRunner {
    provider: Arc<dyn ProviderClient>,
    prompts: Arc<dyn PromptBuilder>,
    config: PipelineConfig,
    /// Task ids whose in-flight result must be discarded
    aborted: DashSet<String>,
}

impl std::fmt::Debug for ProviderTaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderTaskRunner")
            .field("chat_model", &self.config.chat_model)
            .field("aborted", &self.aborted.len())
            .finish()
    }
}

impl ProviderTaskRunner {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        prompts: Arc<dyn PromptBuilder>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            provider,
            prompts,
            config,
            aborted: DashSet::new(),
        }
    }

    /// Render `template_id`, call chat and return the raw reply
    async fn complete(&self, template_id: &str, variables: Value) -> Result<String> {
        let messages = self.prompts.build(template_id, &variables)?;
        let response = self
            .provider
            .chat(ChatRequest {
                model: self.config.chat_model.clone(),
                messages,
                json_mode: true,
                temperature: None,
            })
            .await?;

        debug!(
            template_id,
            tokens_used = response.tokens_used,
            finish_reason = %response.finish_reason,
            "Provider chat completed"
        );
        if response.finish_reason == "length" {
            return Err(PipelineError::new(
                codes::MODEL_OUTPUT_INCOMPLETE,
                "Generation stopped at the token limit",
            ));
        }
        Ok(response.content)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedContent> {
        let template_id = match request.mode {
            GenerationMode::Create => self
                .prompts
                .resolve_template_id(templates::GENERATE, Some(request.knowledge_type.slug())),
            GenerationMode::Improve => templates::IMPROVE.to_string(),
            GenerationMode::Merge => templates::MERGE.to_string(),
        };

        let mut variables = serde_json::to_value(request)?;
        if let Value::Object(map) = &mut variables {
            let schema: Vec<&str> = request
                .knowledge_type
                .fields()
                .iter()
                .map(|f| f.key)
                .collect();
            map.insert("fields".to_string(), json!(schema));
        }

        let raw = self.complete(&template_id, variables).await?;
        let fields: Map<String, Value> = parse_structured(&raw)?;
        let content = GeneratedContent::new(fields);

        let missing = content.missing_fields(request.knowledge_type);
        if !missing.is_empty() {
            return Err(PipelineError::new(
                codes::MODEL_OUTPUT_MISSING_FIELDS,
                format!("Generated content is missing: {}", missing.join(", ")),
            )
            .with_details(json!({ "missing": missing })));
        }
        Ok(content)
    }

    async fn dispatch(&self, work: &TaskWork) -> Result<TaskOutput> {
        match work {
            TaskWork::Classify { input, .. } => {
                let raw = self
                    .complete(templates::CLASSIFY, json!({ "input": input }))
                    .await?;
                let concept: StandardizedConcept = parse_structured(&raw)?;
                Ok(TaskOutput::Classified(concept))
            }
            TaskWork::Enrich { standardized, .. } => {
                let raw = self
                    .complete(templates::ENRICH, serde_json::to_value(standardized)?)
                    .await?;
                let enrichment: EnrichmentData = parse_structured(&raw)?;
                Ok(TaskOutput::Enriched(enrichment))
            }
            TaskWork::Embed { text, .. } => {
                let response = self
                    .provider
                    .embed(EmbedRequest {
                        model: self.config.embedding_model.clone(),
                        input: text.clone(),
                        dimensions: self.config.embedding_dimensions,
                    })
                    .await?;
                Ok(TaskOutput::Embedded(response.embedding))
            }
            TaskWork::Generate { request, .. } => {
                Ok(TaskOutput::Generated(self.generate(request).await?))
            }
            TaskWork::FactCheck {
                knowledge_type,
                name,
                content,
                ..
            } => {
                let raw = self
                    .complete(
                        templates::GROUND,
                        json!({
                            "knowledge_type": knowledge_type,
                            "name": name,
                            "content": content,
                        }),
                    )
                    .await?;
                let verdict: GroundingVerdict = parse_structured(&raw)?;
                Ok(TaskOutput::FactChecked(verdict))
            }
            TaskWork::ImageGenerate { .. } => Err(PipelineError::new(
                codes::INVALID_CONFIGURATION,
                "Image generation is not supported by the text provider",
            )),
        }
    }
}

#[async_trait]
impl TaskRunner for ProviderTaskRunner {
    #[instrument(skip(self, task), fields(task_id = %task.id, task_type = %task.task_type, attempt = task.attempt))]
    async fn run(&self, task: &TaskRecord) -> Result<TaskOutput> {
        // A flag left by an earlier, timed-out attempt does not apply to this one
        self.aborted.remove(&task.id);

        let result = self.dispatch(&task.payload.work).await;

        if self.aborted.remove(&task.id).is_some() {
            info!(task_id = %task.id, "Discarding result of an aborted task");
            return Err(PipelineError::user_cancelled());
        }
        result
    }

    fn abort(&self, task_id: &str) {
        self.aborted.insert(task_id.to_string());
    }
}
