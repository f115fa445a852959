use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// Ask the provider for a JSON object response
    #[serde(default)]
    pub json_mode: bool,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub tokens_used: u32,
    /// `stop`, `length`, ...
    pub finish_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub model: String,
    pub input: String,
    pub dimensions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embedding: Vec<f32>,
    pub tokens_used: u32,
}

/// AI provider client
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse>;
}

/// Renders prompt templates into chat messages
pub trait PromptBuilder: Send + Sync {
    /// Render `template_id` with `variables`; a missing template is `E4002`
    fn build(&self, template_id: &str, variables: &Value) -> Result<Vec<ChatMessage>>;

    /// Template to use for `base` in the context of `knowledge_type`, e.g. a
    /// type-specific generation template
    fn resolve_template_id(&self, base: &str, knowledge_type: Option<&str>) -> String;

    /// Whether the template exists and is enabled
    fn has_template(&self, template_id: &str) -> bool;
}
