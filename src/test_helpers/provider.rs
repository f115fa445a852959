use crate::constants::codes;
use crate::error::{PipelineError, Result};
use crate::ports::{
    ChatMessage, ChatRequest, ChatResponse, EmbedRequest, EmbedResponse, PromptBuilder,
    ProviderClient,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Provider double replaying scripted chat replies in order.
///
/// Embeddings are deterministic unless an error is queued.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    chat_replies: Mutex<VecDeque<Result<ChatResponse>>>,
    embed_errors: Mutex<VecDeque<PipelineError>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    embed_requests: Mutex<Vec<EmbedRequest>>,
    embed_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chat(&self, response: ChatResponse) {
        self.chat_replies.lock().push_back(Ok(response));
    }

    /// Queue a `stop` reply with `content`
    pub fn push_chat_content(&self, content: impl Into<String>) {
        self.push_chat(ChatResponse {
            content: content.into(),
            tokens_used: 42,
            finish_reason: "stop".to_string(),
        });
    }

    pub fn push_chat_error(&self, error: PipelineError) {
        self.chat_replies.lock().push_back(Err(error));
    }

    pub fn push_embed_error(&self, error: PipelineError) {
        self.embed_errors.lock().push_back(error);
    }

    /// Block embed calls until [`release_embeds`](Self::release_embeds)
    pub fn hold_embeds(&self) {
        *self.embed_gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_embeds(&self) {
        if let Some(gate) = self.embed_gate.lock().take() {
            gate.add_permits(1024);
        }
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().clone()
    }

    pub fn chat_count(&self) -> usize {
        self.chat_requests.lock().len()
    }

    pub fn embed_count(&self) -> usize {
        self.embed_requests.lock().len()
    }
}

/// Deterministic unit-length-ish vector derived from the text
pub fn fake_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let seed = text.bytes().fold(7u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    (0..dimensions.clamp(1, 8))
        .map(|i| ((seed.wrapping_add(i as u32 * 97) % 1000) as f32) / 1000.0)
        .collect()
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.chat_requests.lock().push(request);
        self.chat_replies.lock().pop_front().unwrap_or_else(|| {
            Err(PipelineError::new(
                codes::PROVIDER_UNAVAILABLE,
                "No scripted chat reply left",
            ))
        })
    }

    async fn embed(&self, request: EmbedRequest) -> Result<EmbedResponse> {
        let embedding = fake_embedding(&request.input, request.dimensions);
        self.embed_requests.lock().push(request);
        let gate = self.embed_gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                drop(permit);
            }
        }
        if let Some(error) = self.embed_errors.lock().pop_front() {
            return Err(error);
        }
        Ok(EmbedResponse {
            embedding,
            tokens_used: 8,
        })
    }
}

/// Prompt builder rendering the template id as the system message and the
/// variables as the user message
#[derive(Debug, Default)]
pub struct StaticPromptBuilder {
    missing: Mutex<HashSet<String>>,
}

impl StaticPromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `template_id` as missing or disabled
    pub fn without(self, template_id: &str) -> Self {
        self.missing.lock().insert(template_id.to_string());
        self
    }
}

impl PromptBuilder for StaticPromptBuilder {
    fn build(&self, template_id: &str, variables: &Value) -> Result<Vec<ChatMessage>> {
        if !self.has_template(template_id) {
            return Err(PipelineError::new(
                codes::TEMPLATE_MISSING,
                format!("Template {template_id} is missing"),
            ));
        }
        Ok(vec![
            ChatMessage::system(template_id),
            ChatMessage::user(variables.to_string()),
        ])
    }

    fn resolve_template_id(&self, base: &str, knowledge_type: Option<&str>) -> String {
        match knowledge_type {
            Some(kind) => format!("{base}-{kind}"),
            None => base.to_string(),
        }
    }

    fn has_template(&self, template_id: &str) -> bool {
        !self.missing.lock().contains(template_id)
    }
}
