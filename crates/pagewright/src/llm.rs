//! Language-model client.
//!
//! Every downstream stage talks to the model through [`ChatModel`], so tests
//! can script completions. The shipped implementation speaks the
//! OpenAI-compatible chat API; pointing `PAGEWRIGHT_LLM_BASE_URL` at an
//! Ollama server covers local models.

use async_trait::async_trait;
use openai_api_rs::v1::api::OpenAIClient;
use openai_api_rs::v1::chat_completion::{
    ChatCompletionMessage, ChatCompletionRequest, Content, MessageRole,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::errors::{AutomationError, Result};

/// Role of one prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
}

/// One role-tagged prompt message.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Token accounting reported by the model.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
    pub total_tokens: i32,
}

/// A completion plus its usage stats.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub usage: TokenUsage,
}

/// Chat-completion interface every pipeline stage depends on.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<ChatReply>;
}

/// OpenAI-compatible chat model.
pub struct OpenAiChatModel {
    client: Mutex<OpenAIClient>,
    model: String,
    temperature: Option<f64>,
}

impl OpenAiChatModel {
    /// Build from the environment: `OPENAI_API_KEY` (required),
    /// `PAGEWRIGHT_LLM_MODEL` (overrides `default_model`) and
    /// `PAGEWRIGHT_LLM_BASE_URL` (OpenAI-compatible endpoint, e.g. Ollama).
    pub fn from_env(default_model: &str) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AutomationError::Llm("OPENAI_API_KEY is not set".to_string()))?;
        let model =
            std::env::var("PAGEWRIGHT_LLM_MODEL").unwrap_or_else(|_| default_model.to_string());

        let mut builder = OpenAIClient::builder().with_api_key(api_key);
        if let Ok(base_url) = std::env::var("PAGEWRIGHT_LLM_BASE_URL") {
            builder = builder.with_endpoint(base_url);
        }
        let client = builder
            .build()
            .map_err(|e| AutomationError::Llm(format!("client setup failed: {e}")))?;

        Ok(Self {
            client: Mutex::new(client),
            model,
            temperature: None,
        })
    }

    /// Sampling temperature for the generation stages that want variety.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<ChatReply> {
        let converted = messages
            .iter()
            .map(|m| ChatCompletionMessage {
                role: match m.role {
                    ChatRole::System => MessageRole::system,
                    ChatRole::User => MessageRole::user,
                },
                content: Content::Text(m.content.clone()),
                name: None,
                tool_calls: None,
                tool_call_id: None,
            })
            .collect();

        let mut request = ChatCompletionRequest::new(self.model.clone(), converted);
        if let Some(temperature) = self.temperature {
            request = request.temperature(temperature);
        }

        let response = self
            .client
            .lock()
            .await
            .chat_completion(request)
            .await
            .map_err(|e| AutomationError::Llm(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| AutomationError::Llm("completion had no content".to_string()))?;

        Ok(ChatReply {
            text,
            usage: TokenUsage {
                prompt_tokens: response.usage.prompt_tokens,
                completion_tokens: response.usage.completion_tokens,
                total_tokens: response.usage.total_tokens,
            },
        })
    }
}

/// Run a fallible async operation up to `times` times, surfacing the last
/// error. The only retry policy in the pipeline.
pub async fn with_retry<T, F, Fut>(times: usize, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last = None;
    for attempt in 1..=times {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(attempt, "attempt failed: {e}");
                last = Some(e);
            }
        }
    }
    Err(last.unwrap_or_else(|| AutomationError::Llm("retry loop never ran".to_string())))
}

/// Parse a completion that was asked to be raw JSON. Models occasionally
/// wrap the payload in a markdown fence anyway; strip it before parsing.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    Ok(serde_json::from_str(body)?)
}
