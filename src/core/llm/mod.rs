pub mod openai;

use anyhow::Result;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ChatMessage {
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

/// Completion capability injected into the generator, the interpreter and
/// the casual-conversation path. One real implementation (OpenAI-compatible
/// chat completions) plus scripted fakes in tests, so no component ever
/// talks to the network to be unit-tested.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Execute a chat completion and return the assistant text.
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;
}
