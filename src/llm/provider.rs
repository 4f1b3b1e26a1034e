use super::types::{CompletionResponse, Message};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Sampling and transport settings for one completion call.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub temperature: f32,
    /// Reply length cap; `None` leaves it to the provider.
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("cannot reach language model: {0}")]
    Connection(String),

    #[error("language model returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unreadable language model reply: {0}")]
    InvalidResponse(String),

    #[error("language model rate limit hit")]
    RateLimited,

    #[error("language model request timed out")]
    Timeout,
}

/// A chat-completions backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError>;

    /// Cheap request proving the endpoint is up and the key is accepted.
    async fn health_check(&self) -> Result<(), LlmError>;
}
