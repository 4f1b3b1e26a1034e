//! Language model access used for candidate generation.
//!
//! Any OpenAI-compatible chat-completions endpoint works (OpenAI,
//! OpenRouter, Ollama's `/v1`, vLLM).

mod openai;
mod provider;
mod suggestions;
mod types;

pub use openai::{ApiKeySource, OpenAIProvider};
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use suggestions::LlmSuggestionService;
pub use types::{CompletionResponse, FinishReason, Message, MessageRole, TokenUsage};
