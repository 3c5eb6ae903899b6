//! LLM provider abstraction.
//!
//! The engine talks to its reasoning backend through the [`LlmProvider`]
//! trait so tests (and embedders with their own transport) can substitute
//! a mock without conditional wiring. The bundled implementation is
//! [`OpenAiProvider`], a JSON-mode chat-completions client.

pub mod openai;

pub use openai::OpenAiProvider;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::LlmError;

/// A single chat message.
#[derive(Debug, Clone, Serialize)]
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

/// A completion request: one round trip, JSON-object output.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: 512,
            temperature: 0.2,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Response from a completion call.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Raw textual output (expected to be a JSON object, not guaranteed).
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// A reasoning backend capable of one request/response round trip.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error context.
    fn name(&self) -> &str;

    /// Perform a single completion. Transport and authentication failures
    /// surface as errors; content is returned as-is, unparsed.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}
