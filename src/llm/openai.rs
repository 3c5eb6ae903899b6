//! OpenAI-compatible chat-completions provider.
//!
//! One POST per call with `response_format: {"type": "json_object"}` so
//! the model is constrained to a single JSON object. No retry logic here
//! — a single attempt per call, by contract.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::LlmError;
use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// How much of an error body to carry into the error message.
const ERROR_BODY_MAX_CHARS: usize = 300;

/// Chat-completions client for OpenAI and compatible gateways.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
}

impl OpenAiProvider {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            endpoint: OPENAI_ENDPOINT.to_string(),
        }
    }

    /// Point at an OpenAI-compatible endpoint (proxy, gateway, local model).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&json!({
                "model": request.model,
                "temperature": request.temperature,
                "max_tokens": request.max_tokens,
                "messages": request.messages,
                "response_format": { "type": "json_object" },
            }))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LlmError::AuthFailed {
                provider: "openai".to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_MAX_CHARS).collect();
            return Err(LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("HTTP {status}: {excerpt}"),
            });
        }

        let parsed: ChatApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("malformed chat response: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        Ok(CompletionResponse {
            content: choice.message.content,
            input_tokens: parsed.usage.prompt_tokens,
            output_tokens: parsed.usage.completion_tokens,
        })
    }
}

// Wire shapes for the chat-completions response.

#[derive(Debug, Deserialize)]
struct ChatApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
