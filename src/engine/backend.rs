//! Reasoning backend adapter.
//!
//! Wraps a single [`LlmProvider`] call: builds the two-message request,
//! extracts a JSON object from the textual output, and isolates parse
//! failures from transport failures. Malformed output is *recoverable* —
//! the caller sees an empty object, never an error. Transport and auth
//! failures propagate so each stage can apply its own fallback.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::warn;

use crate::error::LlmError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// Bound on raw backend output carried into log events.
const RAW_LOG_MAX_CHARS: usize = 300;

/// JSON-object adapter over an [`LlmProvider`].
#[derive(Clone)]
pub struct JsonBackend {
    provider: Arc<dyn LlmProvider>,
}

impl JsonBackend {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    /// One request/response round trip, output parsed as a JSON object.
    ///
    /// Unparseable output is logged (bounded) and returned as `{}`.
    /// No retries — a single attempt per call.
    pub async fn invoke(
        &self,
        model: &str,
        system_instruction: &str,
        user_prompt: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<Value, LlmError> {
        let request = CompletionRequest::new(
            model,
            vec![
                ChatMessage::system(system_instruction),
                ChatMessage::user(user_prompt),
            ],
        )
        .with_temperature(temperature)
        .with_max_tokens(max_output_tokens);

        let response = self.provider.complete(request).await?;

        let candidate = extract_json_object(&response.content);
        match serde_json::from_str::<Value>(&candidate) {
            Ok(value) if value.is_object() => Ok(value),
            Ok(_) => {
                warn!(
                    provider = self.provider.name(),
                    raw = %truncate_chars(&response.content, RAW_LOG_MAX_CHARS),
                    "Backend returned non-object JSON, treating as empty"
                );
                Ok(json!({}))
            }
            Err(e) => {
                warn!(
                    provider = self.provider.name(),
                    raw = %truncate_chars(&response.content, RAW_LOG_MAX_CHARS),
                    error = %e,
                    "Backend output was not valid JSON, treating as empty"
                );
                Ok(json!({}))
            }
        }
    }
}

/// True when the adapter produced no usable fields.
pub(crate) fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_none_or(|o| o.is_empty())
}

/// Pull a JSON object out of model output.
///
/// JSON mode should hand back a bare object, but models sometimes wrap it
/// in a markdown fence or surrounding prose.
fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

/// Char-boundary-safe truncation for log excerpts.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

// ── Defensive field coercion ────────────────────────────────────────
//
// Backend output is untyped; every consumed field is type-checked and
// defaulted here, at the validation boundary. Raw values never travel
// further downstream.

/// String field, empty when missing or mistyped.
pub(crate) fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// String field with an explicit default for missing/mistyped values.
pub(crate) fn str_field_or(value: &Value, key: &str, default: &str) -> String {
    match value.get(key).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => default.to_string(),
    }
}

/// Optional string field: `null`, missing, mistyped, or empty → `None`.
pub(crate) fn opt_str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Boolean field with a default for missing/mistyped values.
pub(crate) fn bool_field(value: &Value, key: &str, default: bool) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Confidence field clamped to [0, 1].
pub(crate) fn confidence_field(value: &Value, key: &str, default: f32) -> f32 {
    value
        .get(key)
        .and_then(Value::as_f64)
        .map(|c| c as f32)
        .unwrap_or(default)
        .clamp(0.0, 1.0)
}
