//! Error types for the decision engine.

/// LLM provider and backend-adapter errors.
///
/// These never escape [`crate::engine::DecisionEngine::decide`] — the
/// orchestrator converts every stage failure into that stage's documented
/// fallback value. They are public so embedders driving
/// [`crate::engine::JsonBackend`] directly can match on them.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}
