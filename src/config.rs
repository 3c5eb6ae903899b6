//! Engine configuration.

use secrecy::SecretString;

/// Shared default model when no per-stage override is set.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// The three reasoning stages, each with an independently overridable model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Router,
    Task,
    Meeting,
}

impl Stage {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Router => "router",
            Self::Task => "task",
            Self::Meeting => "meeting",
        }
    }
}

/// Decision engine configuration.
///
/// The API key and model identifiers are ambient configuration — resolved
/// once at startup and passed into the engine, never queried ad hoc.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reasoning backend credential. `None` disables the backend and the
    /// engine falls back to its fail-open default decision.
    pub api_key: Option<SecretString>,
    /// Model used for any stage without an override.
    pub default_model: String,
    /// Router stage override.
    pub router_model: Option<String>,
    /// Task generation stage override.
    pub task_model: Option<String>,
    /// Meeting extraction stage override.
    pub meeting_model: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            router_model: None,
            task_model: None,
            meeting_model: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment.
    ///
    /// `OPENAI_API_KEY` and `OPENAI_MODEL` follow the provider convention;
    /// `TRIAGE_ROUTER_MODEL`, `TRIAGE_TASK_MODEL`, and
    /// `TRIAGE_CALENDAR_MODEL` override individual stages.
    pub fn from_env() -> Self {
        Self {
            api_key: env_nonempty("OPENAI_API_KEY").map(SecretString::from),
            default_model: env_nonempty("OPENAI_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            router_model: env_nonempty("TRIAGE_ROUTER_MODEL"),
            task_model: env_nonempty("TRIAGE_TASK_MODEL"),
            meeting_model: env_nonempty("TRIAGE_CALENDAR_MODEL"),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Model identifier for a stage, falling back to the shared default.
    pub fn model_for(&self, stage: Stage) -> &str {
        let overridden = match stage {
            Stage::Router => self.router_model.as_deref(),
            Stage::Task => self.task_model.as_deref(),
            Stage::Meeting => self.meeting_model.as_deref(),
        };
        overridden.unwrap_or(&self.default_model)
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
