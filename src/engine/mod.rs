//! Decision orchestrator — sequences router → task → meeting stages and
//! assembles the final [`Decision`] record.
//!
//! **Core invariant: no failure inside the engine may abort processing of
//! an email.** Every stage failure has a terminal, documented fallback,
//! and a missing/unconfigured backend short-circuits to a fixed fail-open
//! decision rather than dropping the message.

pub mod backend;
mod meeting;
mod prompt;
mod router;
mod task;

pub use backend::JsonBackend;
pub use meeting::MeetingOutcome;
pub use router::RouterResult;
pub use task::TaskOutcome;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::categories::{CategoryInput, normalize_categories};
use crate::config::{EngineConfig, Stage};
use crate::content::{EmailPayload, prepare_content};
use crate::engine::backend::truncate_chars;
use crate::llm::{LlmProvider, OpenAiProvider};

/// Bound on reasoning text carried into log events.
const REASONING_LOG_MAX_CHARS: usize = 100;

/// Final decision record for one email.
///
/// Constructed fresh per call, never mutated after return. The caller
/// assigns identity when persisting (e.g. keyed by message id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub should_create: bool,
    pub confidence: f32,
    pub title: String,
    pub notes: String,
    pub category: Option<String>,
    pub reasoning: String,
    pub meeting: MeetingOutcome,
}

impl Decision {
    /// Fixed fail-open decision used when the reasoning backend is
    /// unavailable or unconfigured: surface a task built from the raw
    /// payload rather than silently discarding the email.
    fn fail_open(payload: &EmailPayload, reasoning: &str) -> Self {
        let notes = if payload.body.is_empty() {
            payload.snippet.clone()
        } else {
            payload.body.clone()
        };
        Self {
            should_create: true,
            confidence: 0.5,
            title: payload.subject.clone(),
            notes,
            category: None,
            reasoning: reasoning.to_string(),
            meeting: MeetingOutcome::default(),
        }
    }
}

/// Why the reasoning backend is disabled.
///
/// Resolved once at startup and passed in as configuration — never
/// queried ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    /// No reasoning provider is wired into this deployment.
    ProviderUnavailable,
    /// A provider exists but no API key is configured.
    MissingApiKey,
}

impl DisabledReason {
    /// Reasoning string carried on the fail-open decision.
    pub fn reasoning(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable => {
                "reasoning backend not available, using default behavior"
            }
            Self::MissingApiKey => "no API key configured, using default behavior",
        }
    }
}

/// Reasoning backend capability: ready, or disabled with a reason.
pub enum Backend {
    Ready(JsonBackend),
    Disabled(DisabledReason),
}

/// The email-to-action decision engine. Single entry point: [`decide`].
///
/// Stateless between calls — concurrent `decide` invocations for
/// different emails are fully independent.
///
/// [`decide`]: DecisionEngine::decide
pub struct DecisionEngine {
    backend: Backend,
    config: EngineConfig,
}

impl DecisionEngine {
    /// Build an engine from an explicit backend (mock, custom provider,
    /// or deliberately disabled).
    pub fn new(backend: Backend, config: EngineConfig) -> Self {
        Self { backend, config }
    }

    /// Build an engine from an existing provider.
    pub fn with_provider(provider: Arc<dyn LlmProvider>, config: EngineConfig) -> Self {
        Self::new(Backend::Ready(JsonBackend::new(provider)), config)
    }

    /// Wire up the bundled OpenAI provider when a key is configured,
    /// otherwise disable the backend.
    pub fn from_config(config: EngineConfig) -> Self {
        let backend = match &config.api_key {
            Some(key) => Backend::Ready(JsonBackend::new(Arc::new(OpenAiProvider::new(
                key.clone(),
            )))),
            None => Backend::Disabled(DisabledReason::MissingApiKey),
        };
        Self { backend, config }
    }

    /// Decide what to do with one email.
    ///
    /// Linear state machine: availability check → normalize → route →
    /// (conditionally) generate task → (conditionally) extract meeting →
    /// assemble. Infallible by design; every stage failure is caught and
    /// converted to that stage's documented fallback.
    pub async fn decide(
        &self,
        payload: &EmailPayload,
        task_categories: &[CategoryInput],
        calendar_categories: &[CategoryInput],
    ) -> Decision {
        let backend = match &self.backend {
            Backend::Ready(backend) => backend,
            Backend::Disabled(reason) => {
                warn!(
                    subject = %payload.subject,
                    reason = reason.reasoning(),
                    "Classification skipped"
                );
                return Decision::fail_open(payload, reason.reasoning());
            }
        };

        let email = prepare_content(payload);
        let task_cats = normalize_categories(task_categories);
        let cal_cats = normalize_categories(calendar_categories);
        debug!(
            task = task_cats.len(),
            calendar = cal_cats.len(),
            "Normalized category lists"
        );

        info!(subject = %email.subject, sender = %payload.sender, "Routing email");
        let routed = match router::route(
            backend,
            self.config.model_for(Stage::Router),
            &email,
            &payload.sender,
            &task_cats,
            &cal_cats,
        )
        .await
        {
            Ok(routed) => routed,
            Err(e) => {
                error!(
                    subject = %email.subject,
                    error = %e,
                    "Router stage failed, using fail-open default"
                );
                RouterResult::fallback()
            }
        };
        info!(
            subject = %email.subject,
            decision = if routed.should_create_task { "SUCCESS" } else { "SKIPPED" },
            is_meeting = routed.is_meeting,
            confidence = routed.confidence,
            reasoning = %truncate_chars(&routed.reasoning, REASONING_LOG_MAX_CHARS),
            "Email routing completed"
        );

        let task_outcome = if routed.should_create_task {
            match task::generate_task(
                backend,
                self.config.model_for(Stage::Task),
                &email,
                &payload.sender,
                &task_cats,
                &routed,
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        subject = %email.subject,
                        error = %e,
                        "Task stage failed, using fallback"
                    );
                    TaskOutcome::fallback(&email, routed.task_category.as_deref())
                }
            }
        } else {
            TaskOutcome::skipped(&routed)
        };

        let meeting_outcome = if routed.is_meeting {
            match meeting::extract_meeting(
                backend,
                self.config.model_for(Stage::Meeting),
                &email,
                &payload.sender,
                &cal_cats,
                routed.calendar_category.as_deref(),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    // A failed extraction is equivalent to "not a meeting".
                    error!(
                        subject = %email.subject,
                        error = %e,
                        "Meeting stage failed, keeping empty meeting"
                    );
                    MeetingOutcome::default()
                }
            }
        } else {
            MeetingOutcome::default()
        };

        if meeting_outcome.is_meeting {
            info!(
                subject = %email.subject,
                summary = %meeting_outcome.summary,
                start = %meeting_outcome.start_datetime,
                "Meeting detected"
            );
            if meeting_outcome.start_datetime.is_empty() {
                warn!(subject = %email.subject, "Meeting detected without a start time");
            }
        }

        Decision {
            should_create: routed.should_create_task,
            confidence: task_outcome.confidence,
            title: task_outcome.title,
            notes: task_outcome.notes,
            category: task_outcome.category,
            reasoning: if task_outcome.reasoning.is_empty() {
                routed.reasoning
            } else {
                task_outcome.reasoning
            },
            meeting: meeting_outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse};

    /// Scripted provider: pops one canned result per call, errors when
    /// the script runs dry.
    struct ScriptedLlm {
        script: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(script: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(content)) => Ok(CompletionResponse {
                    content,
                    input_tokens: 100,
                    output_tokens: 50,
                }),
                Some(Err(e)) => Err(e),
                None => Err(LlmError::RequestFailed {
                    provider: "scripted".to_string(),
                    reason: "script exhausted".to_string(),
                }),
            }
        }
    }

    fn engine_with(provider: Arc<ScriptedLlm>) -> DecisionEngine {
        DecisionEngine::with_provider(provider, EngineConfig::default())
    }

    fn invoice_payload() -> EmailPayload {
        EmailPayload {
            subject: "Invoice due Friday".into(),
            body: "Please pay $500 by Friday or service is suspended.".into(),
            sender: "billing@vendor.com".into(),
            ..Default::default()
        }
    }

    fn transport_error() -> LlmError {
        LlmError::RequestFailed {
            provider: "scripted".to_string(),
            reason: "connection reset".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_key_fails_open() {
        let engine = DecisionEngine::from_config(EngineConfig::default());
        let decision = engine.decide(&invoice_payload(), &[], &[]).await;

        assert!(decision.should_create);
        assert!((decision.confidence - 0.5).abs() < 1e-6);
        assert_eq!(decision.title, "Invoice due Friday");
        assert_eq!(decision.notes, "Please pay $500 by Friday or service is suspended.");
        assert_eq!(decision.category, None);
        assert_eq!(
            decision.reasoning,
            "no API key configured, using default behavior"
        );
        assert_eq!(decision.meeting, MeetingOutcome::default());
    }

    #[tokio::test]
    async fn disabled_provider_fails_open_with_its_own_reason() {
        let engine = DecisionEngine::new(
            Backend::Disabled(DisabledReason::ProviderUnavailable),
            EngineConfig::default(),
        );
        let payload = EmailPayload {
            subject: "Anything".into(),
            snippet: "snippet text".into(),
            ..Default::default()
        };
        let decision = engine.decide(&payload, &[], &[]).await;

        assert!(decision.should_create);
        // Body empty → notes fall back to the snippet.
        assert_eq!(decision.notes, "snippet text");
        assert_eq!(
            decision.reasoning,
            "reasoning backend not available, using default behavior"
        );
    }

    #[tokio::test]
    async fn end_to_end_task_scenario() {
        let provider = ScriptedLlm::new(vec![
            Ok(r#"{"should_create_task": true, "is_meeting": false, "confidence": 0.9,
                   "reasoning": "payment deadline"}"#
                .to_string()),
            Ok(r#"{"title": "Pay vendor invoice", "notes": "Pay $500 by Friday.",
                   "category": null, "confidence": 0.9, "reasoning": "clear deadline"}"#
                .to_string()),
        ]);
        let engine = engine_with(provider.clone());
        let decision = engine.decide(&invoice_payload(), &[], &[]).await;

        assert!(decision.should_create);
        assert_eq!(decision.title, "Pay vendor invoice");
        assert_eq!(decision.category, None);
        assert!(!decision.meeting.is_meeting);
        // Router + task stages only — no meeting call.
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn conditional_skip_never_invokes_later_stages() {
        let provider = ScriptedLlm::new(vec![Ok(r#"{"should_create_task": false,
               "is_meeting": false, "confidence": 0.2, "reasoning": "newsletter"}"#
            .to_string())]);
        let engine = engine_with(provider.clone());
        let decision = engine.decide(&invoice_payload(), &[], &[]).await;

        assert!(!decision.should_create);
        assert_eq!(decision.notes, "");
        assert_eq!(decision.title, "");
        assert!((decision.confidence - 0.2).abs() < 1e-6);
        assert_eq!(decision.reasoning, "newsletter");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn meeting_scenario_preserves_extracted_fields() {
        let provider = ScriptedLlm::new(vec![
            Ok(r#"{"should_create_task": true, "is_meeting": true,
                   "calendar_category": "Work", "confidence": 0.8,
                   "reasoning": "invite with agenda"}"#
                .to_string()),
            Ok(r#"{"title": "Prepare for sync", "notes": "Review agenda beforehand.",
                   "category": null, "confidence": 0.8, "reasoning": "prep needed"}"#
                .to_string()),
            Ok(r#"{"is_meeting": true, "summary": "Team sync",
                   "start_datetime": "2024-06-01T15:00:00Z", "end_datetime": "",
                   "participants": [], "category": "Work", "confidence": 0.8,
                   "reasoning": "explicit invite"}"#
                .to_string()),
        ]);
        let engine = engine_with(provider.clone());
        let calendar: Vec<CategoryInput> =
            serde_json::from_value(serde_json::json!([{ "name": "Work" }])).unwrap();
        let decision = engine.decide(&invoice_payload(), &[], &calendar).await;

        assert!(decision.meeting.is_meeting);
        assert_eq!(decision.meeting.category.as_deref(), Some("Work"));
        assert_eq!(decision.meeting.start_datetime, "2024-06-01T15:00:00Z");
        assert_eq!(decision.meeting.end_datetime, "");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn router_failure_falls_open_and_continues() {
        // Router errors; task stage still runs and succeeds.
        let provider = ScriptedLlm::new(vec![
            Err(transport_error()),
            Ok(r#"{"title": "Generated anyway", "notes": "n", "category": null,
                   "confidence": 0.7, "reasoning": "recovered"}"#
                .to_string()),
        ]);
        let engine = engine_with(provider.clone());
        let decision = engine.decide(&invoice_payload(), &[], &[]).await;

        // Fail-open router default says create a task.
        assert!(decision.should_create);
        assert_eq!(decision.title, "Generated anyway");
        assert!(!decision.meeting.is_meeting);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn task_failure_uses_subject_and_body_fallback() {
        let provider = ScriptedLlm::new(vec![
            Ok(r#"{"should_create_task": true, "is_meeting": false,
                   "task_category": "Work", "confidence": 0.9, "reasoning": "r"}"#
                .to_string()),
            Err(transport_error()),
        ]);
        let engine = engine_with(provider);
        let decision = engine.decide(&invoice_payload(), &[], &[]).await;

        assert!(decision.should_create);
        assert_eq!(decision.title, "Invoice due Friday");
        assert_eq!(decision.category.as_deref(), Some("Work"));
        assert_eq!(decision.reasoning, "task agent error");
        assert!((decision.confidence - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn meeting_failure_keeps_default_empty_meeting() {
        let provider = ScriptedLlm::new(vec![
            Ok(r#"{"should_create_task": true, "is_meeting": true,
                   "confidence": 0.9, "reasoning": "looks like an invite"}"#
                .to_string()),
            Ok(r#"{"title": "Attend sync", "notes": "Join the call.", "category": null,
                   "confidence": 0.9, "reasoning": "invite"}"#
                .to_string()),
            Err(transport_error()),
        ]);
        let engine = engine_with(provider);
        let decision = engine.decide(&invoice_payload(), &[], &[]).await;

        // Stage isolation: the task-derived decision survives.
        assert!(decision.should_create);
        assert_eq!(decision.title, "Attend sync");
        assert_eq!(decision.meeting, MeetingOutcome::default());
    }

    #[tokio::test]
    async fn malformed_router_output_triggers_fail_open_default() {
        // Adapter turns garbage into {}, router stage reports no usable
        // fields, orchestrator applies the router fallback.
        let provider = ScriptedLlm::new(vec![
            Ok("not json at all".to_string()),
            Ok(r#"{"title": "T", "notes": "N", "category": null,
                   "confidence": 0.6, "reasoning": "ok"}"#
                .to_string()),
        ]);
        let engine = engine_with(provider);
        let decision = engine.decide(&invoice_payload(), &[], &[]).await;

        assert!(decision.should_create);
        assert_eq!(decision.title, "T");
    }

    #[tokio::test]
    async fn task_without_confidence_inherits_router_confidence() {
        let provider = ScriptedLlm::new(vec![
            Ok(r#"{"should_create_task": true, "is_meeting": false,
                   "confidence": 0.9, "reasoning": "payment deadline"}"#
                .to_string()),
            Ok(r#"{"title": "Pay vendor invoice", "notes": "Pay $500 by Friday.",
                   "category": null, "reasoning": "clear deadline"}"#
                .to_string()),
        ]);
        let engine = engine_with(provider);
        let decision = engine.decide(&invoice_payload(), &[], &[]).await;

        assert!(decision.should_create);
        assert!((decision.confidence - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_task_reasoning_falls_back_to_router_reasoning() {
        let provider = ScriptedLlm::new(vec![
            Ok(r#"{"should_create_task": true, "is_meeting": false,
                   "confidence": 0.9, "reasoning": "router says so"}"#
                .to_string()),
            Ok(r#"{"title": "T", "notes": "N", "category": null, "confidence": 0.9}"#
                .to_string()),
        ]);
        let engine = engine_with(provider);
        let decision = engine.decide(&invoice_payload(), &[], &[]).await;

        assert_eq!(decision.reasoning, "router says so");
    }
}
