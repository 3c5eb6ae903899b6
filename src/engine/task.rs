//! Task generation stage — produces title/notes/category/confidence for
//! an email the router flagged as task-worthy.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::categories::Category;
use crate::content::EmailContent;
use crate::engine::backend::{
    JsonBackend, confidence_field, is_empty_object, opt_str_field, str_field, str_field_or,
    truncate_chars,
};
use crate::engine::prompt::{JSON_ONLY_INSTRUCTION, category_block, email_block, exact_category_rule};
use crate::engine::router::RouterResult;
use crate::error::LlmError;

const TASK_MAX_TOKENS: u32 = 500;
const TASK_TEMPERATURE: f32 = 0.3;

/// Receipt caps — the prompt asks for less, these are the hard limits.
const TITLE_MAX_CHARS: usize = 200;
const NOTES_MAX_CHARS: usize = 2000;
const REASONING_MAX_CHARS: usize = 500;

/// Generated task fields for one email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub title: String,
    pub notes: String,
    pub category: Option<String>,
    pub confidence: f32,
    pub reasoning: String,
}

impl TaskOutcome {
    /// Stage fallback when the backend call fails: the raw subject and
    /// body stand in for generated fields.
    pub(crate) fn fallback(email: &EmailContent, suggested_category: Option<&str>) -> Self {
        Self {
            title: email.subject.clone(),
            notes: email.body_or_snippet().to_string(),
            category: suggested_category.map(String::from),
            confidence: 0.5,
            reasoning: "task agent error".to_string(),
        }
    }

    /// Placeholder when the router decided against a task and this stage
    /// was skipped entirely.
    pub(crate) fn skipped(router: &RouterResult) -> Self {
        Self {
            title: String::new(),
            notes: String::new(),
            category: router.task_category.clone(),
            confidence: router.confidence,
            reasoning: router.reasoning.clone(),
        }
    }
}

/// Generate task fields. Invoked only when the router said to create one.
///
/// A response missing `confidence` inherits the router's value rather
/// than a fixed default — the router already scored this email.
pub(crate) async fn generate_task(
    backend: &JsonBackend,
    model: &str,
    email: &EmailContent,
    sender: &str,
    task_categories: &[Category],
    router: &RouterResult,
) -> Result<TaskOutcome, LlmError> {
    let system = task_system_prompt();
    let user = task_user_prompt(email, sender, task_categories, router.task_category.as_deref());
    let value = backend
        .invoke(model, &system, &user, TASK_MAX_TOKENS, TASK_TEMPERATURE)
        .await?;
    if is_empty_object(&value) {
        return Err(LlmError::InvalidResponse(
            "task stage produced no usable fields".to_string(),
        ));
    }
    Ok(parse_task_response(&value, email, router.confidence))
}

fn task_system_prompt() -> String {
    format!(
        "{JSON_ONLY_INSTRUCTION}\n\n\
         You turn an email into a task record. Respond with exactly this JSON shape:\n\
         {{\"title\": \"...\", \"notes\": \"...\", \"category\": \"name or null\", \
         \"confidence\": 0.0-1.0, \"reasoning\": \"brief explanation\"}}\n\n\
         For the title: make it actionable (start with a verb if appropriate), keep it \
         under 60 characters, and remove \"RE:\", \"FWD:\" and similar prefixes.\n\
         For the notes: 2-4 sentences with the key details, dates, or requirements \
         extracted from the email body."
    )
}

fn task_user_prompt(
    email: &EmailContent,
    sender: &str,
    task_categories: &[Category],
    suggested_category: Option<&str>,
) -> String {
    let mut prompt = format!(
        "{}\n{}\n",
        category_block("Task", task_categories),
        exact_category_rule("category", "Task")
    );
    if let Some(suggested) = suggested_category {
        prompt.push_str(&format!(
            "A first-pass classifier suggested the category \"{suggested}\" — prefer it \
             if it fits.\n"
        ));
    }
    prompt.push('\n');
    prompt.push_str(&email_block(email, sender));
    prompt
}

fn parse_task_response(value: &Value, email: &EmailContent, router_confidence: f32) -> TaskOutcome {
    TaskOutcome {
        title: truncate_chars(&str_field_or(value, "title", &email.subject), TITLE_MAX_CHARS),
        notes: truncate_chars(
            &str_field_or(value, "notes", email.body_or_snippet()),
            NOTES_MAX_CHARS,
        ),
        category: opt_str_field(value, "category"),
        confidence: confidence_field(value, "confidence", router_confidence),
        reasoning: truncate_chars(&str_field(value, "reasoning"), REASONING_MAX_CHARS),
    }
}
