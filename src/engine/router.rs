//! Router stage — first-pass classifier deciding task-worthiness and
//! meeting-ness, with best-fit category suggestions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::categories::Category;
use crate::content::EmailContent;
use crate::engine::backend::{
    JsonBackend, bool_field, confidence_field, is_empty_object, opt_str_field, str_field,
};
use crate::engine::prompt::{JSON_ONLY_INSTRUCTION, category_block, email_block, exact_category_rule};
use crate::error::LlmError;

/// Output is compact and categorical — keep the call tight.
const ROUTER_MAX_TOKENS: u32 = 250;
const ROUTER_TEMPERATURE: f32 = 0.1;

/// Router classification for one email.
///
/// Category fields, when set, are expected to exactly match a name from
/// the supplied lists. That contract is instructional: it is stated in
/// the prompt but not enforced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterResult {
    pub should_create_task: bool,
    pub is_meeting: bool,
    pub task_category: Option<String>,
    pub calendar_category: Option<String>,
    pub confidence: f32,
    pub reasoning: String,
}

impl RouterResult {
    /// Fail-open default: surface a task rather than silently drop the
    /// email when routing is unavailable.
    pub fn fallback() -> Self {
        Self {
            should_create_task: true,
            is_meeting: false,
            task_category: None,
            calendar_category: None,
            confidence: 0.5,
            reasoning: "router error".to_string(),
        }
    }
}

/// Classify an email into task/meeting with category suggestions.
pub(crate) async fn route(
    backend: &JsonBackend,
    model: &str,
    email: &EmailContent,
    sender: &str,
    task_categories: &[Category],
    calendar_categories: &[Category],
) -> Result<RouterResult, LlmError> {
    let system = router_system_prompt();
    let user = router_user_prompt(email, sender, task_categories, calendar_categories);
    let value = backend
        .invoke(model, &system, &user, ROUTER_MAX_TOKENS, ROUTER_TEMPERATURE)
        .await?;
    if is_empty_object(&value) {
        return Err(LlmError::InvalidResponse(
            "router produced no usable fields".to_string(),
        ));
    }
    Ok(parse_router_response(&value))
}

fn router_system_prompt() -> String {
    format!(
        "{JSON_ONLY_INSTRUCTION}\n\n\
         You route incoming emails. Decide whether an email warrants creating a task, \
         and independently whether it is a meeting invitation.\n\n\
         Respond with exactly this JSON shape:\n\
         {{\"should_create_task\": true/false, \"is_meeting\": true/false, \
         \"task_category\": \"name or null\", \"calendar_category\": \"name or null\", \
         \"confidence\": 0.0-1.0, \"reasoning\": \"brief explanation\"}}\n\n\
         Create a task for emails containing action items or requests, reminders or \
         deadlines, bills or payments due, follow-up items, tasks delegated to the \
         recipient, or important information needing review or response.\n\
         Do NOT create a task for pure newsletters, marketing or promotional content, \
         automated notifications with no action needed, social media notifications, \
         \"FYI only\" messages, or auto-replies.\n\
         Meeting invitations set is_meeting to true regardless of the task decision. \
         Use context clues like \"meeting\", \"invite\", \"agenda\", \"call\", \"Zoom\", \
         \"conference\", or a calendar link."
    )
}

fn router_user_prompt(
    email: &EmailContent,
    sender: &str,
    task_categories: &[Category],
    calendar_categories: &[Category],
) -> String {
    format!(
        "{}\n\n{}\n\n{}\n{}\n\n{}",
        category_block("Task", task_categories),
        category_block("Calendar", calendar_categories),
        exact_category_rule("task_category", "Task"),
        exact_category_rule("calendar_category", "Calendar"),
        email_block(email, sender)
    )
}

fn parse_router_response(value: &Value) -> RouterResult {
    RouterResult {
        should_create_task: bool_field(value, "should_create_task", true),
        is_meeting: bool_field(value, "is_meeting", false),
        task_category: opt_str_field(value, "task_category"),
        calendar_category: opt_str_field(value, "calendar_category"),
        confidence: confidence_field(value, "confidence", 0.5),
        reasoning: str_field(value, "reasoning"),
    }
}
