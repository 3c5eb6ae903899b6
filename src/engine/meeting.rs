//! Meeting extraction stage — structured meeting fields for an email the
//! router flagged as a meeting invitation.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::categories::Category;
use crate::content::EmailContent;
use crate::engine::backend::{
    JsonBackend, bool_field, confidence_field, is_empty_object, opt_str_field, str_field,
};
use crate::engine::prompt::{JSON_ONLY_INSTRUCTION, category_block, email_block, exact_category_rule};
use crate::error::LlmError;

const MEETING_MAX_TOKENS: u32 = 400;
const MEETING_TEMPERATURE: f32 = 0.2;

/// Extracted meeting fields.
///
/// Time fields are RFC3339 strings or empty — they are not parsed into
/// datetimes here because the calendar provider client consumes them as
/// strings. The default instance means "not a meeting".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingOutcome {
    pub is_meeting: bool,
    pub summary: String,
    pub location: String,
    pub start_datetime: String,
    pub end_datetime: String,
    pub participants: Vec<String>,
    pub category: Option<String>,
    pub confidence: f32,
    pub reasoning: String,
}

/// Extract meeting details. Invoked only when the router set `is_meeting`.
///
/// On failure the orchestrator keeps the default empty outcome — a failed
/// extraction is equivalent to "not a meeting".
pub(crate) async fn extract_meeting(
    backend: &JsonBackend,
    model: &str,
    email: &EmailContent,
    sender: &str,
    calendar_categories: &[Category],
    suggested_category: Option<&str>,
) -> Result<MeetingOutcome, LlmError> {
    let system = meeting_system_prompt();
    let user = meeting_user_prompt(email, sender, calendar_categories, suggested_category);
    let value = backend
        .invoke(model, &system, &user, MEETING_MAX_TOKENS, MEETING_TEMPERATURE)
        .await?;
    if is_empty_object(&value) {
        return Err(LlmError::InvalidResponse(
            "meeting stage produced no usable fields".to_string(),
        ));
    }
    Ok(parse_meeting_response(&value, &email.subject))
}

fn meeting_system_prompt() -> String {
    format!(
        "{JSON_ONLY_INSTRUCTION}\n\n\
         You extract meeting details from an email flagged as a possible meeting \
         invitation. If on closer inspection the email is not actually a meeting \
         invite, set is_meeting to false.\n\n\
         Respond with exactly this JSON shape:\n\
         {{\"is_meeting\": true/false, \"summary\": \"meeting title\", \
         \"location\": \"physical place or virtual link, empty if unknown\", \
         \"start_datetime\": \"RFC3339 UTC, empty if unknown\", \
         \"end_datetime\": \"RFC3339 UTC, empty if unknown\", \
         \"participants\": [\"email addresses, empty list if none are explicit\"], \
         \"category\": \"name or null\", \"confidence\": 0.0-1.0, \
         \"reasoning\": \"brief explanation\"}}\n\n\
         Emit times as RFC3339; when the timezone is ambiguous, convert to UTC on a \
         best-effort basis. If only a start time is known, leave end_datetime empty."
    )
}

fn meeting_user_prompt(
    email: &EmailContent,
    sender: &str,
    calendar_categories: &[Category],
    suggested_category: Option<&str>,
) -> String {
    let mut prompt = format!(
        "{}\n{}\n",
        category_block("Calendar", calendar_categories),
        exact_category_rule("category", "Calendar")
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

/// Normalize raw backend output defensively: missing/mistyped fields get
/// their documented defaults, participant entries must be strings.
fn parse_meeting_response(value: &Value, subject: &str) -> MeetingOutcome {
    let participants = value
        .get("participants")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let outcome = MeetingOutcome {
        is_meeting: bool_field(value, "is_meeting", false),
        summary: str_field(value, "summary"),
        location: str_field(value, "location"),
        start_datetime: str_field(value, "start_datetime"),
        end_datetime: str_field(value, "end_datetime"),
        participants,
        category: opt_str_field(value, "category"),
        confidence: confidence_field(value, "confidence", 0.5),
        reasoning: str_field(value, "reasoning"),
    };

    // Times pass through unchanged; an unparseable one is only worth a log.
    for (field, datetime) in [
        ("start_datetime", &outcome.start_datetime),
        ("end_datetime", &outcome.end_datetime),
    ] {
        if !datetime.is_empty() && DateTime::parse_from_rfc3339(datetime).is_err() {
            warn!(subject, field, value = %datetime, "Meeting time is not valid RFC3339");
        }
    }

    outcome
}
