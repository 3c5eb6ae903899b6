//! Shared prompt assembly.
//!
//! The three stages present categories and email details the same way;
//! factoring the formatting here keeps the prompts from drifting apart.
//! Everything in this module is a pure function of its inputs.

use crate::categories::Category;
use crate::content::EmailContent;

/// Shared JSON-only instruction used as the system-message preamble.
pub(crate) const JSON_ONLY_INSTRUCTION: &str =
    "You are a helpful email assistant. Always respond with a single valid JSON object \
     and nothing else.";

/// Format a category list block for a prompt.
///
/// ```text
/// Available Task Categories:
///   - Work: job related
///   - Errands
/// ```
pub(crate) fn category_block(label: &str, categories: &[Category]) -> String {
    if categories.is_empty() {
        return format!("Available {label} Categories: None");
    }
    let mut block = format!("Available {label} Categories:");
    for category in categories {
        block.push_str("\n  - ");
        block.push_str(&category.name);
        if !category.description.is_empty() {
            block.push_str(": ");
            block.push_str(&category.description);
        }
    }
    block
}

/// The exact-name category contract, repeated per stage.
///
/// This is instructional, not enforced: downstream consumers must treat
/// an unrecognized category defensively.
pub(crate) fn exact_category_rule(field: &str, label: &str) -> String {
    format!(
        "For the \"{field}\" field you MUST use one of the exact category names from the \
         Available {label} Categories list above, or null if none fit. Use the name only — \
         no descriptions, colons, or additional text."
    )
}

/// Email details block shared by all three stages.
pub(crate) fn email_block(email: &EmailContent, sender: &str) -> String {
    format!(
        "Email Details:\nFrom: {}\nSubject: {}\n\nBody:\n{}",
        sender,
        email.subject,
        email.body_or_snippet()
    )
}
