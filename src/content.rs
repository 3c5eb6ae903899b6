//! Content normalizer — strips an email payload down to bounded, clean
//! text fields consumable by the reasoning backend.

use serde::{Deserialize, Serialize};

/// Maximum body length fed to the backend. Longer bodies are truncated
/// with a literal `...` marker.
pub const BODY_MAX_CHARS: usize = 2000;

/// Raw email payload as delivered by the mail-normalization layer.
///
/// All fields are optional upstream; missing JSON keys become empty
/// strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailPayload {
    pub subject: String,
    pub body: String,
    pub html: String,
    pub snippet: String,
    pub sender: String,
}

/// Cleaned, bounded email text ready for prompt assembly.
///
/// Invariant: `body` is never raw HTML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
    pub snippet: String,
}

impl EmailContent {
    /// Body text, falling back to the snippet when the body is empty.
    pub fn body_or_snippet(&self) -> &str {
        if self.body.is_empty() {
            &self.snippet
        } else {
            &self.body
        }
    }
}

/// Prepare email content for reasoning.
///
/// Derives the body from HTML when no plain-text body was supplied, and
/// truncates it to [`BODY_MAX_CHARS`]. Always succeeds.
pub fn prepare_content(payload: &EmailPayload) -> EmailContent {
    let mut body = payload.body.clone();
    if body.is_empty() && !payload.html.is_empty() {
        body = html_to_text(&payload.html);
    }
    EmailContent {
        subject: payload.subject.clone(),
        body: truncate_with_marker(&body, BODY_MAX_CHARS),
        snippet: payload.snippet.clone(),
    }
}

/// Truncate to `max` chars, appending `...` when truncation occurred.
fn truncate_with_marker(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    out
}

/// Convert an HTML email body to plain text.
///
/// Script/style/meta/link content is dropped, `<br>` and block-element
/// boundaries become newlines, common entities are decoded, and blank
/// lines are stripped. Not a general HTML parser — just enough for the
/// markup that shows up in real mail.
pub fn html_to_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let mut text = String::with_capacity(html.len() / 2);
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        text.push_str(&rest[..lt]);
        rest = &rest[lt + 1..];
        let Some(gt) = rest.find('>') else {
            // Unterminated tag — drop the remainder.
            rest = "";
            break;
        };
        let tag = &rest[..gt];
        rest = &rest[gt + 1..];

        let name = tag_name(tag);
        match name.as_str() {
            "script" | "style" => rest = skip_past_closing_tag(rest, &name),
            "meta" | "link" | "" => {}
            n if is_block_boundary(n) => text.push('\n'),
            _ => {}
        }
    }
    text.push_str(rest);

    let decoded = decode_entities(&text);
    let lines: Vec<&str> = decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    lines.join("\n")
}

/// Lowercased element name of a tag body (`/div foo="bar"` → `div`).
fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Elements whose boundaries translate into line breaks.
fn is_block_boundary(name: &str) -> bool {
    matches!(
        name,
        "br" | "p"
            | "div"
            | "tr"
            | "li"
            | "ul"
            | "ol"
            | "table"
            | "blockquote"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
    )
}

/// Advance past `</name ...>`, discarding everything before it.
fn skip_past_closing_tag<'a>(rest: &'a str, name: &str) -> &'a str {
    let close = format!("</{name}");
    let lower = rest.to_ascii_lowercase();
    let Some(pos) = lower.find(&close) else {
        return "";
    };
    let after = &rest[pos..];
    match after.find('>') {
        Some(end) => &after[end + 1..],
        None => "",
    }
}

/// Decode the handful of entities that matter in email bodies.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
