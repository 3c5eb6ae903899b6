//! Category normalizer — converts caller-supplied task/calendar category
//! inputs into the canonical `{name, description}` shape.
//!
//! Settings layers have shipped categories in two shapes over time: flat
//! strings, and rich records with `name`/`label`/`description` keys. Both
//! are accepted here; nothing downstream ever sees the raw input.

use serde::{Deserialize, Serialize};

/// Canonical category: non-empty name, possibly empty description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub description: String,
}

impl Category {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Raw category input from the settings store.
///
/// Deserializes from either a plain string (legacy shape) or a rich
/// record. `description` is kept untyped because stores have emitted
/// non-string values there; normalization coerces it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CategoryInput {
    Text(String),
    Rich {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        description: Option<serde_json::Value>,
    },
}

impl From<&str> for CategoryInput {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Normalize raw category inputs to the canonical list.
///
/// Entries with an empty or whitespace-only name are dropped. For rich
/// records the name is the first non-empty of `name` then `label`. Order
/// is preserved and duplicates pass through.
pub fn normalize_categories(raw: &[CategoryInput]) -> Vec<Category> {
    let mut normalized = Vec::with_capacity(raw.len());
    for item in raw {
        match item {
            CategoryInput::Text(text) => {
                let name = text.trim();
                if !name.is_empty() {
                    normalized.push(Category::new(name, ""));
                }
            }
            CategoryInput::Rich {
                name,
                label,
                description,
            } => {
                let picked = name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .or_else(|| label.as_deref().map(str::trim).filter(|n| !n.is_empty()));
                let Some(picked) = picked else {
                    continue;
                };
                let description = description
                    .as_ref()
                    .and_then(serde_json::Value::as_str)
                    .map(str::trim)
                    .unwrap_or("");
                normalized.push(Category::new(picked, description));
            }
        }
    }
    normalized
}
