//! Two-language template records.
//!
//! A version's template is persisted as `{"primary": "...", "secondary": "..."}`.
//! Older rows may still hold a bare JSON string, which is read as
//! primary-language text. Every read goes through [`normalize`] so the rest of
//! the pipeline only ever sees a [`BilingualTemplate`].

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Template language. `zh`/`en` are accepted as aliases of the two slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    #[serde(alias = "zh")]
    Primary,
    #[serde(alias = "en")]
    Secondary,
}

impl Language {
    pub fn other(self) -> Self {
        match self {
            Language::Primary => Language::Secondary,
            Language::Secondary => Language::Primary,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Primary => "primary",
            Language::Secondary => "secondary",
        }
    }
}

/// Canonical template record. Both slots are always present, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BilingualTemplate {
    #[serde(default)]
    pub primary: String,
    #[serde(default)]
    pub secondary: String,
}

impl BilingualTemplate {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    pub fn text(&self, language: Language) -> &str {
        match language {
            Language::Primary => &self.primary,
            Language::Secondary => &self.secondary,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "primary": self.primary,
            "secondary": self.secondary,
        })
    }
}

/// Shapes a template value can take in storage or in a request body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum StoredTemplate {
    /// Plain string: primary-language text only
    Legacy(String),
    /// Language-keyed mapping; absent keys are empty
    Bilingual {
        #[serde(default, alias = "zh")]
        primary: Option<String>,
        #[serde(default, alias = "en")]
        secondary: Option<String>,
    },
}

impl From<StoredTemplate> for BilingualTemplate {
    fn from(stored: StoredTemplate) -> Self {
        match stored {
            StoredTemplate::Legacy(text) => BilingualTemplate::new(text, String::new()),
            StoredTemplate::Bilingual { primary, secondary } => BilingualTemplate::new(
                primary.unwrap_or_default(),
                secondary.unwrap_or_default(),
            ),
        }
    }
}

/// Convert a raw stored value into the canonical two-slot record.
///
/// Absent values and shapes other than a string or an object normalize to
/// two empty slots. Each slot of a mapping is read on its own: the canonical
/// key wins over its language-code alias, and a non-string value leaves only
/// that slot empty.
pub fn normalize(raw: Option<&serde_json::Value>) -> BilingualTemplate {
    match raw {
        Some(serde_json::Value::String(text)) => BilingualTemplate::new(text.clone(), String::new()),
        Some(serde_json::Value::Object(map)) => BilingualTemplate::new(
            slot(map, "primary", "zh"),
            slot(map, "secondary", "en"),
        ),
        _ => BilingualTemplate::default(),
    }
}

fn slot(map: &serde_json::Map<String, serde_json::Value>, key: &str, alias: &str) -> String {
    for name in [key, alias] {
        match map.get(name) {
            Some(serde_json::Value::String(text)) => return text.clone(),
            Some(serde_json::Value::Null) | None => {}
            Some(other) => {
                tracing::warn!("Ignoring non-string template slot '{}': {}", name, other);
            }
        }
    }
    String::new()
}

/// Text for `language`, falling back to the other language when empty.
///
/// A legacy plain-string value only has primary text, so asking it for the
/// secondary language yields an empty string.
pub fn extract(raw: Option<&serde_json::Value>, language: Language) -> String {
    let record = normalize(raw);
    if matches!(raw, Some(serde_json::Value::String(_))) {
        return record.text(language).to_string();
    }

    [language, language.other()]
        .into_iter()
        .map(|lang| record.text(lang))
        .find(|text| !text.is_empty())
        .unwrap_or_default()
        .to_string()
}
