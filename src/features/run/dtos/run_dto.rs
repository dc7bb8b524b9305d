use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::features::run::services::{
    ExecutionRequest, ExecutionResult, ExecutionStatus, Translation, TranslationRequest,
};
use crate::shared::prompts::{stringify_variables, Language};

/// Request body for running a prompt
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RunPromptDto {
    /// Placeholder values; non-string values are substituted as JSON text
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub variables: Option<BTreeMap<String, Value>>,

    /// Provider API key. Without it the run is a dry run.
    #[serde(default)]
    pub credential: Option<String>,

    /// Older name for `credential`; used only when `credential` is absent
    #[serde(default)]
    pub api_key: Option<String>,

    /// Overrides the model configured on the version
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default, alias = "lang")]
    pub language: Language,

    /// Respond with a `text/event-stream` of generated chunks
    #[serde(default)]
    pub stream: bool,
}

impl RunPromptDto {
    pub fn into_request(self) -> (ExecutionRequest, BTreeMap<String, Value>) {
        let variables = self.variables.unwrap_or_default();
        let request = ExecutionRequest {
            variables: stringify_variables(&variables),
            language: self.language,
            credential: self.credential.or(self.api_key),
            model: self.model,
            stream: self.stream,
        };
        (request, variables)
    }
}

/// Outcome of a non-streamed run
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunResultDto {
    /// Rendered prompt text
    pub result: String,
    /// Variables as supplied by the caller
    #[schema(value_type = Object)]
    pub variables: BTreeMap<String, Value>,
    pub template: String,
    /// Names of placeholders without a value
    pub errors: Vec<String>,
    pub generated_text: Option<String>,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RunResultDto {
    pub fn new(result: ExecutionResult, variables: BTreeMap<String, Value>) -> Self {
        Self {
            result: result.rendered,
            variables,
            template: result.template,
            errors: result.missing,
            generated_text: result.generated_text,
            status: result.status,
            model: result.model,
            error: result.error,
            note: result.note,
        }
    }
}

/// Request body for translating template text
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TranslateDto {
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub from_lang: Language,

    #[serde(default = "default_target")]
    pub to_lang: Language,

    /// Provider API key
    #[serde(default)]
    pub credential: Option<String>,

    /// Older name for `credential`; used only when `credential` is absent
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub model: Option<String>,
}

fn default_target() -> Language {
    Language::Secondary
}

impl From<TranslateDto> for TranslationRequest {
    fn from(dto: TranslateDto) -> Self {
        Self {
            text: dto.text,
            from: dto.from_lang,
            to: dto.to_lang,
            credential: dto.credential.or(dto.api_key),
            model: dto.model,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TranslationResponseDto {
    pub original_text: String,
    pub translated_text: String,
    pub from_lang: Language,
    pub to_lang: Language,
    pub model: String,
}

impl From<Translation> for TranslationResponseDto {
    fn from(t: Translation) -> Self {
        Self {
            original_text: t.original_text,
            translated_text: t.translated_text,
            from_lang: t.from,
            to_lang: t.to,
            model: t.model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_dto_accepts_aliases() {
        let dto: RunPromptDto = serde_json::from_value(json!({
            "variables": {"name": "Ada", "count": 3},
            "api_key": "sk-test",
            "lang": "en",
            "stream": true
        }))
        .unwrap();

        let (request, variables) = dto.into_request();
        assert_eq!(request.credential.as_deref(), Some("sk-test"));
        assert_eq!(request.language, Language::Secondary);
        assert!(request.stream);
        assert_eq!(request.variables["name"], "Ada");
        assert_eq!(request.variables["count"], "3");
        assert_eq!(variables["count"], json!(3));
    }

    #[test]
    fn test_run_dto_credential_wins_over_api_key() {
        let dto: RunPromptDto = serde_json::from_value(json!({
            "credential": "sk-primary",
            "api_key": "sk-legacy"
        }))
        .unwrap();

        let (request, _) = dto.into_request();
        assert_eq!(request.credential.as_deref(), Some("sk-primary"));
    }

    #[test]
    fn test_run_dto_defaults() {
        let dto: RunPromptDto = serde_json::from_value(json!({})).unwrap();
        let (request, variables) = dto.into_request();

        assert!(variables.is_empty());
        assert_eq!(request.language, Language::Primary);
        assert!(!request.stream);
        assert!(request.credential.is_none());
    }

    #[test]
    fn test_result_omits_absent_optionals_but_keeps_generated_text() {
        let dto = RunResultDto {
            result: "Hello <MISSING:name>".into(),
            variables: BTreeMap::new(),
            template: "Hello {{name}}".into(),
            errors: vec!["name".into()],
            generated_text: None,
            status: ExecutionStatus::MissingVariables,
            model: None,
            error: Some("Missing variables: name".into()),
            note: None,
        };

        let value = serde_json::to_value(&dto).unwrap();
        assert_eq!(value["status"], "missing_variables");
        assert!(value["generated_text"].is_null());
        assert!(value.as_object().unwrap().contains_key("generated_text"));
        assert!(!value.as_object().unwrap().contains_key("model"));
        assert!(!value.as_object().unwrap().contains_key("note"));
    }

    #[test]
    fn test_translate_dto_defaults_to_primary_to_secondary() {
        let dto: TranslateDto =
            serde_json::from_value(json!({"text": "你好", "api_key": "sk-test"})).unwrap();
        let request = TranslationRequest::from(dto);

        assert_eq!(request.from, Language::Primary);
        assert_eq!(request.to, Language::Secondary);
        assert_eq!(request.credential.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_translate_dto_accepts_both_credential_names() {
        let dto: TranslateDto = serde_json::from_value(json!({
            "text": "你好",
            "credential": "sk-primary",
            "api_key": "sk-legacy"
        }))
        .unwrap();
        let request = TranslationRequest::from(dto);

        assert_eq!(request.credential.as_deref(), Some("sk-primary"));
    }
}
