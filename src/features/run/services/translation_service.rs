use std::sync::Arc;
use std::time::Duration;

use crate::core::error::{AppError, Result};
use crate::modules::llm::{CompletionRequest, GenerationProvider, ProviderError};
use crate::shared::constants::TRANSLATION_TEMPERATURE;
use crate::shared::prompts::Language;

const PRIMARY_TO_SECONDARY: &str = "Translate the following Chinese prompt into English. \
Keep the formatting and every {{variable}} placeholder exactly as written and translate \
only the text. Reply with the translation alone, without explanations or notes:";

const SECONDARY_TO_PRIMARY: &str = "Translate the following English prompt into Chinese. \
Keep the formatting and every {{variable}} placeholder exactly as written and translate \
only the text. Reply with the translation alone, without explanations or notes:";

#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub text: String,
    pub from: Language,
    pub to: Language,
    pub credential: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub original_text: String,
    pub translated_text: String,
    pub from: Language,
    pub to: Language,
    pub model: String,
}

/// Translates prompt text between the two template languages
pub struct TranslationService {
    provider: Option<Arc<dyn GenerationProvider>>,
    default_model: String,
    timeout: Duration,
}

impl TranslationService {
    pub fn new(
        provider: Option<Arc<dyn GenerationProvider>>,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            default_model: default_model.into(),
            timeout,
        }
    }

    pub async fn translate(&self, request: TranslationRequest) -> Result<Translation> {
        if request.text.is_empty() {
            return Err(AppError::BadRequest("Text must not be empty".to_string()));
        }

        let credential = request
            .credential
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::BadRequest("A provider credential is required".to_string()))?;

        let provider = self.provider.as_ref().ok_or_else(|| {
            AppError::ServiceUnavailable("Generation provider is not configured".to_string())
        })?;

        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model)
            .to_string();

        let completion = CompletionRequest {
            model: model.clone(),
            prompt: instruction(request.from, &request.text),
            credential: credential.to_string(),
            temperature: Some(TRANSLATION_TEMPERATURE),
        };

        tracing::info!(
            "Translating {} chars from {} to {} with {}",
            request.text.chars().count(),
            request.from.as_str(),
            request.to.as_str(),
            model
        );

        let translated = tokio::time::timeout(self.timeout, provider.complete(&completion))
            .await
            .unwrap_or(Err(ProviderError::Timeout(self.timeout)))
            .map_err(|e| AppError::ExternalServiceError(format!("Translation failed: {}", e)))?;

        Ok(Translation {
            original_text: request.text,
            translated_text: translated.trim().to_string(),
            from: request.from,
            to: request.to,
            model,
        })
    }
}

fn instruction(from: Language, text: &str) -> String {
    let header = match from {
        Language::Primary => PRIMARY_TO_SECONDARY,
        Language::Secondary => SECONDARY_TO_PRIMARY,
    };
    format!("{}\n\n{}", header, text)
}
