//! Prompt execution: resolve the latest version of a prompt, render it with
//! the caller's variables and forward the result to the generation provider.
//!
//! Structural problems (unknown slug, no versions) are errors. Everything
//! that can go wrong past rendering is reported as data: missing variables,
//! dry runs and provider failures all come back as an [`ExecutionResult`], or
//! as a terminal [`StreamEvent`] once a stream has been handed out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use utoipa::ToSchema;

use crate::core::error::{AppError, Result};
use crate::features::prompts::models::PromptVersion;
use crate::features::prompts::services::version_resolver;
use crate::features::prompts::store::PromptStore;
use crate::modules::llm::{CompletionRequest, GenerationProvider, ProviderError};
use crate::shared::constants::STREAM_CHANNEL_CAPACITY;
use crate::shared::prompts::{extract, render, Language, Rendered};

const DRY_RUN_TEXT: &str = "[dry run] Supply a provider credential to generate a completion.";

/// Caller input for one execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    pub variables: HashMap<String, String>,
    pub language: Language,
    pub credential: Option<String>,
    /// Overrides the version's configured model
    pub model: Option<String>,
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Generated,
    MissingVariables,
    DryRun,
    ProviderFailed,
}

/// Outcome of a non-streamed execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    /// Rendered text, possibly with `<MISSING:name>` markers
    pub rendered: String,
    /// Template text the rendering started from
    pub template: String,
    pub missing: Vec<String>,
    pub generated_text: Option<String>,
    pub model: Option<String>,
    pub error: Option<String>,
    pub note: Option<String>,
}

impl ExecutionResult {
    fn base(status: ExecutionStatus, template: String, rendered: Rendered) -> Self {
        Self {
            status,
            rendered: rendered.text,
            template,
            missing: rendered.missing,
            generated_text: None,
            model: None,
            error: None,
            note: None,
        }
    }

    fn missing_variables(template: String, rendered: Rendered) -> Self {
        let error = format!("Missing variables: {}", rendered.missing.join(", "));
        Self {
            error: Some(error),
            ..Self::base(ExecutionStatus::MissingVariables, template, rendered)
        }
    }

    fn dry_run(template: String, rendered: Rendered, note: &str) -> Self {
        Self {
            generated_text: Some(DRY_RUN_TEXT.to_string()),
            note: Some(note.to_string()),
            ..Self::base(ExecutionStatus::DryRun, template, rendered)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    /// Terminal: the provider failed or stalled
    Error(String),
    /// Terminal: the provider finished
    Done,
}

/// An open streamed execution. Dropping `events` cancels the provider call.
#[derive(Debug)]
pub struct ExecutionStream {
    pub model: String,
    pub events: mpsc::Receiver<StreamEvent>,
}

#[derive(Debug)]
pub enum ExecutionOutcome {
    Completed(ExecutionResult),
    Streaming(ExecutionStream),
}

pub struct ExecutionService {
    prompts: Arc<dyn PromptStore>,
    provider: Option<Arc<dyn GenerationProvider>>,
    default_model: String,
    timeout: Duration,
}

impl ExecutionService {
    pub fn new(
        prompts: Arc<dyn PromptStore>,
        provider: Option<Arc<dyn GenerationProvider>>,
        default_model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            prompts,
            provider,
            default_model: default_model.into(),
            timeout,
        }
    }

    pub async fn execute(&self, slug: &str, request: ExecutionRequest) -> Result<ExecutionOutcome> {
        let prompt = self
            .prompts
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Prompt '{}' not found", slug)))?;

        let versions = self.prompts.list_versions(prompt.id).await?;
        let version = version_resolver::latest(&versions).ok_or_else(|| {
            AppError::NotFound(format!("Prompt '{}' has no runnable version", slug))
        })?;

        let template = select_template(version, request.language);
        let rendered = render(&template, &request.variables);

        if !rendered.is_complete() {
            tracing::debug!("Prompt {} is missing variables: {:?}", slug, rendered.missing);
            return Ok(ExecutionOutcome::Completed(
                ExecutionResult::missing_variables(template, rendered),
            ));
        }

        let credential = request
            .credential
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        let (provider, credential) = match (&self.provider, credential) {
            (Some(provider), Some(credential)) => (Arc::clone(provider), credential.to_string()),
            (None, _) => {
                return Ok(ExecutionOutcome::Completed(ExecutionResult::dry_run(
                    template,
                    rendered,
                    "Generation provider is not configured; returning the rendered prompt only.",
                )))
            }
            (Some(_), None) => {
                return Ok(ExecutionOutcome::Completed(ExecutionResult::dry_run(
                    template,
                    rendered,
                    "No credential supplied; pass `credential` to call the provider.",
                )))
            }
        };

        let completion = CompletionRequest {
            model: self.resolve_model(request.model.as_deref(), version),
            prompt: rendered.text.clone(),
            credential,
            temperature: None,
        };

        tracing::info!(
            "Running prompt {} with model {} (stream={})",
            slug,
            completion.model,
            request.stream
        );

        if request.stream {
            Ok(ExecutionOutcome::Streaming(
                self.spawn_stream(provider, completion),
            ))
        } else {
            Ok(ExecutionOutcome::Completed(
                self.generate(provider.as_ref(), completion, template, rendered)
                    .await,
            ))
        }
    }

    /// Request override, then the version's configured model, then the default.
    fn resolve_model(&self, requested: Option<&str>, version: &PromptVersion) -> String {
        requested
            .map(str::trim)
            .filter(|model| !model.is_empty())
            .or_else(|| version.configured_model())
            .unwrap_or(&self.default_model)
            .to_string()
    }

    async fn generate(
        &self,
        provider: &dyn GenerationProvider,
        completion: CompletionRequest,
        template: String,
        rendered: Rendered,
    ) -> ExecutionResult {
        let outcome = tokio::time::timeout(self.timeout, provider.complete(&completion))
            .await
            .unwrap_or(Err(ProviderError::Timeout(self.timeout)));

        let model = Some(completion.model);
        match outcome {
            Ok(text) => ExecutionResult {
                generated_text: Some(text),
                model,
                ..ExecutionResult::base(ExecutionStatus::Generated, template, rendered)
            },
            Err(e) => {
                tracing::warn!("Generation failed: {}", e);
                ExecutionResult {
                    error: Some(format!("Generation failed: {}", e)),
                    model,
                    ..ExecutionResult::base(ExecutionStatus::ProviderFailed, template, rendered)
                }
            }
        }
    }

    fn spawn_stream(
        &self,
        provider: Arc<dyn GenerationProvider>,
        completion: CompletionRequest,
    ) -> ExecutionStream {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let model = completion.model.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!("Stream consumer went away; cancelling generation");
                }
                _ = pump(provider.as_ref(), &completion, timeout, &tx) => {}
            }
        });

        ExecutionStream { model, events: rx }
    }
}

/// Template text for `language`: the requested text, the other language,
/// then primary and secondary of the normalized record.
fn select_template(version: &PromptVersion, language: Language) -> String {
    let text = extract(Some(&version.template), language);
    if !text.is_empty() {
        return text;
    }

    let record = version.canonical_template();
    [record.primary, record.secondary]
        .into_iter()
        .find(|t| !t.is_empty())
        .unwrap_or_default()
}

/// Forward provider chunks into `tx` and finish with exactly one terminal event.
async fn pump(
    provider: &dyn GenerationProvider,
    completion: &CompletionRequest,
    timeout: Duration,
    tx: &mpsc::Sender<StreamEvent>,
) {
    let terminal = match forward_chunks(provider, completion, timeout, tx).await {
        Ok(()) => StreamEvent::Done,
        Err(e) => {
            tracing::warn!("Streamed generation failed: {}", e);
            StreamEvent::Error(format!("Generation failed: {}", e))
        }
    };
    let _ = tx.send(terminal).await;
}

async fn forward_chunks(
    provider: &dyn GenerationProvider,
    completion: &CompletionRequest,
    timeout: Duration,
    tx: &mpsc::Sender<StreamEvent>,
) -> std::result::Result<(), ProviderError> {
    let mut chunks = tokio::time::timeout(timeout, provider.stream(completion))
        .await
        .map_err(|_| ProviderError::Timeout(timeout))??;

    // The timeout bounds the wait for each chunk, not the whole stream
    loop {
        match tokio::time::timeout(timeout, chunks.next()).await {
            Err(_) => return Err(ProviderError::Timeout(timeout)),
            Ok(None) => return Ok(()),
            Ok(Some(Err(e))) => return Err(e),
            Ok(Some(Ok(chunk))) if chunk.is_empty() => continue,
            Ok(Some(Ok(chunk))) => {
                if tx.send(StreamEvent::Chunk(chunk)).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::{
        prompt_with_slug, version_at, version_with, InMemoryPromptStore, Script, ScriptedProvider,
    };
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;

    const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

    fn store_with(slug: &str, template: serde_json::Value, config: serde_json::Value) -> Arc<InMemoryPromptStore> {
        let prompt = prompt_with_slug(slug);
        let version = version_with(prompt.id, 1, template, config);
        Arc::new(InMemoryPromptStore::default().with_prompt(prompt, vec![version]))
    }

    fn service(
        store: Arc<InMemoryPromptStore>,
        provider: Option<Arc<ScriptedProvider>>,
        timeout: Duration,
    ) -> ExecutionService {
        ExecutionService::new(
            store,
            provider.map(|p| p as Arc<dyn GenerationProvider>),
            DEFAULT_MODEL,
            timeout,
        )
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn request(pairs: &[(&str, &str)], credential: Option<&str>) -> ExecutionRequest {
        ExecutionRequest {
            variables: vars(pairs),
            credential: credential.map(str::to_string),
            ..Default::default()
        }
    }

    fn completed(outcome: ExecutionOutcome) -> ExecutionResult {
        match outcome {
            ExecutionOutcome::Completed(result) => result,
            ExecutionOutcome::Streaming(_) => panic!("expected a completed execution"),
        }
    }

    fn streaming(outcome: ExecutionOutcome) -> ExecutionStream {
        match outcome {
            ExecutionOutcome::Streaming(stream) => stream,
            ExecutionOutcome::Completed(result) => panic!("expected a stream, got {:?}", result),
        }
    }

    async fn drain(mut stream: ExecutionStream) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.events.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_dry_run_without_credential() {
        let store = store_with("greet", json!("Hello {{name}}"), json!({}));
        let provider = Arc::new(ScriptedProvider::new(Script::Reply("unused".into())));
        let service = service(store, Some(Arc::clone(&provider)), Duration::from_secs(5));

        let result = completed(
            service
                .execute("greet", request(&[("name", "Ada")], None))
                .await
                .unwrap(),
        );

        assert_eq!(result.status, ExecutionStatus::DryRun);
        assert_eq!(result.rendered, "Hello Ada");
        assert_eq!(result.template, "Hello {{name}}");
        assert!(result.missing.is_empty());
        assert!(result.generated_text.is_some());
        assert!(result.note.is_some());
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blank_credential_is_a_dry_run() {
        let store = store_with("greet", json!("Hi"), json!({}));
        let provider = Arc::new(ScriptedProvider::new(Script::Reply("unused".into())));
        let service = service(store, Some(Arc::clone(&provider)), Duration::from_secs(5));

        let result = completed(service.execute("greet", request(&[], Some("   "))).await.unwrap());

        assert_eq!(result.status, ExecutionStatus::DryRun);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_without_provider() {
        let store = store_with("greet", json!("Hi"), json!({}));
        let service = service(store, None, Duration::from_secs(5));

        let result = completed(
            service
                .execute("greet", request(&[], Some("sk-test")))
                .await
                .unwrap(),
        );

        assert_eq!(result.status, ExecutionStatus::DryRun);
        assert_eq!(result.rendered, "Hi");
    }

    #[tokio::test]
    async fn test_missing_variables_skip_provider() {
        let store = store_with("intro", json!("{{a}} and {{b}}"), json!({}));
        let provider = Arc::new(ScriptedProvider::new(Script::Reply("unused".into())));
        let service = service(store, Some(Arc::clone(&provider)), Duration::from_secs(5));

        let result = completed(
            service
                .execute("intro", request(&[("a", "1")], Some("sk-test")))
                .await
                .unwrap(),
        );

        assert_eq!(result.status, ExecutionStatus::MissingVariables);
        assert_eq!(result.rendered, "1 and <MISSING:b>");
        assert_eq!(result.missing, vec!["b".to_string()]);
        assert!(result.generated_text.is_none());
        assert!(result.error.unwrap().contains('b'));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_variables_are_reported_for_stream_requests() {
        let store = store_with("intro", json!("{{a}}"), json!({}));
        let provider = Arc::new(ScriptedProvider::new(Script::Chunks(vec!["x".into()])));
        let service = service(store, Some(Arc::clone(&provider)), Duration::from_secs(5));

        let mut req = request(&[], Some("sk-test"));
        req.stream = true;
        let result = completed(service.execute("intro", req).await.unwrap());

        assert_eq!(result.status, ExecutionStatus::MissingVariables);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_slug_is_not_found() {
        let service = service(
            Arc::new(InMemoryPromptStore::default()),
            None,
            Duration::from_secs(5),
        );

        let err = service
            .execute("unknown", ExecutionRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_prompt_without_versions_is_not_found() {
        let prompt = prompt_with_slug("empty");
        let store = Arc::new(InMemoryPromptStore::default().with_prompt(prompt, vec![]));
        let service = service(store, None, Duration::from_secs(5));

        let err = service
            .execute("empty", ExecutionRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(msg) if msg.contains("no runnable version")));
    }

    #[tokio::test]
    async fn test_runs_latest_version() {
        let prompt = prompt_with_slug("evolving");
        let now = Utc::now();
        let mut old = version_at(prompt.id, 1, "1.0.0", now - ChronoDuration::days(1));
        old.template = json!("old text");
        let mut new = version_at(prompt.id, 2, "0.1.0", now);
        new.template = json!("new text");
        let store = Arc::new(InMemoryPromptStore::default().with_prompt(prompt, vec![new, old]));
        let service = service(store, None, Duration::from_secs(5));

        let result = completed(
            service
                .execute("evolving", ExecutionRequest::default())
                .await
                .unwrap(),
        );

        assert_eq!(result.rendered, "new text");
    }

    #[tokio::test]
    async fn test_language_selection_and_fallback() {
        let store = store_with(
            "bi",
            json!({"primary": "你好 {{name}}", "secondary": "Hello {{name}}"}),
            json!({}),
        );
        let service = service(store, None, Duration::from_secs(5));

        let mut req = request(&[("name", "Ada")], None);
        req.language = Language::Secondary;
        let result = completed(service.execute("bi", req).await.unwrap());
        assert_eq!(result.rendered, "Hello Ada");

        let store = store_with("half", json!({"primary": "只有中文", "secondary": ""}), json!({}));
        let service = ExecutionService::new(store, None, DEFAULT_MODEL, Duration::from_secs(5));
        let req = ExecutionRequest {
            language: Language::Secondary,
            ..Default::default()
        };
        let result = completed(service.execute("half", req).await.unwrap());
        assert_eq!(result.rendered, "只有中文");
    }

    #[tokio::test]
    async fn test_legacy_template_runs_for_either_language() {
        let store = store_with("legacy", json!("Plain {{x}}"), json!({}));
        let service = service(store, None, Duration::from_secs(5));

        let mut req = request(&[("x", "text")], None);
        req.language = Language::Secondary;
        let result = completed(service.execute("legacy", req).await.unwrap());

        assert_eq!(result.rendered, "Plain text");
    }

    #[tokio::test]
    async fn test_generated_with_model_fallback_chain() {
        let provider = Arc::new(ScriptedProvider::new(Script::Reply("Hi Ada!".into())));

        // Configured model beats the default
        let store = store_with("greet", json!("Greet {{name}}"), json!({"model_name": "gpt-4o"}));
        let svc = service(store, Some(Arc::clone(&provider)), Duration::from_secs(5));
        let result = completed(
            svc.execute("greet", request(&[("name", "Ada")], Some("sk-test")))
                .await
                .unwrap(),
        );
        assert_eq!(result.status, ExecutionStatus::Generated);
        assert_eq!(result.generated_text.as_deref(), Some("Hi Ada!"));
        assert_eq!(result.model.as_deref(), Some("gpt-4o"));

        // Request override beats the configured model
        let mut req = request(&[("name", "Ada")], Some("sk-test"));
        req.model = Some("claude-like".into());
        let result = completed(svc.execute("greet", req).await.unwrap());
        assert_eq!(result.model.as_deref(), Some("claude-like"));

        // No override, no config: configured default
        let store = store_with("plain", json!("Hello"), json!({}));
        let svc = service(store, Some(Arc::clone(&provider)), Duration::from_secs(5));
        let result = completed(svc.execute("plain", request(&[], Some("sk-test"))).await.unwrap());
        assert_eq!(result.model.as_deref(), Some(DEFAULT_MODEL));

        let calls = provider.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].prompt, "Greet Ada");
        assert_eq!(calls[0].credential, "sk-test");
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported() {
        let store = store_with("greet", json!("Hello"), json!({}));
        let provider = Arc::new(ScriptedProvider::new(Script::Fail("invalid api key".into())));
        let service = service(store, Some(provider), Duration::from_secs(5));

        let result = completed(
            service
                .execute("greet", request(&[], Some("sk-bad")))
                .await
                .unwrap(),
        );

        assert_eq!(result.status, ExecutionStatus::ProviderFailed);
        assert!(result.generated_text.is_none());
        assert!(result.error.unwrap().contains("invalid api key"));
        assert_eq!(result.rendered, "Hello");
    }

    #[tokio::test]
    async fn test_provider_timeout_is_reported() {
        let store = store_with("greet", json!("Hello"), json!({}));
        let provider = Arc::new(ScriptedProvider::new(Script::Hang));
        let service = service(store, Some(provider), Duration::from_millis(50));

        let result = completed(
            service
                .execute("greet", request(&[], Some("sk-test")))
                .await
                .unwrap(),
        );

        assert_eq!(result.status, ExecutionStatus::ProviderFailed);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_stream_forwards_chunks_then_done() {
        let store = store_with("greet", json!("Hello"), json!({}));
        let provider = Arc::new(ScriptedProvider::new(Script::Chunks(vec![
            "Hel".into(),
            "".into(),
            "lo".into(),
        ])));
        let service = service(store, Some(provider), Duration::from_secs(5));

        let mut req = request(&[], Some("sk-test"));
        req.stream = true;
        let stream = streaming(service.execute("greet", req).await.unwrap());
        assert_eq!(stream.model, DEFAULT_MODEL);

        assert_eq!(
            drain(stream).await,
            vec![
                StreamEvent::Chunk("Hel".into()),
                StreamEvent::Chunk("lo".into()),
                StreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_open_failure_is_single_error_event() {
        let store = store_with("greet", json!("Hello"), json!({}));
        let provider = Arc::new(ScriptedProvider::new(Script::Fail("rate limited".into())));
        let service = service(store, Some(provider), Duration::from_secs(5));

        let mut req = request(&[], Some("sk-test"));
        req.stream = true;
        let events = drain(streaming(service.execute("greet", req).await.unwrap())).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error(msg) if msg.contains("rate limited")));
    }

    #[tokio::test]
    async fn test_stream_mid_failure_ends_with_error() {
        let store = store_with("greet", json!("Hello"), json!({}));
        let provider = Arc::new(ScriptedProvider::new(Script::ChunksThenFail(
            vec!["partial".into()],
            "connection reset".into(),
        )));
        let service = service(store, Some(provider), Duration::from_secs(5));

        let mut req = request(&[], Some("sk-test"));
        req.stream = true;
        let events = drain(streaming(service.execute("greet", req).await.unwrap())).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], StreamEvent::Chunk("partial".into()));
        assert!(matches!(&events[1], StreamEvent::Error(msg) if msg.contains("connection reset")));
    }

    #[tokio::test]
    async fn test_stream_idle_timeout_ends_with_error() {
        let store = store_with("greet", json!("Hello"), json!({}));
        let provider = Arc::new(ScriptedProvider::new(Script::ChunksThenHang(vec![
            "first".into(),
        ])));
        let service = service(store, Some(provider), Duration::from_millis(50));

        let mut req = request(&[], Some("sk-test"));
        req.stream = true;
        let events = drain(streaming(service.execute("greet", req).await.unwrap())).await;

        assert_eq!(events[0], StreamEvent::Chunk("first".into()));
        assert!(matches!(events[1], StreamEvent::Error(_)));
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_dropping_receiver_releases_provider_stream() {
        let store = store_with("greet", json!("Hello"), json!({}));
        let provider = Arc::new(ScriptedProvider::new(Script::ChunksThenHang(vec![
            "first".into(),
        ])));
        let service = service(store, Some(Arc::clone(&provider)), Duration::from_secs(30));

        let mut req = request(&[], Some("sk-test"));
        req.stream = true;
        let mut stream = streaming(service.execute("greet", req).await.unwrap());

        assert_eq!(stream.events.recv().await, Some(StreamEvent::Chunk("first".into())));
        assert!(!provider.stream_dropped());
        drop(stream);

        let released = tokio::time::timeout(Duration::from_secs(2), async {
            while !provider.stream_dropped() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(released.is_ok(), "provider stream was not dropped");
    }
}
