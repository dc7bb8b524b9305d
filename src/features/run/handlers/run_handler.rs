use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    Json,
};
use serde_json::json;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::core::error::Result;
use crate::core::extractor::AppJson;
use crate::features::run::dtos::{RunPromptDto, RunResultDto, TranslateDto, TranslationResponseDto};
use crate::features::run::services::{
    ExecutionOutcome, ExecutionService, StreamEvent, TranslationService,
};
use crate::shared::types::ApiResponse;

/// State for run handlers
#[derive(Clone)]
pub struct RunState {
    pub execution: Arc<ExecutionService>,
    pub translation: Arc<TranslationService>,
}

fn to_sse_event(event: StreamEvent) -> Event {
    match event {
        StreamEvent::Chunk(content) => Event::default().data(json!({ "content": content }).to_string()),
        StreamEvent::Error(error) => Event::default().data(json!({ "error": error }).to_string()),
        StreamEvent::Done => Event::default().data("[DONE]"),
    }
}

/// Run the latest version of a prompt
///
/// With `stream: true` and a credential, the response is a `text/event-stream`
/// of `{"content": ...}` events ending in `[DONE]`, or in a single
/// `{"error": ...}` event when generation fails.
#[utoipa::path(
    post,
    path = "/api/run/{slug}",
    params(
        ("slug" = String, Path, description = "Prompt slug")
    ),
    request_body = RunPromptDto,
    responses(
        (status = 200, description = "Run result, or an event stream when streaming", body = ApiResponse<RunResultDto>),
        (status = 400, description = "Malformed request body"),
        (status = 404, description = "Prompt not found or has no version")
    ),
    tag = "run"
)]
pub async fn run_prompt(
    State(state): State<RunState>,
    Path(slug): Path<String>,
    AppJson(dto): AppJson<RunPromptDto>,
) -> Result<Response> {
    let (request, variables) = dto.into_request();

    match state.execution.execute(&slug, request).await? {
        ExecutionOutcome::Completed(result) => {
            let body = RunResultDto::new(result, variables);
            Ok(Json(ApiResponse::success(Some(body), None, None)).into_response())
        }
        ExecutionOutcome::Streaming(stream) => {
            let events = ReceiverStream::new(stream.events)
                .map(|event| Ok::<_, Infallible>(to_sse_event(event)));

            let sse = Sse::new(events).keep_alive(
                KeepAlive::new()
                    .interval(Duration::from_secs(15))
                    .text("ping"),
            );
            Ok(sse.into_response())
        }
    }
}

/// Translate template text between the primary and secondary language
#[utoipa::path(
    post,
    path = "/api/translate",
    request_body = TranslateDto,
    responses(
        (status = 200, description = "Translated text", body = ApiResponse<TranslationResponseDto>),
        (status = 400, description = "Empty text or missing credential"),
        (status = 502, description = "Generation provider error"),
        (status = 503, description = "Generation provider not configured")
    ),
    tag = "run"
)]
pub async fn translate(
    State(state): State<RunState>,
    AppJson(dto): AppJson<TranslateDto>,
) -> Result<Json<ApiResponse<TranslationResponseDto>>> {
    let translation = state.translation.translate(dto.into()).await?;
    Ok(Json(ApiResponse::success(
        Some(TranslationResponseDto::from(translation)),
        None,
        None,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::prompts::store::PromptStore;
    use crate::features::run::routes::routes;
    use crate::modules::llm::GenerationProvider;
    use crate::shared::test_helpers::{
        prompt_with_slug, version_with, InMemoryPromptStore, Script, ScriptedProvider,
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};

    fn server(script: Script) -> TestServer {
        let prompt = prompt_with_slug("greet");
        let version = version_with(
            prompt.id,
            1,
            json!({"primary": "你好 {{name}}", "secondary": "Hello {{name}}"}),
            json!({"model_name": "gpt-4o"}),
        );
        let store: Arc<dyn PromptStore> =
            Arc::new(InMemoryPromptStore::default().with_prompt(prompt, vec![version]));
        let provider: Arc<dyn GenerationProvider> = Arc::new(ScriptedProvider::new(script));

        let execution = ExecutionService::new(
            store,
            Some(Arc::clone(&provider)),
            "gpt-3.5-turbo",
            Duration::from_secs(5),
        );
        let translation =
            TranslationService::new(Some(provider), "gpt-3.5-turbo", Duration::from_secs(5));

        TestServer::new(routes(Arc::new(execution), Arc::new(translation))).unwrap()
    }

    #[tokio::test]
    async fn test_run_dry_run_in_envelope() {
        let server = server(Script::Reply("unused".into()));

        let response = server
            .post("/api/run/greet")
            .json(&json!({"variables": {"name": "Ada"}, "lang": "en"}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["result"], "Hello Ada");
        assert_eq!(body["data"]["template"], "Hello {{name}}");
        assert_eq!(body["data"]["status"], "dry_run");
        assert_eq!(body["data"]["variables"]["name"], "Ada");
        assert!(body["data"]["note"].is_string());
    }

    #[tokio::test]
    async fn test_run_generated() {
        let server = server(Script::Reply("Hi Ada!".into()));

        let response = server
            .post("/api/run/greet")
            .json(&json!({"variables": {"name": "Ada"}, "api_key": "sk-test"}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], "generated");
        assert_eq!(body["data"]["generated_text"], "Hi Ada!");
        assert_eq!(body["data"]["model"], "gpt-4o");
        assert_eq!(body["data"]["errors"], json!([]));
    }

    #[tokio::test]
    async fn test_run_missing_variables_is_ok_with_errors() {
        let server = server(Script::Reply("unused".into()));

        let response = server
            .post("/api/run/greet")
            .json(&json!({"api_key": "sk-test", "stream": true}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["status"], "missing_variables");
        assert_eq!(body["data"]["errors"], json!(["name"]));
        assert_eq!(body["data"]["result"], "你好 <MISSING:name>");
        assert!(body["data"]["generated_text"].is_null());
    }

    #[tokio::test]
    async fn test_run_unknown_slug_is_404() {
        let server = server(Script::Reply("unused".into()));

        let response = server
            .post("/api/run/nope")
            .json(&json!({}))
            .expect_failure()
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_run_stream_emits_chunks_and_done() {
        let server = server(Script::Chunks(vec!["Hi ".into(), "Ada".into()]));

        let response = server
            .post("/api/run/greet")
            .json(&json!({"variables": {"name": "Ada"}, "api_key": "sk-test", "stream": true}))
            .await;

        response.assert_status_ok();
        let text = response.text();
        assert!(text.contains(r#"data: {"content":"Hi "}"#));
        assert!(text.contains(r#"data: {"content":"Ada"}"#));
        assert!(text.contains("data: [DONE]"));
        assert!(text.find("Hi ").unwrap() < text.find("[DONE]").unwrap());
    }

    #[tokio::test]
    async fn test_run_stream_error_has_no_done() {
        let server = server(Script::ChunksThenFail(
            vec!["partial".into()],
            "upstream closed".into(),
        ));

        let response = server
            .post("/api/run/greet")
            .json(&json!({"variables": {"name": "Ada"}, "api_key": "sk-test", "stream": true}))
            .await;

        let text = response.text();
        assert!(text.contains(r#"data: {"content":"partial"}"#));
        assert!(text.contains(r#""error":"#));
        assert!(text.contains("upstream closed"));
        assert!(!text.contains("[DONE]"));
    }

    #[tokio::test]
    async fn test_translate() {
        let server = server(Script::Reply(" Hello {{name}} ".into()));

        let response = server
            .post("/api/translate")
            .json(&json!({"text": "你好 {{name}}", "from_lang": "zh", "to_lang": "en", "api_key": "sk-test"}))
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"]["translated_text"], "Hello {{name}}");
        assert_eq!(body["data"]["original_text"], "你好 {{name}}");
        assert_eq!(body["data"]["from_lang"], "primary");
        assert_eq!(body["data"]["to_lang"], "secondary");
    }

    #[tokio::test]
    async fn test_translate_requires_text() {
        let server = server(Script::Reply("unused".into()));

        let response = server
            .post("/api/translate")
            .json(&json!({"text": "", "api_key": "sk-test"}))
            .expect_failure()
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
