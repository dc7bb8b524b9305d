use async_trait::async_trait;
use futures::{future, stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

use super::provider::{ChunkStream, CompletionRequest, GenerationProvider, ProviderError};
use super::sse::{SseData, SseLineDecoder};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

impl<'a> ChatCompletionBody<'a> {
    fn new(request: &'a CompletionRequest, stream: bool) -> Self {
        Self {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            stream,
        }
    }
}

/// Client for any service exposing the OpenAI `/chat/completions` API.
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent("PromptOps/0.1")
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&request.credential)
            .json(&ChatCompletionBody::new(request, stream))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Generation request failed: {:?}", e);
                ProviderError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Generation provider returned status: {}", status);
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl GenerationProvider for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let response = self.send(request, false).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        parse_message(&body)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ProviderError> {
        let response = self.send(request, true).await?;

        let mut decoder = SseLineDecoder::new();
        let chunks = response
            .bytes_stream()
            .map(Some)
            .chain(stream::once(future::ready(None)))
            .map(move |chunk| match chunk {
                Some(Ok(bytes)) => decoder.feed(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
                Some(Err(e)) => vec![Err(ProviderError::Request(e.to_string()))],
                // End of body: flush a last line that had no trailing newline
                None => decoder.finish().into_iter().map(Ok).collect(),
            })
            .flat_map(stream::iter)
            .take_while(|item| future::ready(!matches!(item, Ok(SseData::Done))))
            .filter_map(|item| {
                future::ready(match item {
                    Ok(SseData::Payload(payload)) => parse_delta(&payload).transpose(),
                    Ok(SseData::Done) => None,
                    Err(e) => Some(Err(e)),
                })
            });

        Ok(Box::pin(chunks))
    }
}

/// Text of `choices[0].message.content` in a non-streamed response.
fn parse_message(body: &Value) -> Result<String, ProviderError> {
    body["choices"]
        .get(0)
        .and_then(|choice| choice["message"]["content"].as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::InvalidResponse("missing choices[0].message.content".to_string())
        })
}

/// Text delta of one streamed event; `None` for events without content
/// (role announcements, finish markers).
fn parse_delta(payload: &str) -> Result<Option<String>, ProviderError> {
    let event: Value = serde_json::from_str(payload)
        .map_err(|e| ProviderError::InvalidResponse(format!("malformed stream event: {}", e)))?;

    if let Some(error) = event.get("error") {
        let message = error["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ProviderError::InvalidResponse(message));
    }

    Ok(event["choices"]
        .get(0)
        .and_then(|choice| choice["delta"]["content"].as_str())
        .filter(|content| !content.is_empty())
        .map(str::to_string))
}

/// Pull `error.message` out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
