use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

/// Errors raised by a generation provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to generation provider failed: {0}")]
    Request(String),

    #[error("generation provider returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response from generation provider: {0}")]
    InvalidResponse(String),

    #[error("generation provider did not respond within {0:?}")]
    Timeout(Duration),
}

/// One chat completion request carrying a single user message.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    /// Caller-supplied API key, sent as a bearer token
    pub credential: String,
    pub temperature: Option<f32>,
}

/// Incremental text chunks of a streamed completion.
pub type ChunkStream = BoxStream<'static, Result<String, ProviderError>>;

/// External text-generation service.
///
/// Implementations make exactly one attempt per call. Dropping a
/// [`ChunkStream`] must release the underlying connection.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Wait for the whole completion and return its text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;

    /// Open a streamed completion.
    async fn stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ProviderError>;
}
