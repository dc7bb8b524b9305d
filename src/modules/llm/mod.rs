pub mod openai_client;
pub mod provider;
pub mod sse;

pub use openai_client::OpenAiCompatibleClient;
pub use provider::{ChunkStream, CompletionRequest, GenerationProvider, ProviderError};
