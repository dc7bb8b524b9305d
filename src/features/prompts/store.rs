use async_trait::async_trait;

use crate::core::error::Result;
use crate::features::prompts::models::{Prompt, PromptVersion};

/// Read access to prompts and their version history, as needed by execution.
#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Prompt>>;

    /// Every version of the prompt, in no particular order.
    async fn list_versions(&self, prompt_id: uuid::Uuid) -> Result<Vec<PromptVersion>>;
}
