pub mod prompt_service;
pub mod version_resolver;

pub use prompt_service::PromptService;
