pub mod execution_service;
pub mod translation_service;

pub use execution_service::{
    ExecutionOutcome, ExecutionRequest, ExecutionResult, ExecutionService, ExecutionStatus,
    ExecutionStream, StreamEvent,
};
pub use translation_service::{Translation, TranslationRequest, TranslationService};
