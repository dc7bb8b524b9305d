use axum::{routing::post, Router};
use std::sync::Arc;

use crate::features::run::handlers::{self, RunState};
use crate::features::run::services::{ExecutionService, TranslationService};

/// Create routes for prompt execution and translation
pub fn routes(execution: Arc<ExecutionService>, translation: Arc<TranslationService>) -> Router {
    let state = RunState {
        execution,
        translation,
    };

    Router::new()
        .route("/api/run/{slug}", post(handlers::run_prompt))
        .route("/api/translate", post(handlers::translate))
        .with_state(state)
}
