use axum::{
    routing::{delete, get, put},
    Router,
};
use std::sync::Arc;

use crate::features::projects::handlers::{self, ProjectState};
use crate::features::projects::services::ProjectService;
use crate::features::prompts::services::PromptService;

/// Create routes for project management
pub fn routes(projects: Arc<ProjectService>, prompts: Arc<PromptService>) -> Router {
    let state = ProjectState { projects, prompts };

    Router::new()
        .route(
            "/api/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route("/api/projects/empty", delete(handlers::delete_empty_projects))
        .route(
            "/api/projects/{id}",
            put(handlers::update_project).delete(handlers::delete_project),
        )
        .route("/api/projects/{id}/prompts", get(handlers::list_project_prompts))
        .with_state(state)
}
