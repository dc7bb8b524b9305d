use axum::{routing::get, Router};
use std::sync::Arc;

use crate::features::stats::{handlers, services::StatsService};

/// Create routes for read-only statistics
pub fn routes(service: Arc<StatsService>) -> Router {
    Router::new()
        .route("/api/stats/overview", get(handlers::get_overview))
        .route("/api/stats/trends", get(handlers::get_trends))
        .route(
            "/api/stats/project-distribution",
            get(handlers::get_project_distribution),
        )
        .route("/api/stats/recent-prompts", get(handlers::get_recent_prompts))
        .route("/api/stats/version-stats", get(handlers::get_version_stats))
        .with_state(service)
}
