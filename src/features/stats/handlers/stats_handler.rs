use axum::{extract::State, Json};
use std::sync::Arc;

use crate::core::error::AppError;
use crate::features::stats::dtos::*;
use crate::features::stats::services::StatsService;
use crate::shared::types::ApiResponse;

/// Totals of prompts, projects and versions
#[utoipa::path(
    get,
    path = "/api/stats/overview",
    tag = "stats",
    responses(
        (status = 200, description = "Overview counters", body = ApiResponse<OverviewStatsDto>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_overview(
    State(service): State<Arc<StatsService>>,
) -> Result<Json<ApiResponse<OverviewStatsDto>>, AppError> {
    let overview = service.overview().await?;
    Ok(Json(ApiResponse::success(Some(overview), None, None)))
}

/// Daily prompt creation counts for the last 30 days
#[utoipa::path(
    get,
    path = "/api/stats/trends",
    tag = "stats",
    responses(
        (status = 200, description = "Creation trend", body = ApiResponse<Vec<TrendPointDto>>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_trends(
    State(service): State<Arc<StatsService>>,
) -> Result<Json<ApiResponse<Vec<TrendPointDto>>>, AppError> {
    let trends = service.trends().await?;
    Ok(Json(ApiResponse::success(Some(trends), None, None)))
}

/// Top projects by prompt count
#[utoipa::path(
    get,
    path = "/api/stats/project-distribution",
    tag = "stats",
    responses(
        (status = 200, description = "Prompt count per project", body = ApiResponse<Vec<ProjectDistributionDto>>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_project_distribution(
    State(service): State<Arc<StatsService>>,
) -> Result<Json<ApiResponse<Vec<ProjectDistributionDto>>>, AppError> {
    let distribution = service.project_distribution().await?;
    Ok(Json(ApiResponse::success(Some(distribution), None, None)))
}

/// Most recently created prompts
#[utoipa::path(
    get,
    path = "/api/stats/recent-prompts",
    tag = "stats",
    responses(
        (status = 200, description = "Newest prompts", body = ApiResponse<Vec<RecentPromptDto>>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_recent_prompts(
    State(service): State<Arc<StatsService>>,
) -> Result<Json<ApiResponse<Vec<RecentPromptDto>>>, AppError> {
    let prompts = service.recent_prompts().await?;
    Ok(Json(ApiResponse::success(Some(prompts), None, None)))
}

/// Version counts and average versions per prompt
#[utoipa::path(
    get,
    path = "/api/stats/version-stats",
    tag = "stats",
    responses(
        (status = 200, description = "Version statistics", body = ApiResponse<VersionStatsDto>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_version_stats(
    State(service): State<Arc<StatsService>>,
) -> Result<Json<ApiResponse<VersionStatsDto>>, AppError> {
    let stats = service.version_stats().await?;
    Ok(Json(ApiResponse::success(Some(stats), None, None)))
}
