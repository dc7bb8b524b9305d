use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::AppJson;
use crate::features::projects::dtos::{
    CreateProjectDto, DeleteEmptyProjectsDto, ProjectResponseDto, UpdateProjectDto,
};
use crate::features::projects::services::ProjectService;
use crate::features::prompts::dtos::PromptItemDto;
use crate::features::prompts::services::PromptService;
use crate::shared::types::{ApiResponse, Meta};

/// State for project handlers
#[derive(Clone)]
pub struct ProjectState {
    pub projects: Arc<ProjectService>,
    pub prompts: Arc<PromptService>,
}

/// List projects with their prompt counts
#[utoipa::path(
    get,
    path = "/api/projects",
    responses(
        (status = 200, description = "Projects retrieved successfully", body = ApiResponse<Vec<ProjectResponseDto>>)
    ),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<ProjectState>,
) -> Result<Json<ApiResponse<Vec<ProjectResponseDto>>>> {
    let projects = state.projects.list().await?;
    let total = projects.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(projects),
        None,
        Some(Meta { total }),
    )))
}

/// Create a project
#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProjectDto,
    responses(
        (status = 201, description = "Project created successfully", body = ApiResponse<ProjectResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Project name already exists")
    ),
    tag = "projects"
)]
pub async fn create_project(
    State(state): State<ProjectState>,
    AppJson(dto): AppJson<CreateProjectDto>,
) -> Result<(StatusCode, Json<ApiResponse<ProjectResponseDto>>)> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let project = state.projects.create(dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(project), None, None)),
    ))
}

/// Update a project
#[utoipa::path(
    put,
    path = "/api/projects/{id}",
    params(
        ("id" = Uuid, Path, description = "Project ID")
    ),
    request_body = UpdateProjectDto,
    responses(
        (status = 200, description = "Project updated successfully", body = ApiResponse<ProjectResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Project not found"),
        (status = 409, description = "Project name already exists")
    ),
    tag = "projects"
)]
pub async fn update_project(
    State(state): State<ProjectState>,
    Path(id): Path<Uuid>,
    AppJson(dto): AppJson<UpdateProjectDto>,
) -> Result<Json<ApiResponse<ProjectResponseDto>>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let project = state.projects.update(id, dto).await?;
    Ok(Json(ApiResponse::success(Some(project), None, None)))
}

/// Delete a project that has no prompts
#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    params(
        ("id" = Uuid, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Project deleted successfully"),
        (status = 400, description = "Project still contains prompts"),
        (status = 404, description = "Project not found")
    ),
    tag = "projects"
)]
pub async fn delete_project(
    State(state): State<ProjectState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    state.projects.delete(id).await?;
    Ok(Json(ApiResponse::success(None, None, None)))
}

/// Delete every project that has no prompts
#[utoipa::path(
    delete,
    path = "/api/projects/empty",
    responses(
        (status = 200, description = "Empty projects deleted", body = ApiResponse<DeleteEmptyProjectsDto>)
    ),
    tag = "projects"
)]
pub async fn delete_empty_projects(
    State(state): State<ProjectState>,
) -> Result<Json<ApiResponse<DeleteEmptyProjectsDto>>> {
    let result = state.projects.delete_empty().await?;
    let message = format!("Deleted {} empty project(s)", result.deleted_count);
    Ok(Json(ApiResponse::success(Some(result), Some(message), None)))
}

/// List the prompts of a project
#[utoipa::path(
    get,
    path = "/api/projects/{id}/prompts",
    params(
        ("id" = Uuid, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Prompts retrieved successfully", body = ApiResponse<Vec<PromptItemDto>>),
        (status = 404, description = "Project not found")
    ),
    tag = "projects"
)]
pub async fn list_project_prompts(
    State(state): State<ProjectState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<PromptItemDto>>>> {
    // 404 for unknown projects rather than an empty list
    state.projects.get(id).await?;

    let prompts = state.prompts.list_by_project(id).await?;
    let total = prompts.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(prompts),
        None,
        Some(Meta { total }),
    )))
}
