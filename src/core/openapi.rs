use utoipa::{Modify, OpenApi};

use crate::features::projects::{dtos as projects_dtos, handlers as projects_handlers};
use crate::features::prompts::{dtos as prompts_dtos, handlers as prompts_handlers};
use crate::features::run::{dtos as run_dtos, handlers as run_handlers, services as run_services};
use crate::features::stats::{dtos as stats_dtos, handlers as stats_handlers};
use crate::shared::prompts::{BilingualTemplate, Language, StoredTemplate};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Projects
        projects_handlers::list_projects,
        projects_handlers::create_project,
        projects_handlers::update_project,
        projects_handlers::delete_project,
        projects_handlers::delete_empty_projects,
        projects_handlers::list_project_prompts,
        // Prompts
        prompts_handlers::list_prompts,
        prompts_handlers::create_prompt,
        prompts_handlers::get_prompt,
        prompts_handlers::update_prompt,
        prompts_handlers::update_prompt_detail,
        prompts_handlers::delete_prompt,
        // Run
        run_handlers::run_prompt,
        run_handlers::translate,
        // Stats
        stats_handlers::get_overview,
        stats_handlers::get_trends,
        stats_handlers::get_project_distribution,
        stats_handlers::get_recent_prompts,
        stats_handlers::get_version_stats,
    ),
    components(
        schemas(
            Meta,
            Language,
            BilingualTemplate,
            StoredTemplate,
            // Projects
            projects_dtos::CreateProjectDto,
            projects_dtos::UpdateProjectDto,
            projects_dtos::ProjectResponseDto,
            projects_dtos::DeleteEmptyProjectsDto,
            ApiResponse<projects_dtos::ProjectResponseDto>,
            ApiResponse<Vec<projects_dtos::ProjectResponseDto>>,
            ApiResponse<projects_dtos::DeleteEmptyProjectsDto>,
            // Prompts
            prompts_dtos::SortDirection,
            prompts_dtos::PromptQueryParams,
            prompts_dtos::PromptStructure,
            prompts_dtos::CreatePromptDto,
            prompts_dtos::UpdatePromptDto,
            prompts_dtos::UpdatePromptDetailDto,
            prompts_dtos::PromptItemDto,
            prompts_dtos::PromptDetailDto,
            ApiResponse<prompts_dtos::PromptDetailDto>,
            ApiResponse<Vec<prompts_dtos::PromptItemDto>>,
            // Run
            run_services::ExecutionStatus,
            run_dtos::RunPromptDto,
            run_dtos::RunResultDto,
            run_dtos::TranslateDto,
            run_dtos::TranslationResponseDto,
            ApiResponse<run_dtos::RunResultDto>,
            ApiResponse<run_dtos::TranslationResponseDto>,
            // Stats
            stats_dtos::OverviewStatsDto,
            stats_dtos::TrendPointDto,
            stats_dtos::ProjectDistributionDto,
            stats_dtos::RecentPromptDto,
            stats_dtos::VersionStatsDto,
            ApiResponse<stats_dtos::OverviewStatsDto>,
            ApiResponse<Vec<stats_dtos::TrendPointDto>>,
            ApiResponse<Vec<stats_dtos::ProjectDistributionDto>>,
            ApiResponse<Vec<stats_dtos::RecentPromptDto>>,
            ApiResponse<stats_dtos::VersionStatsDto>,
        )
    ),
    tags(
        (name = "projects", description = "Project grouping of prompts"),
        (name = "prompts", description = "Prompt and version management"),
        (name = "run", description = "Prompt execution and template translation"),
        (name = "stats", description = "Usage statistics"),
    ),
    info(
        title = "PromptOps API",
        version = "0.1.0",
        description = "Prompt lifecycle management API"
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        for path in [
            "/api/projects",
            "/api/projects/empty",
            "/api/projects/{id}",
            "/api/projects/{id}/prompts",
            "/api/prompts",
            "/api/prompts/{id}",
            "/api/prompts/{id}/detail",
            "/api/run/{slug}",
            "/api/translate",
            "/api/stats/overview",
            "/api/stats/version-stats",
        ] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
    }
}
