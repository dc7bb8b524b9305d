use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct OverviewStatsDto {
    pub total_prompts: i64,
    pub total_projects: i64,
    pub total_versions: i64,
    /// Prompts created in the last 7 days
    pub recent_prompts: i64,
}

/// Prompts created on one calendar day (UTC)
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct TrendPointDto {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct ProjectDistributionDto {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct RecentPromptDto {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub project_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VersionStatsDto {
    pub total_versions: i64,
    pub prompts_with_versions: i64,
    /// Rounded to two decimals
    pub avg_versions_per_prompt: f64,
}
