use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::features::prompts::models::{PromptListRow, PromptVersion};
use crate::shared::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::shared::prompts::{BilingualTemplate, StoredTemplate};
use crate::shared::validation::SLUG_REGEX;

// Sort direction
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Desc,
    Asc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

// Helper functions for defaults
fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

// Query params for listing prompts
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
pub struct PromptQueryParams {
    /// Page number (1-indexed)
    #[serde(default = "default_page")]
    #[param(minimum = 1)]
    pub page: i64,

    /// Items per page
    #[serde(default = "default_page_size")]
    #[param(minimum = 1, maximum = 100)]
    pub page_size: i64,

    /// Search in name, slug, or description
    pub search: Option<String>,

    /// Only prompts of this project
    pub project_id: Option<Uuid>,

    /// Sort direction (default: desc by created_at)
    #[serde(default)]
    pub sort: SortDirection,
}

impl PromptQueryParams {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }

    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s))
    }
}

/// Structured (builder-mode) description of a prompt. Stored as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct PromptStructure {
    pub role: String,
    pub task: String,
    pub context: String,
    pub constraints: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub few_shot: Vec<serde_json::Value>,
}

// Create request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePromptDto {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    /// Key used by `POST /api/run/{slug}`
    #[validate(length(min = 1, max = 255), regex(path = *SLUG_REGEX, message = "slug must be lowercase letters and digits, optionally joined by single '-' or '_' (e.g. 'resume-parser')"))]
    pub slug: String,

    pub description: Option<String>,

    /// Owning project, created when it does not exist yet
    #[validate(length(min = 1, max = 255))]
    pub project_name: Option<String>,

    /// Label of the initial version (default "1.0.0")
    #[validate(length(min = 1, max = 50))]
    pub version: Option<String>,

    /// Plain string (primary language) or `{"primary": .., "secondary": ..}`
    pub template: Option<StoredTemplate>,
}

// Basic update request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePromptDto {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 255), regex(path = *SLUG_REGEX, message = "slug must be lowercase letters and digits, optionally joined by single '-' or '_' (e.g. 'resume-parser')"))]
    pub slug: Option<String>,

    pub description: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub project_name: Option<String>,

    #[validate(length(min = 1, max = 50))]
    pub version: Option<String>,

    /// Replaces the given language slots of the latest version's template
    pub template: Option<StoredTemplate>,
}

// Detail update request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePromptDetailDto {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 255), regex(path = *SLUG_REGEX, message = "slug must be lowercase letters and digits, optionally joined by single '-' or '_' (e.g. 'resume-parser')"))]
    pub slug: Option<String>,

    pub description: Option<String>,

    #[validate(length(min = 1, max = 255))]
    pub project_name: Option<String>,

    #[validate(length(min = 1, max = 50))]
    pub version: Option<String>,

    pub template: Option<StoredTemplate>,

    pub structure: Option<PromptStructure>,

    /// Version settings; `model_name` sets the default model for runs
    #[schema(value_type = Option<Object>)]
    pub config: Option<serde_json::Map<String, serde_json::Value>>,

    pub is_archived: Option<bool>,
}

// List item
#[derive(Debug, Serialize, ToSchema)]
pub struct PromptItemDto {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub project_id: Uuid,
    pub project_name: String,
    pub is_archived: bool,
    /// Label of the latest version
    pub version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PromptListRow> for PromptItemDto {
    fn from(row: PromptListRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            project_id: row.project_id,
            project_name: row.project_name,
            is_archived: row.is_archived,
            version: row.latest_version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

// Detail view: prompt fields plus its latest version
#[derive(Debug, Serialize, ToSchema)]
pub struct PromptDetailDto {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub project_id: Uuid,
    pub project_name: String,
    pub is_archived: bool,
    pub version: Option<String>,
    pub is_published: bool,
    pub template: BilingualTemplate,
    pub structure: Option<PromptStructure>,
    pub variables: Vec<String>,
    #[schema(value_type = Object)]
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Latest-version fields of [`PromptDetailDto`].
pub struct VersionView {
    pub label: Option<String>,
    pub is_published: bool,
    pub template: BilingualTemplate,
    pub structure: Option<PromptStructure>,
    pub variables: Vec<String>,
    pub config: serde_json::Value,
}

impl From<Option<&PromptVersion>> for VersionView {
    fn from(version: Option<&PromptVersion>) -> Self {
        match version {
            Some(v) => Self {
                label: Some(v.version_label.clone()),
                is_published: v.is_published,
                template: v.canonical_template(),
                structure: v.structure.clone().and_then(|s| {
                    serde_json::from_value(s)
                        .map_err(|e| {
                            tracing::warn!("Unreadable structure on version {}: {}", v.id, e)
                        })
                        .ok()
                }),
                variables: serde_json::from_value(v.variables.clone()).unwrap_or_else(|e| {
                    tracing::warn!("Unreadable variables on version {}: {}", v.id, e);
                    Vec::new()
                }),
                config: v.config.clone(),
            },
            None => Self {
                label: None,
                is_published: false,
                template: BilingualTemplate::default(),
                structure: None,
                variables: Vec::new(),
                config: serde_json::json!({}),
            },
        }
    }
}
