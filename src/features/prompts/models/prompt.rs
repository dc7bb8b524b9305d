use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::shared::constants::MODEL_CONFIG_KEY;
use crate::shared::prompts::{normalize, BilingualTemplate};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Prompt {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One stored revision of a prompt's template and settings.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PromptVersion {
    pub id: Uuid,
    /// Insertion sequence; breaks `created_at` ties
    pub seq: i64,
    pub prompt_id: Uuid,
    pub version_label: String,
    pub is_published: bool,
    pub template: serde_json::Value,
    pub structure: Option<serde_json::Value>,
    pub variables: serde_json::Value,
    pub config: serde_json::Value,
    pub commit_message: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PromptVersion {
    pub fn canonical_template(&self) -> BilingualTemplate {
        normalize(Some(&self.template))
    }

    /// Default model named in the version config, if any.
    pub fn configured_model(&self) -> Option<&str> {
        self.config
            .get(MODEL_CONFIG_KEY)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|model| !model.is_empty())
    }
}

/// Prompt joined with its project name and latest version label.
#[derive(Debug, Clone, FromRow)]
pub struct PromptListRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub project_name: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub is_archived: bool,
    pub latest_version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
