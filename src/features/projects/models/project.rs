use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Project row with the number of prompts it owns.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProjectWithCount {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub prompt_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
