use async_trait::async_trait;
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use crate::core::error::{handle_db_error, AppError, Result};
use crate::features::prompts::dtos::{
    CreatePromptDto, PromptDetailDto, PromptItemDto, PromptQueryParams, PromptStructure,
    UpdatePromptDetailDto, UpdatePromptDto, VersionView,
};
use crate::features::prompts::models::{Prompt, PromptListRow, PromptVersion};
use crate::features::prompts::services::version_resolver;
use crate::features::prompts::store::PromptStore;
use crate::shared::constants::{DEFAULT_PROJECT_NAME, DEFAULT_VERSION_LABEL};
use crate::shared::prompts::{placeholders, BilingualTemplate, StoredTemplate};

const PROMPT_COLUMNS: &str =
    "id, project_id, name, slug, description, is_archived, created_at, updated_at";

const VERSION_COLUMNS: &str = "id, seq, prompt_id, version_label, is_published, template, \
     structure, variables, config, commit_message, created_by, created_at";

/// Prompt rows joined with project name and latest version label.
/// Callers append WHERE/ORDER BY clauses.
const PROMPT_LIST_SELECT: &str = r#"
    SELECT p.id, p.project_id, pr.name AS project_name, p.name, p.slug, p.description,
           p.is_archived, lv.version_label AS latest_version, p.created_at, p.updated_at
    FROM prompts p
    JOIN projects pr ON pr.id = p.project_id
    LEFT JOIN LATERAL (
        SELECT v.version_label
        FROM prompt_versions v
        WHERE v.prompt_id = p.id
        ORDER BY v.created_at DESC, v.seq DESC
        LIMIT 1
    ) lv ON TRUE
"#;

/// Field changes shared by the basic and detail update operations.
#[derive(Debug, Default)]
struct PromptChanges {
    name: Option<String>,
    slug: Option<String>,
    description: Option<String>,
    project_name: Option<String>,
    version: Option<String>,
    template: Option<StoredTemplate>,
    structure: Option<PromptStructure>,
    config: Option<serde_json::Map<String, serde_json::Value>>,
    is_archived: Option<bool>,
    /// Create a version when the prompt has none
    create_missing_version: bool,
}

impl From<UpdatePromptDto> for PromptChanges {
    fn from(dto: UpdatePromptDto) -> Self {
        Self {
            name: dto.name,
            slug: dto.slug,
            description: dto.description,
            project_name: dto.project_name,
            version: dto.version,
            template: dto.template,
            ..Default::default()
        }
    }
}

impl From<UpdatePromptDetailDto> for PromptChanges {
    fn from(dto: UpdatePromptDetailDto) -> Self {
        Self {
            name: dto.name,
            slug: dto.slug,
            description: dto.description,
            project_name: dto.project_name,
            version: dto.version,
            template: dto.template,
            structure: dto.structure,
            config: dto.config,
            is_archived: dto.is_archived,
            create_missing_version: true,
        }
    }
}

/// Distinct placeholder names across both languages, primary first.
fn template_variables(template: &BilingualTemplate) -> Vec<String> {
    let mut names = placeholders(&template.primary);
    for name in placeholders(&template.secondary) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Apply an incoming template to an existing record. A plain string replaces
/// the primary text; a mapping replaces only the slots it carries.
fn merge_template(existing: BilingualTemplate, incoming: StoredTemplate) -> BilingualTemplate {
    match incoming {
        StoredTemplate::Legacy(text) => BilingualTemplate::new(text, existing.secondary),
        StoredTemplate::Bilingual { primary, secondary } => BilingualTemplate::new(
            primary.unwrap_or(existing.primary),
            secondary.unwrap_or(existing.secondary),
        ),
    }
}

fn slug_taken() -> AppError {
    AppError::Conflict(
        "Slug is already used by another prompt. Please choose a different slug.".to_string(),
    )
}

pub struct PromptService {
    pool: PgPool,
}

impl PromptService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List prompts with pagination and filters
    pub async fn list(&self, params: &PromptQueryParams) -> Result<(Vec<PromptItemDto>, i64)> {
        let search = params.search_pattern();
        let filter = r#"
            WHERE ($1::text IS NULL OR p.name ILIKE $1 OR p.slug ILIKE $1 OR p.description ILIKE $1)
              AND ($2::uuid IS NULL OR p.project_id = $2)
        "#;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM prompts p {}", filter))
            .bind(&search)
            .bind(params.project_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)?;

        let query = format!(
            "{} {} ORDER BY p.created_at {} LIMIT $3 OFFSET $4",
            PROMPT_LIST_SELECT,
            filter,
            params.sort.as_sql()
        );

        let rows: Vec<PromptListRow> = sqlx::query_as(&query)
            .bind(&search)
            .bind(params.project_id)
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok((rows.into_iter().map(PromptItemDto::from).collect(), total))
    }

    /// All prompts of one project, newest first
    pub async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<PromptItemDto>> {
        let query = format!(
            "{} WHERE p.project_id = $1 ORDER BY p.created_at DESC",
            PROMPT_LIST_SELECT
        );

        let rows: Vec<PromptListRow> = sqlx::query_as(&query)
            .bind(project_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(rows.into_iter().map(PromptItemDto::from).collect())
    }

    /// Create a prompt together with its initial version
    pub async fn create(&self, dto: CreatePromptDto) -> Result<PromptDetailDto> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        if slug_exists(&mut *tx, &dto.slug, None).await? {
            return Err(slug_taken());
        }

        let project_name = dto
            .project_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_PROJECT_NAME)
            .to_string();
        let project_id = get_or_create_project(&mut tx, &project_name).await?;

        let prompt: Prompt = sqlx::query_as(&format!(
            r#"
            INSERT INTO prompts (project_id, name, slug, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            PROMPT_COLUMNS
        ))
        .bind(project_id)
        .bind(&dto.name)
        .bind(&dto.slug)
        .bind(&dto.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(handle_db_error)?;

        let template = dto.template.map(BilingualTemplate::from).unwrap_or_default();
        let label = dto
            .version
            .unwrap_or_else(|| DEFAULT_VERSION_LABEL.to_string());

        let version = insert_version(&mut tx, prompt.id, &label, &template, None, None).await?;

        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!("Created prompt {} ({}) in project {}", prompt.slug, prompt.id, project_name);

        Ok(build_detail(prompt, project_name, Some(&version)))
    }

    /// Prompt with its latest version
    pub async fn get_detail(&self, id: Uuid) -> Result<PromptDetailDto> {
        let prompt = fetch_prompt(&self.pool, id).await?;
        let project_name = fetch_project_name(&self.pool, prompt.project_id).await?;
        let versions = load_versions(&self.pool, id).await?;

        Ok(build_detail(
            prompt,
            project_name,
            version_resolver::latest(&versions),
        ))
    }

    /// Update prompt fields and the latest version, if the prompt has one
    pub async fn update(&self, id: Uuid, dto: UpdatePromptDto) -> Result<PromptDetailDto> {
        self.apply_changes(id, PromptChanges::from(dto)).await
    }

    /// Update prompt fields and the latest version, creating it if missing
    pub async fn update_detail(
        &self,
        id: Uuid,
        dto: UpdatePromptDetailDto,
    ) -> Result<PromptDetailDto> {
        self.apply_changes(id, PromptChanges::from(dto)).await
    }

    /// Delete a prompt and, by cascade, all of its versions
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM prompts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Prompt with id {} not found",
                id
            )));
        }

        tracing::info!("Deleted prompt {}", id);
        Ok(())
    }

    async fn apply_changes(&self, id: Uuid, changes: PromptChanges) -> Result<PromptDetailDto> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let current: Prompt = sqlx::query_as(&format!(
            "SELECT {} FROM prompts WHERE id = $1 FOR UPDATE",
            PROMPT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::NotFound(format!("Prompt with id {} not found", id)))?;

        if let Some(slug) = changes.slug.as_deref() {
            if slug != current.slug && slug_exists(&mut *tx, slug, Some(id)).await? {
                return Err(slug_taken());
            }
        }

        let project_id = match changes.project_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(get_or_create_project(&mut tx, name).await?),
            _ => None,
        };

        let prompt: Prompt = sqlx::query_as(&format!(
            r#"
            UPDATE prompts
            SET name = COALESCE($1, name),
                slug = COALESCE($2, slug),
                description = COALESCE($3, description),
                project_id = COALESCE($4, project_id),
                is_archived = COALESCE($5, is_archived),
                updated_at = NOW()
            WHERE id = $6
            RETURNING {}
            "#,
            PROMPT_COLUMNS
        ))
        .bind(&changes.name)
        .bind(&changes.slug)
        .bind(&changes.description)
        .bind(project_id)
        .bind(changes.is_archived)
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(handle_db_error)?;

        let structure = changes
            .structure
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::Internal(format!("Failed to encode structure: {}", e)))?;
        let config = changes.config.map(serde_json::Value::Object);

        let versions = load_versions(&mut *tx, id).await?;
        let version = match version_resolver::latest(&versions) {
            Some(latest) => {
                let template = changes
                    .template
                    .map(|incoming| merge_template(latest.canonical_template(), incoming));
                Some(
                    update_version(
                        &mut tx,
                        latest.id,
                        changes.version.as_deref(),
                        template.as_ref(),
                        structure,
                        config,
                    )
                    .await?,
                )
            }
            None if changes.create_missing_version => {
                let template = changes
                    .template
                    .map(BilingualTemplate::from)
                    .unwrap_or_default();
                let label = changes
                    .version
                    .unwrap_or_else(|| DEFAULT_VERSION_LABEL.to_string());
                Some(insert_version(&mut tx, id, &label, &template, structure, config).await?)
            }
            None => None,
        };

        let project_name = fetch_project_name(&mut *tx, prompt.project_id).await?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok(build_detail(prompt, project_name, version.as_ref()))
    }
}

#[async_trait]
impl PromptStore for PromptService {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Prompt>> {
        sqlx::query_as(&format!(
            "SELECT {} FROM prompts WHERE slug = $1",
            PROMPT_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn list_versions(&self, prompt_id: Uuid) -> Result<Vec<PromptVersion>> {
        load_versions(&self.pool, prompt_id).await
    }
}

fn build_detail(
    prompt: Prompt,
    project_name: String,
    version: Option<&PromptVersion>,
) -> PromptDetailDto {
    let view = VersionView::from(version);
    PromptDetailDto {
        id: prompt.id,
        name: prompt.name,
        slug: prompt.slug,
        description: prompt.description,
        project_id: prompt.project_id,
        project_name,
        is_archived: prompt.is_archived,
        version: view.label,
        is_published: view.is_published,
        template: view.template,
        structure: view.structure,
        variables: view.variables,
        config: view.config,
        created_at: prompt.created_at,
        updated_at: prompt.updated_at,
    }
}

async fn fetch_prompt<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> Result<Prompt> {
    sqlx::query_as(&format!(
        "SELECT {} FROM prompts WHERE id = $1",
        PROMPT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::Database)?
    .ok_or_else(|| AppError::NotFound(format!("Prompt with id {} not found", id)))
}

async fn fetch_project_name<'e, E: PgExecutor<'e>>(executor: E, project_id: Uuid) -> Result<String> {
    sqlx::query_scalar("SELECT name FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_one(executor)
        .await
        .map_err(AppError::Database)
}

async fn load_versions<'e, E: PgExecutor<'e>>(
    executor: E,
    prompt_id: Uuid,
) -> Result<Vec<PromptVersion>> {
    sqlx::query_as(&format!(
        "SELECT {} FROM prompt_versions WHERE prompt_id = $1",
        VERSION_COLUMNS
    ))
    .bind(prompt_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::Database)
}

async fn slug_exists<'e, E: PgExecutor<'e>>(
    executor: E,
    slug: &str,
    exclude: Option<Uuid>,
) -> Result<bool> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM prompts WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
    )
    .bind(slug)
    .bind(exclude)
    .fetch_one(executor)
    .await
    .map_err(AppError::Database)
}

/// Id of the project named `name`, creating it when absent.
async fn get_or_create_project(conn: &mut PgConnection, name: &str) -> Result<Uuid> {
    // The no-op update makes RETURNING yield the existing row on conflict
    sqlx::query_scalar(
        r#"
        INSERT INTO projects (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(conn)
    .await
    .map_err(handle_db_error)
}

async fn insert_version(
    conn: &mut PgConnection,
    prompt_id: Uuid,
    label: &str,
    template: &BilingualTemplate,
    structure: Option<serde_json::Value>,
    config: Option<serde_json::Value>,
) -> Result<PromptVersion> {
    sqlx::query_as(&format!(
        r#"
        INSERT INTO prompt_versions (prompt_id, version_label, template, variables, structure, config)
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, '{{}}'::jsonb))
        RETURNING {}
        "#,
        VERSION_COLUMNS
    ))
    .bind(prompt_id)
    .bind(label)
    .bind(template.to_value())
    .bind(serde_json::json!(template_variables(template)))
    .bind(structure)
    .bind(config)
    .fetch_one(conn)
    .await
    .map_err(handle_db_error)
}

async fn update_version(
    conn: &mut PgConnection,
    version_id: Uuid,
    label: Option<&str>,
    template: Option<&BilingualTemplate>,
    structure: Option<serde_json::Value>,
    config: Option<serde_json::Value>,
) -> Result<PromptVersion> {
    let variables = template.map(|t| serde_json::json!(template_variables(t)));

    sqlx::query_as(&format!(
        r#"
        UPDATE prompt_versions
        SET version_label = COALESCE($1, version_label),
            template = COALESCE($2, template),
            variables = COALESCE($3, variables),
            structure = COALESCE($4, structure),
            config = COALESCE($5, config)
        WHERE id = $6
        RETURNING {}
        "#,
        VERSION_COLUMNS
    ))
    .bind(label)
    .bind(template.map(BilingualTemplate::to_value))
    .bind(variables)
    .bind(structure)
    .bind(config)
    .bind(version_id)
    .fetch_one(conn)
    .await
    .map_err(handle_db_error)
}
