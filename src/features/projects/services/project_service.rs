use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::core::error::{handle_db_error, AppError, Result};
use crate::features::projects::dtos::{
    CreateProjectDto, DeleteEmptyProjectsDto, ProjectResponseDto, UpdateProjectDto,
};
use crate::features::projects::models::ProjectWithCount;

const PROJECT_WITH_COUNT_SELECT: &str = r#"
    SELECT pr.id, pr.name, pr.description, COUNT(p.id) AS prompt_count,
           pr.created_at, pr.updated_at
    FROM projects pr
    LEFT JOIN prompts p ON p.project_id = pr.id
"#;

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Project with id {} not found", id))
}

pub struct ProjectService {
    pool: PgPool,
}

impl ProjectService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All projects with their prompt counts, newest first
    pub async fn list(&self) -> Result<Vec<ProjectResponseDto>> {
        let query = format!(
            "{} GROUP BY pr.id ORDER BY pr.created_at DESC",
            PROJECT_WITH_COUNT_SELECT
        );

        let projects: Vec<ProjectWithCount> = sqlx::query_as(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(projects.into_iter().map(ProjectResponseDto::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<ProjectResponseDto> {
        fetch_with_count(&self.pool, id)
            .await?
            .map(ProjectResponseDto::from)
            .ok_or_else(|| not_found(id))
    }

    pub async fn create(&self, dto: CreateProjectDto) -> Result<ProjectResponseDto> {
        if name_taken(&self.pool, &dto.name, None).await? {
            return Err(AppError::Conflict(
                "A project with this name already exists.".to_string(),
            ));
        }

        let project: ProjectWithCount = sqlx::query_as(
            r#"
            INSERT INTO projects (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, 0::bigint AS prompt_count, created_at, updated_at
            "#,
        )
        .bind(&dto.name)
        .bind(&dto.description)
        .fetch_one(&self.pool)
        .await
        .map_err(handle_db_error)?;

        tracing::info!("Created project {} ({})", project.name, project.id);
        Ok(ProjectResponseDto::from(project))
    }

    pub async fn update(&self, id: Uuid, dto: UpdateProjectDto) -> Result<ProjectResponseDto> {
        if let Some(name) = dto.name.as_deref() {
            if name_taken(&self.pool, name, Some(id)).await? {
                return Err(AppError::Conflict(
                    "Project name is already used by another project.".to_string(),
                ));
            }
        }

        let result = sqlx::query(
            r#"
            UPDATE projects
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(&dto.name)
        .bind(&dto.description)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(handle_db_error)?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }

        self.get(id).await
    }

    /// Delete a project that owns no prompts
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(AppError::Database)?;
        if locked.is_none() {
            return Err(not_found(id));
        }

        let prompt_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM prompts WHERE project_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .map_err(AppError::Database)?;
        if prompt_count > 0 {
            return Err(AppError::BadRequest(format!(
                "Project still contains {} prompt(s). Delete or move them first.",
                prompt_count
            )));
        }

        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        tracing::info!("Deleted project {}", id);
        Ok(())
    }

    /// Delete every project that owns no prompts
    pub async fn delete_empty(&self) -> Result<DeleteEmptyProjectsDto> {
        let result = sqlx::query(
            r#"
            DELETE FROM projects pr
            WHERE NOT EXISTS (SELECT 1 FROM prompts p WHERE p.project_id = pr.id)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        tracing::info!("Deleted {} empty project(s)", result.rows_affected());
        Ok(DeleteEmptyProjectsDto {
            deleted_count: result.rows_affected(),
        })
    }
}

async fn fetch_with_count<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<ProjectWithCount>> {
    let query = format!("{} WHERE pr.id = $1 GROUP BY pr.id", PROJECT_WITH_COUNT_SELECT);

    sqlx::query_as(&query)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)
}

async fn name_taken<'e, E: PgExecutor<'e>>(
    executor: E,
    name: &str,
    exclude: Option<Uuid>,
) -> Result<bool> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM projects WHERE name = $1 AND ($2::uuid IS NULL OR id <> $2))",
    )
    .bind(name)
    .bind(exclude)
    .fetch_one(executor)
    .await
    .map_err(AppError::Database)
}
