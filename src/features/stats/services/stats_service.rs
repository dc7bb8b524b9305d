use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use crate::core::error::{AppError, Result};
use crate::features::stats::dtos::*;
use crate::shared::constants::{RECENT_WINDOW_DAYS, STATS_TOP_LIMIT, TREND_WINDOW_DAYS};

/// Start of a window of `days` days ending at `now`.
fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

/// Mean versions per prompt rounded to two decimals; zero without prompts.
fn average_per_prompt(total_versions: i64, prompts_with_versions: i64) -> f64 {
    if prompts_with_versions == 0 {
        return 0.0;
    }
    let avg = total_versions as f64 / prompts_with_versions as f64;
    (avg * 100.0).round() / 100.0
}

/// Read-only aggregate queries over prompts, projects and versions
pub struct StatsService {
    pool: PgPool,
}

impl StatsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Overview
    // ========================================================================

    pub async fn overview(&self) -> Result<OverviewStatsDto> {
        let since = window_start(Utc::now(), RECENT_WINDOW_DAYS);

        sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM prompts) AS total_prompts,
                (SELECT COUNT(*) FROM projects) AS total_projects,
                (SELECT COUNT(*) FROM prompt_versions) AS total_versions,
                (SELECT COUNT(*) FROM prompts WHERE created_at >= $1) AS recent_prompts
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get overview stats: {:?}", e);
            AppError::Database(e)
        })
    }

    // ========================================================================
    // Trends
    // ========================================================================

    /// Prompts created per day over the trend window, oldest day first.
    /// Days without new prompts are omitted.
    pub async fn trends(&self) -> Result<Vec<TrendPointDto>> {
        let since = window_start(Utc::now(), TREND_WINDOW_DAYS);

        sqlx::query_as(
            r#"
            SELECT (created_at AT TIME ZONE 'UTC')::date AS date, COUNT(*) AS count
            FROM prompts
            WHERE created_at >= $1
            GROUP BY 1
            ORDER BY 1 ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get creation trends: {:?}", e);
            AppError::Database(e)
        })
    }

    // ========================================================================
    // Distribution
    // ========================================================================

    /// Projects with the most prompts; projects without prompts are left out.
    pub async fn project_distribution(&self) -> Result<Vec<ProjectDistributionDto>> {
        sqlx::query_as(
            r#"
            SELECT pr.name, COUNT(p.id) AS count
            FROM projects pr
            JOIN prompts p ON p.project_id = pr.id
            GROUP BY pr.id, pr.name
            ORDER BY count DESC, pr.name ASC
            LIMIT $1
            "#,
        )
        .bind(STATS_TOP_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get project distribution: {:?}", e);
            AppError::Database(e)
        })
    }

    pub async fn recent_prompts(&self) -> Result<Vec<RecentPromptDto>> {
        sqlx::query_as(
            r#"
            SELECT p.id, p.name, p.slug, pr.name AS project_name, p.created_at
            FROM prompts p
            JOIN projects pr ON pr.id = p.project_id
            ORDER BY p.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(STATS_TOP_LIMIT)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get recent prompts: {:?}", e);
            AppError::Database(e)
        })
    }

    // ========================================================================
    // Versions
    // ========================================================================

    pub async fn version_stats(&self) -> Result<VersionStatsDto> {
        let (total_versions, prompts_with_versions): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(DISTINCT prompt_id) FROM prompt_versions",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to get version stats: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(VersionStatsDto {
            total_versions,
            prompts_with_versions,
            avg_versions_per_prompt: average_per_prompt(total_versions, prompts_with_versions),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_average_per_prompt_rounds_to_two_decimals() {
        assert_eq!(average_per_prompt(10, 3), 3.33);
        assert_eq!(average_per_prompt(5, 3), 1.67);
        assert_eq!(average_per_prompt(4, 2), 2.0);
    }

    #[test]
    fn test_average_per_prompt_without_prompts() {
        assert_eq!(average_per_prompt(0, 0), 0.0);
    }

    #[test]
    fn test_window_start() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(
            window_start(now, 30),
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
        );
    }
}
