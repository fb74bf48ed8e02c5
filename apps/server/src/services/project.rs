use slug::slugify;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Project;

pub struct ProjectService;

impl ProjectService {
    /// Gets a project by ID
    pub async fn get_by_id(pool: &PgPool, id: i32) -> AppResult<Project> {
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::ProjectNotFound(id))
    }

    /// Resolves the project an event is submitted to.
    ///
    /// Fails with `ProjectNotFound`, `Unauthorized` for a key of another
    /// project, or `ProjectInactive`.
    pub async fn resolve_for_ingest(
        pool: &PgPool,
        id: i32,
        sentry_key: Option<Uuid>,
    ) -> AppResult<Project> {
        let project = Self::get_by_id(pool, id).await?;

        if let Some(key) = sentry_key {
            if project.sentry_key != key {
                return Err(AppError::Unauthorized(
                    "Invalid sentry_key for project".to_string(),
                ));
            }
        }

        if !project.is_active {
            log::warn!("Rejecting event for inactive project {}", id);
            return Err(AppError::ProjectInactive(id));
        }

        Ok(project)
    }

    /// Number of projects
    pub async fn count(pool: &PgPool) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Creates a new project with a unique slug derived from its name
    pub async fn create(pool: &PgPool, name: &str) -> AppResult<Project> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationFailed(
                "Name cannot be empty".to_string(),
            ));
        }
        if name.chars().count() > 255 {
            return Err(AppError::ValidationFailed(
                "Name cannot exceed 255 characters".to_string(),
            ));
        }

        let slug = Self::generate_unique_slug(pool, name).await?;

        // sentry_key is generated by the database
        sqlx::query_as::<_, Project>(
            "INSERT INTO projects (name, slug) VALUES ($1, $2) RETURNING *",
        )
        .bind(name)
        .bind(&slug)
        .fetch_one(pool)
        .await
        .map_err(|e| {
            if crate::db::violates_constraint(&e, "projects_slug_key") {
                return AppError::Conflict(format!("Project with slug '{}' already exists", slug));
            }
            e.into()
        })
    }

    /// Enables or disables ingestion for a project
    pub async fn set_active(pool: &PgPool, id: i32, is_active: bool) -> AppResult<Project> {
        sqlx::query_as::<_, Project>(
            "UPDATE projects SET is_active = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(is_active)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::ProjectNotFound(id))
    }

    async fn generate_unique_slug(pool: &PgPool, name: &str) -> AppResult<String> {
        let base_slug = slugify(name);
        if base_slug.is_empty() {
            return Err(AppError::ValidationFailed(
                "Cannot generate valid slug from name".to_string(),
            ));
        }

        let similar_slugs: Vec<String> =
            sqlx::query_scalar("SELECT slug FROM projects WHERE slug LIKE $1 || '%'")
                .bind(&base_slug)
                .fetch_all(pool)
                .await?;

        if !similar_slugs.contains(&base_slug) {
            return Ok(base_slug);
        }

        (1..=1000)
            .map(|n| format!("{}-{}", base_slug, n))
            .find(|candidate| !similar_slugs.contains(candidate))
            .ok_or_else(|| AppError::Internal("Could not generate unique slug".to_string()))
    }
}
