use log::{info, warn};
use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::Project;
use crate::services::ProjectService;

/// Creates a first project named `name` when the database has none.
///
/// Returns the new project, or `None` when nothing was created.
pub async fn create_project_if_needed(
    pool: &PgPool,
    name: Option<&str>,
) -> AppResult<Option<Project>> {
    let Some(name) = name else {
        info!("BOOTSTRAP_PROJECT not set, skipping project creation");
        return Ok(None);
    };

    if ProjectService::count(pool).await? > 0 {
        warn!("BOOTSTRAP_PROJECT set but projects already exist. Skipping project creation.");
        return Ok(None);
    }

    let project = ProjectService::create(pool, name).await?;
    info!("Bootstrap project created: {} (id {})", project.name, project.id);

    Ok(Some(project))
}
