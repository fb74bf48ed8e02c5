use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Activity, ActivityKind};

/// Append-only issue history. There is deliberately no update or delete.
pub struct ActivityService;

impl ActivityService {
    /// Appends one entry. Takes any executor so callers can write it in the
    /// same transaction as the change it describes.
    pub async fn append<'e, E>(
        executor: E,
        issue_id: Uuid,
        kind: ActivityKind,
        actor: Option<&str>,
        payload: serde_json::Value,
    ) -> AppResult<Activity>
    where
        E: PgExecutor<'e>,
    {
        let activity = sqlx::query_as::<_, Activity>(
            r#"
            INSERT INTO issue_activities (issue_id, kind, actor, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(issue_id)
        .bind(kind.as_str())
        .bind(actor)
        .bind(payload)
        .fetch_one(executor)
        .await?;

        Ok(activity)
    }

    /// Activity of an issue in creation order
    pub async fn list(pool: &PgPool, issue_id: Uuid) -> AppResult<Vec<Activity>> {
        let activities = sqlx::query_as::<_, Activity>(
            r#"
            SELECT * FROM issue_activities
            WHERE issue_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(issue_id)
        .fetch_all(pool)
        .await?;

        Ok(activities)
    }
}
