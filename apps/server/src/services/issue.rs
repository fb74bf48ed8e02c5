use sqlx::{Connection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::{violates_constraint, ISSUE_FINGERPRINT_KEY};
use crate::error::{AppError, AppResult};
use crate::models::{Activity, ActivityKind, Issue, IssueStatus, NewIssue};
use crate::services::ActivityService;

pub struct IssueService;

impl IssueService {
    /// Records one occurrence against the issue for `(project_id, fingerprint)`.
    ///
    /// Runs inside the caller's transaction so the counter change commits
    /// together with the event row. Returns the issue and whether it was
    /// created by this call.
    ///
    /// The create path is a savepointed INSERT; losing the race on the unique
    /// key rolls back to the savepoint and retries as an increment.
    pub async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        project_id: i32,
        new_issue: &NewIssue,
    ) -> AppResult<(Issue, bool)> {
        if let Some(issue) = Self::record_occurrence(tx, project_id, new_issue).await? {
            return Ok((issue, false));
        }

        let mut savepoint = Connection::begin(&mut **tx).await?;
        match Self::insert(&mut savepoint, project_id, new_issue).await {
            Ok(issue) => {
                savepoint.commit().await?;
                Ok((issue, true))
            }
            Err(e) if violates_constraint(&e, ISSUE_FINGERPRINT_KEY) => {
                savepoint.rollback().await?;
                log::debug!(
                    "Lost create race for project {} fingerprint {}, retrying as update",
                    project_id,
                    new_issue.fingerprint
                );

                let issue = Self::record_occurrence(tx, project_id, new_issue)
                    .await?
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "Issue for fingerprint {} vanished after unique violation",
                            new_issue.fingerprint
                        ))
                    })?;
                Ok((issue, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Increments an existing issue in place. `last_seen` only moves forward
    /// and the level follows the newest occurrence.
    async fn record_occurrence(
        tx: &mut Transaction<'_, Postgres>,
        project_id: i32,
        new_issue: &NewIssue,
    ) -> Result<Option<Issue>, sqlx::Error> {
        sqlx::query_as::<_, Issue>(
            r#"
            UPDATE issues
            SET times_seen = times_seen + 1,
                level = CASE WHEN $3 >= last_seen THEN $4 ELSE level END,
                last_seen = GREATEST(last_seen, $3)
            WHERE project_id = $1 AND fingerprint = $2
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(&new_issue.fingerprint)
        .bind(new_issue.timestamp)
        .bind(new_issue.level.as_str())
        .fetch_optional(&mut **tx)
        .await
    }

    async fn insert(
        savepoint: &mut Transaction<'_, Postgres>,
        project_id: i32,
        new_issue: &NewIssue,
    ) -> Result<Issue, sqlx::Error> {
        sqlx::query_as::<_, Issue>(
            r#"
            INSERT INTO issues (
                project_id, fingerprint, title, culprit, exception_type,
                level, first_seen, last_seen
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(&new_issue.fingerprint)
        .bind(&new_issue.title)
        .bind(&new_issue.culprit)
        .bind(&new_issue.exception_type)
        .bind(new_issue.level.as_str())
        .bind(new_issue.timestamp)
        .fetch_one(&mut **savepoint)
        .await
    }

    /// Lists issues of a project, most recently seen first.
    ///
    /// Returns (issues, has_more).
    pub async fn list_for_project(
        pool: &PgPool,
        project_id: i32,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Issue>, bool)> {
        // Fetch limit+1 to determine if there are more results
        let issues = sqlx::query_as::<_, Issue>(
            r#"
            SELECT * FROM issues
            WHERE project_id = $1
            ORDER BY last_seen DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(project_id)
        .bind(limit + 1)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let has_more = issues.len() > limit as usize;
        let issues: Vec<Issue> = issues.into_iter().take(limit as usize).collect();

        Ok((issues, has_more))
    }

    /// Gets an issue by ID within a project
    pub async fn get_for_project(pool: &PgPool, project_id: i32, id: Uuid) -> AppResult<Issue> {
        sqlx::query_as::<_, Issue>("SELECT * FROM issues WHERE id = $1 AND project_id = $2")
            .bind(id)
            .bind(project_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", id)))
    }

    async fn lock_for_update(
        tx: &mut Transaction<'_, Postgres>,
        project_id: i32,
        id: Uuid,
    ) -> AppResult<Issue> {
        sqlx::query_as::<_, Issue>(
            "SELECT * FROM issues WHERE id = $1 AND project_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(project_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Issue {} not found", id)))
    }

    /// Moves an issue along the status state machine and records the transition
    pub async fn change_status(
        pool: &PgPool,
        project_id: i32,
        id: Uuid,
        target: IssueStatus,
        actor: Option<&str>,
    ) -> AppResult<(Issue, Activity)> {
        let mut tx = pool.begin().await?;
        let current = Self::lock_for_update(&mut tx, project_id, id).await?;

        let kind = current.status.transition_to(target).ok_or_else(|| {
            AppError::Conflict(format!(
                "Cannot change issue status from {} to {}",
                current.status, target
            ))
        })?;

        let issue = sqlx::query_as::<_, Issue>(
            "UPDATE issues SET status = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(target.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let activity = ActivityService::append(
            &mut *tx,
            id,
            kind,
            actor,
            serde_json::json!({ "from": current.status, "to": target }),
        )
        .await?;

        tx.commit().await?;

        log::info!(
            "Issue {} status {} -> {} by {}",
            id,
            current.status,
            target,
            actor.unwrap_or("anonymous")
        );

        Ok((issue, activity))
    }

    /// Sets or clears the assignee and records the change
    pub async fn assign(
        pool: &PgPool,
        project_id: i32,
        id: Uuid,
        assignee: Option<&str>,
        actor: Option<&str>,
    ) -> AppResult<(Issue, Activity)> {
        let assignee = assignee.map(str::trim).filter(|a| !a.is_empty());
        if assignee.is_some_and(|a| a.chars().count() > 255) {
            return Err(AppError::ValidationFailed(
                "Assignee cannot exceed 255 characters".to_string(),
            ));
        }

        let mut tx = pool.begin().await?;
        let current = Self::lock_for_update(&mut tx, project_id, id).await?;

        if current.assignee.as_deref() == assignee {
            return Err(AppError::Conflict(match assignee {
                Some(a) => format!("Issue is already assigned to {}", a),
                None => "Issue is already unassigned".to_string(),
            }));
        }

        let issue = sqlx::query_as::<_, Issue>(
            "UPDATE issues SET assignee = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(assignee)
        .fetch_one(&mut *tx)
        .await?;

        let activity = ActivityService::append(
            &mut *tx,
            id,
            ActivityKind::Assignment,
            actor,
            serde_json::json!({ "from": current.assignee, "to": assignee }),
        )
        .await?;

        tx.commit().await?;

        Ok((issue, activity))
    }
}
