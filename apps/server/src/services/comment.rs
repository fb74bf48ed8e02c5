use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{ActivityKind, IssueComment};
use crate::services::ActivityService;

const MAX_COMMENT_CHARS: usize = 10_000;

pub struct CommentService;

impl CommentService {
    /// Stores a comment and its `comment` activity entry in one transaction
    pub async fn add(
        pool: &PgPool,
        issue_id: Uuid,
        author: Option<&str>,
        content: &str,
    ) -> AppResult<IssueComment> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::ValidationFailed(
                "Comment cannot be empty".to_string(),
            ));
        }
        if content.chars().count() > MAX_COMMENT_CHARS {
            return Err(AppError::ValidationFailed(format!(
                "Comment cannot exceed {} characters",
                MAX_COMMENT_CHARS
            )));
        }

        let mut tx = pool.begin().await?;

        let comment = sqlx::query_as::<_, IssueComment>(
            r#"
            INSERT INTO issue_comments (issue_id, author, content)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(issue_id)
        .bind(author)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        ActivityService::append(
            &mut *tx,
            issue_id,
            ActivityKind::Comment,
            author,
            serde_json::json!({ "comment_id": comment.id }),
        )
        .await?;

        tx.commit().await?;

        Ok(comment)
    }

    /// Comments on an issue, oldest first
    pub async fn list(pool: &PgPool, issue_id: Uuid) -> AppResult<Vec<IssueComment>> {
        let comments = sqlx::query_as::<_, IssueComment>(
            "SELECT * FROM issue_comments WHERE issue_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(issue_id)
        .fetch_all(pool)
        .await?;

        Ok(comments)
    }
}
