use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User-authored note on an issue
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IssueComment {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub author: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// DTO for posting a comment
#[derive(Debug, Deserialize)]
pub struct CreateComment {
    pub content: String,
}
