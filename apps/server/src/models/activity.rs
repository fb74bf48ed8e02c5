use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Type tag of an activity entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    StatusChange,
    Assignment,
    Comment,
    Resolve,
    Ignore,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::StatusChange => "status_change",
            ActivityKind::Assignment => "assignment",
            ActivityKind::Comment => "comment",
            ActivityKind::Resolve => "resolve",
            ActivityKind::Ignore => "ignore",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only history entry on an issue
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Activity {
    pub id: i64,
    pub issue_id: Uuid,
    pub kind: ActivityKind,
    pub actor: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
