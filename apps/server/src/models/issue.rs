use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{ActivityKind, Level};

/// Lifecycle state of an issue
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    #[default]
    Unresolved,
    Resolved,
    Ignored,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Unresolved => "unresolved",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Ignored => "ignored",
        }
    }

    /// Returns the activity kind recorded for `self -> target`, or `None`
    /// when the transition is not allowed.
    ///
    /// ```text
    /// unresolved --resolve--> resolved
    /// unresolved --ignore---> ignored
    /// resolved | ignored --reopen--> unresolved
    /// ```
    pub fn transition_to(self, target: IssueStatus) -> Option<ActivityKind> {
        match (self, target) {
            (IssueStatus::Unresolved, IssueStatus::Resolved) => Some(ActivityKind::Resolve),
            (IssueStatus::Unresolved, IssueStatus::Ignored) => Some(ActivityKind::Ignore),
            (IssueStatus::Resolved | IssueStatus::Ignored, IssueStatus::Unresolved) => {
                Some(ActivityKind::StatusChange)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue model - one grouped error class within a project
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Issue {
    pub id: Uuid,
    pub project_id: i32,
    pub fingerprint: String,
    pub title: String,
    pub culprit: Option<String>,
    pub exception_type: Option<String>,
    pub status: IssueStatus,
    pub level: Level,
    pub times_seen: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub assignee: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Grouping data carried from a decoded event into the issue store
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub fingerprint: String,
    pub title: String,
    pub culprit: Option<String>,
    pub exception_type: Option<String>,
    pub level: Level,
    pub timestamp: DateTime<Utc>,
}

/// Issue summary returned by listing endpoints
#[derive(Debug, Clone, Serialize)]
pub struct IssueSummary {
    pub id: Uuid,
    pub project_id: i32,
    pub title: String,
    pub culprit: Option<String>,
    pub status: IssueStatus,
    pub level: Level,
    pub times_seen: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub assignee: Option<String>,
}

/// Request to change an issue's status
#[derive(Debug, Deserialize)]
pub struct ChangeStatus {
    pub status: IssueStatus,
}

/// Request to set or clear an issue's assignee
#[derive(Debug, Deserialize)]
pub struct AssignIssue {
    pub assignee: Option<String>,
}

impl Issue {
    pub fn to_summary(&self) -> IssueSummary {
        IssueSummary {
            id: self.id,
            project_id: self.project_id,
            title: self.title.clone(),
            culprit: self.culprit.clone(),
            status: self.status,
            level: self.level,
            times_seen: self.times_seen,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            assignee: self.assignee.clone(),
        }
    }
}
