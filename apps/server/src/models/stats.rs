use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::IssueSummary;

/// Issue counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusTotals {
    pub unresolved: i64,
    pub resolved: i64,
    pub ignored: i64,
}

/// Events recorded on one UTC calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineBucket {
    pub date: NaiveDate,
    pub count: i64,
}

/// Per-project rollup computed on demand
#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub project_id: i32,
    pub window_days: u32,
    pub window_start: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub by_status: StatusTotals,
    pub by_level: BTreeMap<String, i64>,
    pub by_environment: BTreeMap<String, i64>,
    pub new_today: i64,
    pub new_in_window: i64,
    pub timeline: Vec<TimelineBucket>,
    pub top_issues: Vec<IssueSummary>,
}

/// Query parameters for the stats endpoint
#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    /// Window length in days, counting today
    pub days: Option<u32>,
    /// Number of top issues to return
    pub top: Option<u32>,
}
