//! Per-project rollups computed on read.
//!
//! Every query runs inside one `REPEATABLE READ, READ ONLY` transaction so
//! the totals agree with each other even while ingestion keeps writing.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, NaiveDate, Utc};
use sqlx::PgPool;

use crate::config::StatsConfig;
use crate::error::AppResult;
use crate::models::{Issue, IssueStatus, ProjectStats, StatsQuery, TimelineBucket};
use crate::models::stats::StatusTotals;

/// Label for events sent without an environment
pub const NO_ENVIRONMENT: &str = "(none)";

/// Upper bound for the number of top issues a caller may ask for
const MAX_TOP_ISSUES: u32 = 100;

/// The UTC calendar days a stats query covers, today included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsWindow {
    pub days: u32,
    pub first_day: NaiveDate,
    pub today: NaiveDate,
}

impl StatsWindow {
    /// Window of `days` days ending with the day of `now`; at least one day
    pub fn ending_at(now: DateTime<Utc>, days: u32) -> Self {
        let days = days.max(1);
        let today = now.date_naive();
        let first_day = today
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .unwrap_or(NaiveDate::MIN);
        Self {
            days,
            first_day,
            today,
        }
    }

    /// Start of the first day
    pub fn start(&self) -> DateTime<Utc> {
        start_of_day(self.first_day)
    }

    /// Start of today
    pub fn today_start(&self) -> DateTime<Utc> {
        start_of_day(self.today)
    }

    /// Exclusive end: start of tomorrow
    pub fn end(&self) -> DateTime<Utc> {
        self.today
            .checked_add_days(Days::new(1))
            .map(start_of_day)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Applies defaults and limits to the query parameters: (days, top)
pub fn resolve_query(query: &StatsQuery, config: &StatsConfig) -> (u32, u32) {
    let days = query
        .days
        .unwrap_or(config.default_window_days)
        .clamp(1, config.max_window_days.max(1));
    let top = query.top.unwrap_or(config.top_issues).min(MAX_TOP_ISSUES);
    (days, top)
}

/// One bucket per day of the window, oldest first, zero where nothing happened
pub fn fill_timeline(window: &StatsWindow, counts: &[(NaiveDate, i64)]) -> Vec<TimelineBucket> {
    let by_day: HashMap<NaiveDate, i64> = counts.iter().copied().collect();

    window
        .first_day
        .iter_days()
        .take_while(|day| *day <= window.today)
        .map(|date| TimelineBucket {
            date,
            count: by_day.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

fn status_totals(rows: &[(String, i64)]) -> StatusTotals {
    rows.iter()
        .fold(StatusTotals::default(), |mut totals, (status, count)| {
            match status.as_str() {
                s if s == IssueStatus::Unresolved.as_str() => totals.unresolved += count,
                s if s == IssueStatus::Resolved.as_str() => totals.resolved += count,
                s if s == IssueStatus::Ignored.as_str() => totals.ignored += count,
                other => log::warn!("Unknown issue status in stats: {}", other),
            }
            totals
        })
}

pub struct StatsService;

impl StatsService {
    pub async fn project_stats(
        pool: &PgPool,
        project_id: i32,
        days: u32,
        top: u32,
        now: DateTime<Utc>,
    ) -> AppResult<ProjectStats> {
        let window = StatsWindow::ending_at(now, days);
        let mut tx = pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let status_rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM issues WHERE project_id = $1 GROUP BY status",
        )
        .bind(project_id)
        .fetch_all(&mut *tx)
        .await?;

        let level_rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT level, COUNT(*) FROM issues WHERE project_id = $1 GROUP BY level",
        )
        .bind(project_id)
        .fetch_all(&mut *tx)
        .await?;

        let environment_rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT COALESCE(environment, $4), COUNT(*)
            FROM events
            WHERE project_id = $1 AND timestamp >= $2 AND timestamp < $3
            GROUP BY 1
            "#,
        )
        .bind(project_id)
        .bind(window.start())
        .bind(window.end())
        .bind(NO_ENVIRONMENT)
        .fetch_all(&mut *tx)
        .await?;

        let day_rows: Vec<(NaiveDate, i64)> = sqlx::query_as(
            r#"
            SELECT (timestamp AT TIME ZONE 'UTC')::date AS day, COUNT(*)
            FROM events
            WHERE project_id = $1 AND timestamp >= $2 AND timestamp < $3
            GROUP BY day
            "#,
        )
        .bind(project_id)
        .bind(window.start())
        .bind(window.end())
        .fetch_all(&mut *tx)
        .await?;

        let (new_today, new_in_window): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE first_seen >= $2),
                   COUNT(*) FILTER (WHERE first_seen >= $3)
            FROM issues
            WHERE project_id = $1 AND first_seen < $4
            "#,
        )
        .bind(project_id)
        .bind(window.today_start())
        .bind(window.start())
        .bind(window.end())
        .fetch_one(&mut *tx)
        .await?;

        let top_issues = sqlx::query_as::<_, Issue>(
            r#"
            SELECT * FROM issues
            WHERE project_id = $1 AND last_seen >= $2
            ORDER BY times_seen DESC, last_seen DESC, id ASC
            LIMIT $3
            "#,
        )
        .bind(project_id)
        .bind(window.start())
        .bind(i64::from(top))
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ProjectStats {
            project_id,
            window_days: window.days,
            window_start: window.start(),
            generated_at: now,
            by_status: status_totals(&status_rows),
            by_level: level_rows.into_iter().collect::<BTreeMap<_, _>>(),
            by_environment: environment_rows.into_iter().collect::<BTreeMap<_, _>>(),
            new_today,
            new_in_window,
            timeline: fill_timeline(&window, &day_rows),
            top_issues: top_issues.iter().map(Issue::to_summary).collect(),
        })
    }
}
