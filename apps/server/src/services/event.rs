use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use serde_json::value::RawValue;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::db::{violates_constraint, EVENT_ID_KEY};
use crate::error::{AppError, AppResult};
use crate::models::{ClientInfo, Event, EventSummary, IngestEvent, Issue};

const EVENT_SUMMARY_COLUMNS: &str = "id, event_id, issue_id, timestamp, received_at, level, \
     message, exception_type, exception_value, environment, release";

pub struct EventService;

impl EventService {
    /// Stores one occurrence of `issue`.
    ///
    /// Must run on the connection of the transaction that counted the
    /// occurrence. A second submission of the same `(project, event_id)`
    /// fails with `DuplicateEvent`; the caller drops the transaction, so the
    /// counter increment is rolled back with it.
    pub async fn record(
        conn: &mut PgConnection,
        issue: &Issue,
        event: &IngestEvent,
        client: &ClientInfo,
        received_at: DateTime<Utc>,
    ) -> AppResult<Event> {
        let client_ip: Option<IpNetwork> = client
            .client_ip
            .as_deref()
            .and_then(|addr| addr.parse::<std::net::IpAddr>().ok().map(IpNetwork::from));

        let (exception_type, exception_value) = match &event.exception {
            Some(exc) => (Some(exc.exception_type.as_str()), Some(exc.value.as_str())),
            None => (None, None),
        };

        let blobs = &event.blobs;

        sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (
                event_id, project_id, issue_id, fingerprint, timestamp, received_at,
                level, message, exception_type, exception_value, culprit,
                platform, environment, release, server_name, client_ip, user_agent,
                exception, stacktrace, request, user_context, contexts, tags, extra
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18::json, $19::json, $20::json, $21::json, $22::json, $23::json, $24::json
            )
            RETURNING *
            "#,
        )
        .bind(&event.event_id)
        .bind(issue.project_id)
        .bind(issue.id)
        .bind(&issue.fingerprint)
        .bind(event.timestamp)
        .bind(received_at)
        .bind(event.level.as_str())
        .bind(&event.message)
        .bind(exception_type)
        .bind(exception_value)
        .bind(&event.culprit)
        .bind(&event.platform)
        .bind(&event.environment)
        .bind(&event.release)
        .bind(&event.server_name)
        .bind(client_ip)
        .bind(&client.user_agent)
        .bind(blob_text(&blobs.exception))
        .bind(blob_text(&blobs.stacktrace))
        .bind(blob_text(&blobs.request))
        .bind(blob_text(&blobs.user))
        .bind(blob_text(&blobs.contexts))
        .bind(blob_text(&blobs.tags))
        .bind(blob_text(&blobs.extra))
        .fetch_one(conn)
        .await
        .map_err(|e| {
            if violates_constraint(&e, EVENT_ID_KEY) {
                AppError::DuplicateEvent(event.event_id.clone())
            } else {
                e.into()
            }
        })
    }

    /// Checks if an event with this event_id already exists in the project
    pub async fn exists(pool: &PgPool, project_id: i32, event_id: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM events WHERE project_id = $1 AND event_id = $2)",
        )
        .bind(project_id)
        .bind(event_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Lists events of an issue, newest first.
    ///
    /// Returns (events, has_more).
    pub async fn list_for_issue(
        pool: &PgPool,
        issue_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<EventSummary>, bool)> {
        let query = format!(
            r#"
            SELECT {}
            FROM events
            WHERE issue_id = $1
            ORDER BY timestamp DESC, received_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            EVENT_SUMMARY_COLUMNS
        );

        let events = sqlx::query_as::<_, EventSummary>(&query)
            .bind(issue_id)
            .bind(limit + 1)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        let has_more = events.len() > limit as usize;
        let events: Vec<EventSummary> = events.into_iter().take(limit as usize).collect();

        Ok((events, has_more))
    }

    /// Gets an event of an issue by its client-assigned identifier
    pub async fn get_for_issue(pool: &PgPool, issue_id: Uuid, event_id: &str) -> AppResult<Event> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE issue_id = $1 AND event_id = $2")
            .bind(issue_id)
            .bind(event_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))
    }
}

/// Blobs are bound as their original text and cast to `json` in SQL, which
/// keeps the submitted bytes intact.
fn blob_text(blob: &Option<Box<RawValue>>) -> Option<&str> {
    blob.as_deref().map(RawValue::get)
}
