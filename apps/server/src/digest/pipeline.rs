use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::IngestConfig;
use crate::error::{AppError, AppResult};
use crate::ingest::decode;
use crate::models::{ClientInfo, NewIssue};
use crate::services::{fingerprint, EventService, FingerprintPolicy, IssueService, ProjectService};

/// One submission as handed over by the request layer
#[derive(Debug)]
pub struct IngestRequest<'a> {
    pub project_id: i32,
    /// Public key presented by the client, checked against the project
    pub sentry_key: Option<Uuid>,
    pub body: &'a [u8],
    pub content_type: Option<&'a str>,
    pub content_encoding: Option<&'a str>,
    pub client: ClientInfo,
    pub received_at: DateTime<Utc>,
}

/// Outcome of a recorded submission
#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    pub event_id: String,
    pub issue_id: Uuid,
    pub is_new_issue: bool,
}

/// Decodes, groups and stores one event.
///
/// Decoding and fingerprinting happen before any storage work. The issue
/// counter update and the event row share one transaction: either both
/// commit or neither does, which is what keeps a duplicate `event_id` from
/// counting twice.
pub async fn ingest(
    pool: &PgPool,
    config: &IngestConfig,
    policy: &FingerprintPolicy,
    request: IngestRequest<'_>,
) -> AppResult<IngestReceipt> {
    let project =
        ProjectService::resolve_for_ingest(pool, request.project_id, request.sentry_key).await?;

    let event = decode(
        request.body,
        request.content_type,
        request.content_encoding,
        config,
        request.received_at,
    )?;

    let fingerprint = fingerprint(&event, policy);
    log::debug!(
        "Event {} grouping key: {} ({})",
        event.event_id,
        fingerprint.key,
        fingerprint.hash
    );

    // Cheap early exit; the unique constraint below is what actually decides
    if EventService::exists(pool, project.id, &event.event_id).await? {
        log::warn!(
            "Duplicate event {} for project {}",
            event.event_id,
            project.id
        );
        return Err(AppError::DuplicateEvent(event.event_id));
    }

    let new_issue = NewIssue {
        fingerprint: fingerprint.hash,
        title: fingerprint.title,
        culprit: event.culprit.clone(),
        exception_type: event.exception.as_ref().map(|e| e.exception_type.clone()),
        level: event.level,
        timestamp: event.timestamp,
    };

    let mut tx = pool.begin().await?;

    let (issue, is_new_issue) = IssueService::upsert(&mut tx, project.id, &new_issue).await?;

    if let Err(e) =
        EventService::record(&mut tx, &issue, &event, &request.client, request.received_at).await
    {
        if matches!(e, AppError::DuplicateEvent(_)) {
            log::warn!(
                "Duplicate event {} for project {} (concurrent submission)",
                event.event_id,
                project.id
            );
        }
        // Dropping the transaction rolls back the counter increment
        return Err(e);
    }

    tx.commit().await?;

    log::info!(
        "Event {} -> issue {} ({})",
        event.event_id,
        issue.id,
        if is_new_issue { "new" } else { "existing" }
    );

    Ok(IngestReceipt {
        event_id: event.event_id,
        issue_id: issue.id,
        is_new_issue,
    })
}
