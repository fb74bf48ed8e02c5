use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::db::DbPool;
use crate::error::AppResult;
use crate::pagination::{ListQuery, PaginatedResponse};
use crate::services::{EventService, IssueService};

/// GET /api/projects/{project_id}/issues/{issue_id}/events
/// Lists events for an issue, newest first
pub async fn list_events(
    pool: web::Data<DbPool>,
    path: web::Path<(i32, Uuid)>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let (project_id, issue_id) = path.into_inner();

    // Verify issue exists and belongs to the project
    IssueService::get_for_project(pool.get_ref(), project_id, issue_id).await?;

    let (events, has_more) =
        EventService::list_for_issue(pool.get_ref(), issue_id, query.limit(), query.offset())
            .await?;

    Ok(HttpResponse::Ok().json(PaginatedResponse::new(events, &query, has_more)))
}

/// GET /api/projects/{project_id}/issues/{issue_id}/events/{event_id}
/// Gets a single event with its blobs, as submitted
pub async fn get_event(
    pool: web::Data<DbPool>,
    path: web::Path<(i32, Uuid, String)>,
) -> AppResult<HttpResponse> {
    let (project_id, issue_id, event_id) = path.into_inner();

    IssueService::get_for_project(pool.get_ref(), project_id, issue_id).await?;
    let event = EventService::get_for_issue(pool.get_ref(), issue_id, &event_id).await?;

    Ok(HttpResponse::Ok().json(event))
}

/// Configure event routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/projects/{project_id}/issues/{issue_id}/events")
            .route("", web::get().to(list_events))
            .route("/{event_id}", web::get().to(get_event)),
    );
}
