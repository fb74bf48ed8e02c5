use actix_web::{web, HttpResponse};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::Actor;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::{Activity, AssignIssue, ChangeStatus, CreateComment, IssueSummary};
use crate::pagination::{ListQuery, PaginatedResponse};
use crate::services::{ActivityService, CommentService, IssueService, ProjectService};

/// Issue after a state change, with the activity entry it produced
#[derive(Serialize)]
pub struct IssueChangeResponse {
    pub issue: IssueSummary,
    pub activity: Activity,
}

/// GET /api/projects/{project_id}/issues
/// Lists issues for a project, most recently seen first
pub async fn list_issues(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let project_id = path.into_inner();

    // Unknown projects are a 404, not an empty list
    ProjectService::get_by_id(pool.get_ref(), project_id).await?;

    let (issues, has_more) = IssueService::list_for_project(
        pool.get_ref(),
        project_id,
        query.limit(),
        query.offset(),
    )
    .await?;

    let summaries: Vec<_> = issues.iter().map(|i| i.to_summary()).collect();

    Ok(HttpResponse::Ok().json(PaginatedResponse::new(summaries, &query, has_more)))
}

/// GET /api/projects/{project_id}/issues/{issue_id}
pub async fn get_issue(
    pool: web::Data<DbPool>,
    path: web::Path<(i32, Uuid)>,
) -> AppResult<HttpResponse> {
    let (project_id, issue_id) = path.into_inner();
    let issue = IssueService::get_for_project(pool.get_ref(), project_id, issue_id).await?;

    Ok(HttpResponse::Ok().json(issue))
}

/// PUT /api/projects/{project_id}/issues/{issue_id}/status
/// Resolves, ignores or reopens an issue
pub async fn change_status(
    pool: web::Data<DbPool>,
    path: web::Path<(i32, Uuid)>,
    body: web::Json<ChangeStatus>,
    actor: Actor,
) -> AppResult<HttpResponse> {
    let (project_id, issue_id) = path.into_inner();

    let (issue, activity) = IssueService::change_status(
        pool.get_ref(),
        project_id,
        issue_id,
        body.status,
        actor.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(IssueChangeResponse {
        issue: issue.to_summary(),
        activity,
    }))
}

/// PUT /api/projects/{project_id}/issues/{issue_id}/assignee
pub async fn assign_issue(
    pool: web::Data<DbPool>,
    path: web::Path<(i32, Uuid)>,
    body: web::Json<AssignIssue>,
    actor: Actor,
) -> AppResult<HttpResponse> {
    let (project_id, issue_id) = path.into_inner();

    let (issue, activity) = IssueService::assign(
        pool.get_ref(),
        project_id,
        issue_id,
        body.assignee.as_deref(),
        actor.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(IssueChangeResponse {
        issue: issue.to_summary(),
        activity,
    }))
}

/// GET /api/projects/{project_id}/issues/{issue_id}/activity
pub async fn list_activity(
    pool: web::Data<DbPool>,
    path: web::Path<(i32, Uuid)>,
) -> AppResult<HttpResponse> {
    let (project_id, issue_id) = path.into_inner();
    IssueService::get_for_project(pool.get_ref(), project_id, issue_id).await?;

    let activities = ActivityService::list(pool.get_ref(), issue_id).await?;

    Ok(HttpResponse::Ok().json(activities))
}

/// GET /api/projects/{project_id}/issues/{issue_id}/comments
pub async fn list_comments(
    pool: web::Data<DbPool>,
    path: web::Path<(i32, Uuid)>,
) -> AppResult<HttpResponse> {
    let (project_id, issue_id) = path.into_inner();
    IssueService::get_for_project(pool.get_ref(), project_id, issue_id).await?;

    let comments = CommentService::list(pool.get_ref(), issue_id).await?;

    Ok(HttpResponse::Ok().json(comments))
}

/// POST /api/projects/{project_id}/issues/{issue_id}/comments
pub async fn add_comment(
    pool: web::Data<DbPool>,
    path: web::Path<(i32, Uuid)>,
    body: web::Json<CreateComment>,
    actor: Actor,
) -> AppResult<HttpResponse> {
    let (project_id, issue_id) = path.into_inner();
    IssueService::get_for_project(pool.get_ref(), project_id, issue_id).await?;

    let comment =
        CommentService::add(pool.get_ref(), issue_id, actor.as_deref(), &body.content).await?;

    Ok(HttpResponse::Created().json(comment))
}

/// Configure issue routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/projects/{project_id}/issues")
            .route("", web::get().to(list_issues))
            .route("/{issue_id}", web::get().to(get_issue))
            .route("/{issue_id}/status", web::put().to(change_status))
            .route("/{issue_id}/assignee", web::put().to(assign_issue))
            .route("/{issue_id}/activity", web::get().to(list_activity))
            .route("/{issue_id}/comments", web::get().to(list_comments))
            .route("/{issue_id}/comments", web::post().to(add_comment)),
    );
}
