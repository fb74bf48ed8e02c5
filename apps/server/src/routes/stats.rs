use actix_web::{web, HttpResponse};
use chrono::Utc;

use crate::config::Config;
use crate::db::DbPool;
use crate::error::AppResult;
use crate::models::StatsQuery;
use crate::services::stats::resolve_query;
use crate::services::{ProjectService, StatsService};

/// GET /api/projects/{project_id}/stats?days=&top=
/// Status/level/environment totals, daily timeline and top issues
pub async fn project_stats(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    path: web::Path<i32>,
    query: web::Query<StatsQuery>,
) -> AppResult<HttpResponse> {
    let project_id = path.into_inner();
    ProjectService::get_by_id(pool.get_ref(), project_id).await?;

    let (days, top) = resolve_query(&query, &config.stats);
    let stats =
        StatsService::project_stats(pool.get_ref(), project_id, days, top, Utc::now()).await?;

    Ok(HttpResponse::Ok().json(stats))
}

/// Configure stats routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/api/projects/{project_id}/stats",
        web::get().to(project_stats),
    );
}
