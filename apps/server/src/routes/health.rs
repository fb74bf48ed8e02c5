use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Serialize;

use crate::db::{self, DbPool};

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'static str>,
}

/// GET /health
/// The process is up; says nothing about dependencies.
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database: None,
    })
}

/// GET /health/ready
/// 503 until the database answers, so load balancers hold ingestion back.
pub async fn readiness(pool: web::Data<DbPool>) -> HttpResponse {
    let (status, database, code) = if db::health_check(pool.get_ref()).await {
        ("ready", "ok", StatusCode::OK)
    } else {
        log::warn!("Readiness check failed: database unreachable");
        ("not_ready", "unreachable", StatusCode::SERVICE_UNAVAILABLE)
    };

    HttpResponse::build(code).json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        database: Some(database),
    })
}

/// Configure health routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(liveness))
        .route("/health/ready", web::get().to(readiness));
}
