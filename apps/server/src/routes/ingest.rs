use actix_web::{http::header, web, HttpRequest, HttpResponse};
use bytes::BytesMut;
use chrono::Utc;
use futures_util::StreamExt;
use serde::Serialize;

use crate::auth::ProjectKeyAuth;
use crate::config::Config;
use crate::db::DbPool;
use crate::digest::{self, IngestRequest};
use crate::error::{AppError, AppResult};
use crate::ingest::get_content_encoding;
use crate::models::ClientInfo;
use crate::services::FingerprintPolicy;

/// Response for successful ingestion
#[derive(Serialize)]
pub struct IngestResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<uuid::Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_new_issue: Option<bool>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

/// POST /api/{project_id}/store/
/// Ingests a single event (Sentry store protocol)
pub async fn store(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    policy: web::Data<FingerprintPolicy>,
    req: HttpRequest,
    path: web::Path<i32>,
    auth: ProjectKeyAuth,
    payload: web::Payload,
) -> AppResult<HttpResponse> {
    let received_at = Utc::now();
    let body = read_body(payload, config.ingest.max_payload_bytes).await?;

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let content_encoding = get_content_encoding(&req);

    let request = IngestRequest {
        project_id: path.into_inner(),
        sentry_key: Some(auth.sentry_key),
        body: &body,
        content_type,
        content_encoding: content_encoding.as_deref(),
        client: client_info(&req),
        received_at,
    };

    match digest::ingest(pool.get_ref(), &config.ingest, policy.get_ref(), request).await {
        Ok(receipt) => Ok(HttpResponse::Ok().json(IngestResponse {
            id: receipt.event_id,
            issue_id: Some(receipt.issue_id),
            is_new_issue: Some(receipt.is_new_issue),
            duplicate: false,
        })),
        // Re-submission is success-equivalent for the SDK
        Err(AppError::DuplicateEvent(event_id)) => Ok(HttpResponse::Ok().json(IngestResponse {
            id: event_id,
            issue_id: None,
            is_new_issue: None,
            duplicate: true,
        })),
        Err(e) => Err(e),
    }
}

/// Reads the raw body without letting the framework decode it, so the
/// payload cap applies to the bytes on the wire.
async fn read_body(mut payload: web::Payload, limit: usize) -> AppResult<BytesMut> {
    let mut body = BytesMut::new();

    while let Some(chunk) = payload.next().await {
        let chunk = chunk
            .map_err(|e| AppError::MalformedPayload(format!("Failed to read body: {}", e)))?;

        if body.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge(format!(
                "Payload exceeds {} bytes",
                limit
            )));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

fn client_info(req: &HttpRequest) -> ClientInfo {
    let client_ip = req.connection_info().realip_remote_addr().and_then(|addr| {
        addr.parse::<std::net::IpAddr>()
            .or_else(|_| addr.parse::<std::net::SocketAddr>().map(|s| s.ip()))
            .ok()
            .map(|ip| ip.to_string())
    });

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    ClientInfo {
        client_ip,
        user_agent,
    }
}

/// OPTIONS for CORS preflight
pub async fn options() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// Configures the ingest routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/{project_id}")
            .route("/store/", web::post().to(store))
            .route(
                "/store/",
                web::method(actix_web::http::Method::OPTIONS).to(options),
            ),
    );
}
