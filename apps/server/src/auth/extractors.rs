use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::auth::sentry_auth::parse_sentry_auth_header;
use crate::error::AppError;

/// Header the upstream identity layer uses to name the acting user
pub const ACTOR_HEADER: &str = "X-Faultline-Actor";

/// Public project key presented by an SDK (ingest endpoints)
///
/// Read from the `sentry_key` query parameter, then from `X-Sentry-Auth`.
/// Only the format is checked here; the key is matched against the project
/// by the ingestion pipeline.
#[derive(Debug, Clone, Copy)]
pub struct ProjectKeyAuth {
    pub sentry_key: Uuid,
}

impl FromRequest for ProjectKeyAuth {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_project_key(req))
    }
}

fn extract_project_key(req: &HttpRequest) -> Result<ProjectKeyAuth, AppError> {
    let query_sentry_key = req.query_string().split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "sentry_key").then(|| value.to_string())
    });

    let header_sentry_key = || {
        req.headers()
            .get("X-Sentry-Auth")
            .and_then(|h| h.to_str().ok())
            .map(parse_sentry_auth_header)
            .and_then(|mut map| map.remove("sentry_key"))
    };

    let sentry_key = query_sentry_key
        .or_else(header_sentry_key)
        .ok_or_else(|| {
            AppError::Unauthorized(
                "Missing sentry_key in query param or X-Sentry-Auth header".to_string(),
            )
        })?
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid sentry_key format".to_string()))?;

    Ok(ProjectKeyAuth { sentry_key })
}

/// Optional name of whoever triggers a status change, assignment or comment
#[derive(Debug, Clone, Default)]
pub struct Actor(pub Option<String>);

impl Actor {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl FromRequest for Actor {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let actor = req
            .headers()
            .get(ACTOR_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| crate::services::fingerprint::truncate(a, 255));

        ready(Ok(Actor(actor)))
    }
}
