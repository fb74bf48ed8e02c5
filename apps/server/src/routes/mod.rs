pub mod events;
pub mod health;
pub mod ingest;
pub mod issues;
pub mod stats;

use actix_web::web;

/// Registers every route. Order matters: the more specific
/// `/api/projects/...` scopes come before the `/api/{project_id}` ingest
/// scope, which would otherwise swallow them.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::configure)
        .configure(events::configure)
        .configure(issues::configure)
        .configure(stats::configure)
        .configure(ingest::configure);
}
