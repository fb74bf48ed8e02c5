pub mod extractors;
pub mod sentry_auth;

pub use extractors::{Actor, ProjectKeyAuth, ACTOR_HEADER};
