pub mod activity;
pub mod comment;
pub mod event;
pub mod fingerprint;
pub mod issue;
pub mod project;
pub mod stats;

pub use activity::ActivityService;
pub use comment::CommentService;
pub use event::EventService;
pub use fingerprint::{fingerprint, Fingerprint, FingerprintPolicy};
pub use issue::IssueService;
pub use project::ProjectService;
pub use stats::StatsService;
