pub mod activity;
pub mod comment;
pub mod event;
pub mod issue;
pub mod level;
pub mod project;
pub mod stats;

pub use activity::{Activity, ActivityKind};
pub use comment::{CreateComment, IssueComment};
pub use event::{
    Blob, ClientInfo, Event, EventBlobs, EventSummary, ExceptionInfo, FrameInfo, IngestEvent,
};
pub use issue::{AssignIssue, ChangeStatus, Issue, IssueStatus, IssueSummary, NewIssue};
pub use level::Level;
pub use project::Project;
pub use stats::{ProjectStats, StatsQuery, TimelineBucket};
