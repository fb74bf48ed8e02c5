use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use serde::Serialize;
use serde_json::value::RawValue;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::Level;

/// Opaque structured blob, stored and returned exactly as submitted
pub type Blob = Json<Box<RawValue>>;

/// Event model - a single recorded occurrence
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub event_id: String,
    pub project_id: i32,
    pub issue_id: Uuid,
    pub fingerprint: String,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub level: Level,
    pub message: Option<String>,
    pub exception_type: Option<String>,
    pub exception_value: Option<String>,
    pub culprit: Option<String>,
    pub platform: Option<String>,
    pub environment: Option<String>,
    pub release: Option<String>,
    pub server_name: Option<String>,
    pub client_ip: Option<IpNetwork>,
    pub user_agent: Option<String>,
    pub exception: Option<Blob>,
    pub stacktrace: Option<Blob>,
    pub request: Option<Blob>,
    #[serde(rename = "user")]
    pub user_context: Option<Blob>,
    pub contexts: Option<Blob>,
    pub tags: Option<Blob>,
    pub extra: Option<Blob>,
}

/// Event list row, without blobs
#[derive(Debug, Serialize, FromRow)]
pub struct EventSummary {
    pub id: Uuid,
    pub event_id: String,
    pub issue_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub level: Level,
    pub message: Option<String>,
    pub exception_type: Option<String>,
    pub exception_value: Option<String>,
    pub environment: Option<String>,
    pub release: Option<String>,
}

/// A validated event produced by the transport decoder
#[derive(Debug, Clone)]
pub struct IngestEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: Option<String>,
    pub exception: Option<ExceptionInfo>,
    pub culprit: Option<String>,
    /// Explicit grouping hint sent by the client
    pub fingerprint_hint: Option<Vec<String>>,
    pub platform: Option<String>,
    pub environment: Option<String>,
    pub release: Option<String>,
    pub server_name: Option<String>,
    pub blobs: EventBlobs,
}

/// The primary exception of an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionInfo {
    pub exception_type: String,
    pub value: String,
    /// Frames in the order the client sent them (oldest call first)
    pub frames: Vec<FrameInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameInfo {
    pub module: Option<String>,
    pub filename: Option<String>,
    pub function: Option<String>,
    pub in_app: bool,
}

/// Write-once structured sub-payloads, kept as raw JSON text
#[derive(Debug, Clone, Default)]
pub struct EventBlobs {
    pub exception: Option<Box<RawValue>>,
    pub stacktrace: Option<Box<RawValue>>,
    pub request: Option<Box<RawValue>>,
    pub user: Option<Box<RawValue>>,
    pub contexts: Option<Box<RawValue>>,
    pub tags: Option<Box<RawValue>>,
    pub extra: Option<Box<RawValue>>,
}

/// Connection metadata captured by the request layer
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}
