//! Transport decoder: raw request body to a validated [`IngestEvent`].
//!
//! Decoding is pure CPU work over the request bytes. Nothing here touches the
//! database, so requests decode fully in parallel before any transaction is
//! opened.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value;

use crate::config::IngestConfig;
use crate::error::{AppError, AppResult};
use crate::ingest::decompression::{decompress_body, try_gunzip, ContentEncoding};
use crate::models::{EventBlobs, ExceptionInfo, FrameInfo, IngestEvent, Level};
use crate::services::fingerprint::truncate;

/// Maximum length of a client event identifier
const MAX_EVENT_ID_LEN: usize = 64;

const MAX_SHORT_FIELD_LEN: usize = 255;
const MAX_PLATFORM_LEN: usize = 64;
const MAX_EXCEPTION_TYPE_LEN: usize = 128;

/// How far ahead of the receive time a client clock may run before the
/// timestamp is replaced by the receive time
const MAX_CLOCK_DRIFT_SECS: i64 = 60;

/// Media types accepted on the ingest endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Json,
    OctetStream,
    /// Treated as JSON
    PlainText,
}

impl MediaType {
    /// Parses a Content-Type header, ignoring parameters such as `charset`
    pub fn parse(content_type: Option<&str>) -> AppResult<Self> {
        let raw = content_type.ok_or_else(|| {
            AppError::UnsupportedMediaType("missing Content-Type header".to_string())
        })?;

        let essence = raw
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" => Ok(MediaType::Json),
            "application/octet-stream" => Ok(MediaType::OctetStream),
            "text/plain" => Ok(MediaType::PlainText),
            _ => Err(AppError::UnsupportedMediaType(raw.to_string())),
        }
    }
}

/// Decodes and validates a raw ingest payload.
///
/// `received_at` is used as the event timestamp when the client sends none.
pub fn decode(
    body: &[u8],
    content_type: Option<&str>,
    content_encoding: Option<&str>,
    config: &IngestConfig,
    received_at: DateTime<Utc>,
) -> AppResult<IngestEvent> {
    // Reject unknown media types before looking at the body
    let media_type = MediaType::parse(content_type)?;

    if body.len() > config.max_payload_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "Payload exceeds {} bytes",
            config.max_payload_bytes
        )));
    }

    let encoding = ContentEncoding::parse(content_encoding)?;

    let decoded = match (media_type, encoding) {
        (MediaType::OctetStream, ContentEncoding::Identity)
            if config.speculative_decompression =>
        {
            try_gunzip(body, config.max_decompressed_bytes)?.unwrap_or_else(|| body.to_vec())
        }
        (_, encoding) => decompress_body(body, encoding, config.max_decompressed_bytes)?,
    };

    parse_event(&decoded, received_at)
}

/// Wire shape of a submitted event. Blobs stay as raw JSON text.
#[derive(Debug, Deserialize)]
struct WireEvent {
    event_id: Option<String>,
    timestamp: Option<Value>,
    level: Option<String>,
    message: Option<Value>,
    logentry: Option<Value>,
    culprit: Option<String>,
    transaction: Option<String>,
    fingerprint: Option<Vec<Value>>,
    platform: Option<String>,
    environment: Option<String>,
    release: Option<String>,
    server_name: Option<String>,
    exception: Option<Box<RawValue>>,
    stacktrace: Option<Box<RawValue>>,
    request: Option<Box<RawValue>>,
    user: Option<Box<RawValue>>,
    contexts: Option<Box<RawValue>>,
    tags: Option<Box<RawValue>>,
    extra: Option<Box<RawValue>>,
}

/// Parses a decompressed JSON document into a validated event
pub fn parse_event(data: &[u8], received_at: DateTime<Utc>) -> AppResult<IngestEvent> {
    let first = data.iter().find(|b| !b.is_ascii_whitespace());
    if first != Some(&b'{') {
        return Err(AppError::MalformedPayload(
            "Event payload must be a JSON object".to_string(),
        ));
    }

    let wire: WireEvent = serde_json::from_slice(data).map_err(|e| {
        if e.is_data() {
            AppError::ValidationFailed(format!("Invalid event field: {}", e))
        } else {
            AppError::MalformedPayload(format!("Invalid event JSON: {}", e))
        }
    })?;

    let event_id = validate_event_id(wire.event_id.as_deref())?;
    let timestamp = parse_timestamp(wire.timestamp.as_ref(), received_at)?;

    let level = match wire.level.as_deref() {
        None => Level::default(),
        Some(raw) => Level::parse(raw)
            .ok_or_else(|| AppError::ValidationFailed(format!("Unknown level '{}'", raw)))?,
    };

    let top_level_frames = match &wire.stacktrace {
        Some(raw) => frames_from(&parse_blob(raw)?),
        None => Vec::new(),
    };

    let exception = match &wire.exception {
        Some(raw) => main_exception(&parse_blob(raw)?, top_level_frames),
        None => None,
    };

    let message = log_message(wire.logentry.as_ref(), wire.message.as_ref());

    if message.is_none() && exception.is_none() {
        return Err(AppError::ValidationFailed(
            "Event must carry a message or an exception".to_string(),
        ));
    }

    Ok(IngestEvent {
        event_id,
        timestamp,
        level,
        message,
        exception,
        culprit: short_field(wire.culprit.or(wire.transaction), MAX_SHORT_FIELD_LEN),
        fingerprint_hint: fingerprint_hint(wire.fingerprint)?,
        platform: short_field(wire.platform, MAX_PLATFORM_LEN),
        environment: short_field(wire.environment, MAX_SHORT_FIELD_LEN),
        release: short_field(wire.release, MAX_SHORT_FIELD_LEN),
        server_name: short_field(wire.server_name, MAX_SHORT_FIELD_LEN),
        blobs: EventBlobs {
            exception: wire.exception,
            stacktrace: wire.stacktrace,
            request: wire.request,
            user: wire.user,
            contexts: wire.contexts,
            tags: wire.tags,
            extra: wire.extra,
        },
    })
}

fn validate_event_id(raw: Option<&str>) -> AppResult<String> {
    let id = raw
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::ValidationFailed("event_id is required".to_string()))?;

    if id.len() > MAX_EVENT_ID_LEN {
        return Err(AppError::ValidationFailed(format!(
            "event_id exceeds {} characters",
            MAX_EVENT_ID_LEN
        )));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::ValidationFailed(
            "event_id may only contain letters, digits, '-' and '_'".to_string(),
        ));
    }

    Ok(id.to_string())
}

/// Accepts epoch seconds (number) or an RFC 3339 / naive ISO 8601 string.
///
/// Dates before the Unix epoch are rejected. Dates further than
/// `MAX_CLOCK_DRIFT_SECS` past `received_at` are replaced by `received_at`.
fn parse_timestamp(raw: Option<&Value>, received_at: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    let invalid = || AppError::ValidationFailed("timestamp is not a valid date".to_string());

    let timestamp = match raw {
        None | Some(Value::Null) => return Ok(received_at),
        Some(Value::Number(n)) => {
            let secs = n.as_f64().filter(|s| s.is_finite()).ok_or_else(invalid)?;
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1_000_000_000.0).round().min(999_999_999.0) as u32;
            if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
                return Err(invalid());
            }
            DateTime::from_timestamp(whole as i64, nanos).ok_or_else(invalid)?
        }
        Some(Value::String(s)) => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => dt.to_utc(),
            Err(_) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .map_err(|_| invalid())?,
        },
        Some(_) => return Err(invalid()),
    };

    if timestamp < DateTime::UNIX_EPOCH {
        return Err(AppError::ValidationFailed(
            "timestamp is before 1970-01-01".to_string(),
        ));
    }

    if timestamp > received_at + TimeDelta::seconds(MAX_CLOCK_DRIFT_SECS) {
        log::debug!(
            "timestamp {} is ahead of receive time {}, using receive time",
            timestamp,
            received_at
        );
        return Ok(received_at);
    }

    Ok(timestamp)
}

fn parse_blob(raw: &RawValue) -> AppResult<Value> {
    serde_json::from_str(raw.get())
        .map_err(|e| AppError::MalformedPayload(format!("Invalid event JSON: {}", e)))
}

/// Picks the primary exception: the last entry of `values` (or of a bare array)
fn main_exception(exception: &Value, fallback_frames: Vec<FrameInfo>) -> Option<ExceptionInfo> {
    let values = match exception {
        Value::Array(values) => values,
        other => other.get("values")?.as_array()?,
    };

    let entry = values.last()?.as_object()?;
    let exception_type = entry.get("type").and_then(Value::as_str);
    let value = entry.get("value").and_then(Value::as_str);

    if exception_type.is_none() && value.is_none() {
        return None;
    }

    let frames = entry
        .get("stacktrace")
        .map(frames_from)
        .filter(|frames| !frames.is_empty())
        .unwrap_or(fallback_frames);

    Some(ExceptionInfo {
        exception_type: truncate(
            &strip_nul(exception_type.unwrap_or("Error")),
            MAX_EXCEPTION_TYPE_LEN,
        ),
        value: strip_nul(value.unwrap_or("")),
        frames,
    })
}

fn frames_from(stacktrace: &Value) -> Vec<FrameInfo> {
    let Some(frames) = stacktrace.get("frames").and_then(Value::as_array) else {
        return Vec::new();
    };

    frames
        .iter()
        .filter_map(Value::as_object)
        .map(|frame| {
            let text = |key: &str| {
                frame
                    .get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
            };
            FrameInfo {
                module: text("module"),
                filename: text("filename"),
                function: text("function"),
                in_app: frame.get("in_app").and_then(Value::as_bool).unwrap_or(false),
            }
        })
        .collect()
}

/// Message from `logentry` or the legacy `message` field
fn log_message(logentry: Option<&Value>, message: Option<&Value>) -> Option<String> {
    let from_object = |value: &Value| {
        value
            .get("formatted")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| value.get("message").and_then(Value::as_str))
            .map(String::from)
    };

    logentry
        .and_then(from_object)
        .or_else(|| match message {
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) if other.is_object() => from_object(other),
            _ => None,
        })
        .map(|s| strip_nul(&s))
        .filter(|s| !s.trim().is_empty())
}

fn fingerprint_hint(parts: Option<Vec<Value>>) -> AppResult<Option<Vec<String>>> {
    let Some(parts) = parts else {
        return Ok(None);
    };
    if parts.is_empty() {
        return Ok(None);
    }

    parts
        .into_iter()
        .map(|part| match part {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            _ => Err(AppError::ValidationFailed(
                "fingerprint entries must be strings".to_string(),
            )),
        })
        .collect::<AppResult<Vec<_>>>()
        .map(Some)
}

fn short_field(value: Option<String>, max_len: usize) -> Option<String> {
    value
        .map(|v| strip_nul(&v).trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| truncate(&v, max_len))
}

/// Postgres text columns cannot hold NUL characters
fn strip_nul(s: &str) -> String {
    s.replace('\0', "")
}
