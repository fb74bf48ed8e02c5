//! Unit tests for the transport decoder
//!
//! Media-type checks, compressed bodies and event validation.

use chrono::{DateTime, TimeZone, Utc};
use faultline::config::IngestConfig;
use faultline::error::AppError;
use faultline::ingest::{decode, parse_event, MediaType};
use faultline::models::Level;
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

use crate::common::{gzip, EventBuilder, StackFrame};

fn received() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 9, 12, 0, 0).unwrap()
}

fn body(value: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap()
}

// =============================================================================
// Media Types
// =============================================================================

#[rstest]
#[case("application/json", MediaType::Json)]
#[case("application/json; charset=utf-8", MediaType::Json)]
#[case("Application/JSON", MediaType::Json)]
#[case("application/octet-stream", MediaType::OctetStream)]
#[case("text/plain;charset=UTF-8", MediaType::PlainText)]
fn test_accepted_media_types(#[case] header: &str, #[case] expected: MediaType) {
    assert_eq!(MediaType::parse(Some(header)).unwrap(), expected);
}

#[rstest]
#[case(Some("application/xml"))]
#[case(Some("multipart/form-data"))]
#[case(None)]
fn test_rejected_media_types(#[case] header: Option<&str>) {
    let result = MediaType::parse(header);
    assert!(matches!(result, Err(AppError::UnsupportedMediaType(_))));
}

#[test]
fn test_unsupported_media_type_checked_before_body() {
    // Garbage body, but the media type decides first
    let result = decode(
        b"\x00\x01",
        Some("image/png"),
        None,
        &IngestConfig::default(),
        received(),
    );
    assert!(matches!(result, Err(AppError::UnsupportedMediaType(_))));
}

#[test]
fn test_plain_text_is_parsed_as_json() {
    let event = EventBuilder::new().with_message("hello").build();

    let decoded = decode(
        &body(&event),
        Some("text/plain"),
        None,
        &IngestConfig::default(),
        received(),
    )
    .unwrap();

    assert_eq!(decoded.message.as_deref(), Some("hello"));
}

// =============================================================================
// Compression
// =============================================================================

#[test]
fn test_gzip_octet_stream_matches_plain_json() {
    let event = EventBuilder::new()
        .with_event_id("e1")
        .with_exception("NullRef", "x is null")
        .build();
    let raw = body(&event);
    let config = IngestConfig::default();

    let plain = decode(&raw, Some("application/json"), None, &config, received()).unwrap();
    let sniffed = decode(
        &gzip(&raw),
        Some("application/octet-stream"),
        None,
        &config,
        received(),
    )
    .unwrap();
    let declared = decode(
        &gzip(&raw),
        Some("application/octet-stream"),
        Some("gzip"),
        &config,
        received(),
    )
    .unwrap();

    assert_eq!(sniffed.event_id, plain.event_id);
    assert_eq!(sniffed.exception, plain.exception);
    assert_eq!(sniffed.timestamp, plain.timestamp);
    assert_eq!(declared.exception, plain.exception);
}

#[test]
fn test_octet_stream_without_gzip_uses_raw_body() {
    let event = EventBuilder::new().with_message("raw").build();

    let decoded = decode(
        &body(&event),
        Some("application/octet-stream"),
        None,
        &IngestConfig::default(),
        received(),
    )
    .unwrap();

    assert_eq!(decoded.message.as_deref(), Some("raw"));
}

#[test]
fn test_speculative_decompression_can_be_disabled() {
    let event = EventBuilder::new().with_message("zipped").build();
    let config = IngestConfig {
        speculative_decompression: false,
        ..IngestConfig::default()
    };

    let result = decode(
        &gzip(&body(&event)),
        Some("application/octet-stream"),
        None,
        &config,
        received(),
    );

    assert!(matches!(result, Err(AppError::MalformedPayload(_))));
}

#[test]
fn test_raw_payload_limit() {
    let event = EventBuilder::new().with_message(&"x".repeat(2048)).build();
    let config = IngestConfig {
        max_payload_bytes: 1024,
        ..IngestConfig::default()
    };

    let result = decode(&body(&event), Some("application/json"), None, &config, received());

    assert!(matches!(result, Err(AppError::PayloadTooLarge(_))));
}

#[test]
fn test_declared_gzip_on_plain_json_is_malformed() {
    let result = decode(
        br#"{"event_id":"e1","message":"m"}"#,
        Some("application/json"),
        Some("gzip"),
        &IngestConfig::default(),
        received(),
    );

    assert!(matches!(result, Err(AppError::MalformedPayload(_))));
}

// =============================================================================
// Structure & Validation
// =============================================================================

#[rstest]
#[case(&b"not json"[..])]
#[case(&b"[1, 2, 3]"[..])]
#[case(&b"{\"event_id\": \"abc\""[..])]
#[case(&b""[..])]
fn test_malformed_payloads(#[case] data: &[u8]) {
    let result = parse_event(data, received());
    assert!(matches!(result, Err(AppError::MalformedPayload(_))));
}

#[test]
fn test_missing_event_id_fails_validation() {
    let result = parse_event(br#"{"message": "hi"}"#, received());
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));
}

#[rstest]
#[case("has space")]
#[case("semi;colon")]
fn test_bad_event_id_fails_validation(#[case] id: &str) {
    let event = json!({ "event_id": id, "message": "hi" });
    let result = parse_event(&body(&event), received());
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));
}

#[test]
fn test_event_id_too_long() {
    let event = json!({ "event_id": "a".repeat(65), "message": "hi" });
    let result = parse_event(&body(&event), received());
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));
}

#[test]
fn test_event_without_message_or_exception_fails_validation() {
    let event = json!({ "event_id": "abc", "level": "error" });
    let result = parse_event(&body(&event), received());
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));
}

#[test]
fn test_unknown_level_fails_validation() {
    let event = EventBuilder::new().with_message("hi").with_level("loud").build();
    let result = parse_event(&body(&event), received());
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));
}

#[test]
fn test_wrong_field_type_fails_validation() {
    let event = json!({ "event_id": "abc", "message": "hi", "release": 42 });
    let result = parse_event(&body(&event), received());
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));
}

#[test]
fn test_defaults_when_optional_fields_absent() {
    let event = json!({ "event_id": "abc", "message": "hi" });

    let decoded = parse_event(&body(&event), received()).unwrap();

    assert_eq!(decoded.timestamp, received());
    assert_eq!(decoded.level, Level::Error);
    assert!(decoded.exception.is_none());
    assert!(decoded.fingerprint_hint.is_none());
}

#[test]
fn test_rfc3339_timestamp() {
    let event = json!({
        "event_id": "abc",
        "message": "hi",
        "timestamp": "2024-01-09T13:00:00+01:00"
    });

    let decoded = parse_event(&body(&event), received()).unwrap();

    assert_eq!(decoded.timestamp, received());
}

#[rstest]
#[case(json!(-250000000000i64))]
#[case(json!(-1))]
#[case(json!("1900-01-01T00:00:00Z"))]
fn test_pre_epoch_timestamp_fails_validation(#[case] timestamp: serde_json::Value) {
    let event = json!({ "event_id": "abc", "message": "hi", "timestamp": timestamp });
    let result = parse_event(&body(&event), received());
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));
}

#[test]
fn test_far_future_timestamp_uses_received_at() {
    let event = json!({
        "event_id": "abc",
        "message": "hi",
        "timestamp": "9999-12-31T00:00:00Z"
    });

    let decoded = parse_event(&body(&event), received()).unwrap();

    assert_eq!(decoded.timestamp, received());
}

#[test]
fn test_nul_characters_are_stripped_from_text_fields() {
    let data = br#"{
        "event_id": "e1",
        "message": "boom\u0000tail",
        "environment": "pr\u0000d",
        "release": "1.0\u0000",
        "server_name": "web\u00001",
        "platform": "py\u0000thon",
        "culprit": "app.\u0000views",
        "exception": {"values": [{"type": "Key\u0000Error", "value": "x\u0000y"}]}
    }"#;

    let decoded = parse_event(data, received()).unwrap();

    assert_eq!(decoded.message.as_deref(), Some("boomtail"));
    assert_eq!(decoded.environment.as_deref(), Some("prod"));
    assert_eq!(decoded.release.as_deref(), Some("1.0"));
    assert_eq!(decoded.server_name.as_deref(), Some("web1"));
    assert_eq!(decoded.platform.as_deref(), Some("python"));
    assert_eq!(decoded.culprit.as_deref(), Some("app.views"));

    let exception = decoded.exception.unwrap();
    assert_eq!(exception.exception_type, "KeyError");
    assert_eq!(exception.value, "xy");
}

#[test]
fn test_message_of_only_nul_counts_as_missing() {
    let data = br#"{"event_id": "e1", "message": "\u0000"}"#;
    let result = parse_event(data, received());
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));
}

#[test]
fn test_logentry_message() {
    let event = json!({
        "event_id": "abc",
        "logentry": { "message": "User %s failed", "formatted": "User 42 failed" }
    });

    let decoded = parse_event(&body(&event), received()).unwrap();

    assert_eq!(decoded.message.as_deref(), Some("User 42 failed"));
}

#[test]
fn test_last_exception_is_primary() {
    let event = json!({
        "event_id": "abc",
        "exception": {
            "values": [
                { "type": "KeyError", "value": "'id'" },
                { "type": "ValueError", "value": "bad input" }
            ]
        }
    });

    let decoded = parse_event(&body(&event), received()).unwrap();
    let exception = decoded.exception.unwrap();

    assert_eq!(exception.exception_type, "ValueError");
    assert_eq!(exception.value, "bad input");
}

#[test]
fn test_bare_exception_array_and_frames() {
    let event = EventBuilder::new()
        .with_exception_and_stacktrace(
            "TypeError",
            "x is undefined",
            vec![
                StackFrame::new("lib/vendor.js", "dispatch").not_in_app(),
                StackFrame::new("src/app.js", "render").with_lineno(10),
            ],
        )
        .build();

    let decoded = parse_event(&body(&event), received()).unwrap();
    let exception = decoded.exception.unwrap();

    assert_eq!(exception.frames.len(), 2);
    assert_eq!(exception.frames[1].function.as_deref(), Some("render"));
    assert!(exception.frames[1].in_app);
    assert!(!exception.frames[0].in_app);
}

#[test]
fn test_transaction_is_culprit_fallback() {
    let event = EventBuilder::new()
        .with_message("hi")
        .with_transaction("/api/users")
        .build();

    let decoded = parse_event(&body(&event), received()).unwrap();

    assert_eq!(decoded.culprit.as_deref(), Some("/api/users"));
}

#[test]
fn test_fingerprint_hint_accepts_numbers() {
    let event = json!({ "event_id": "abc", "message": "hi", "fingerprint": ["db", 42] });

    let decoded = parse_event(&body(&event), received()).unwrap();

    assert_eq!(
        decoded.fingerprint_hint,
        Some(vec!["db".to_string(), "42".to_string()])
    );
}

#[test]
fn test_fingerprint_hint_rejects_objects() {
    let event = json!({ "event_id": "abc", "message": "hi", "fingerprint": [{"a": 1}] });
    let result = parse_event(&body(&event), received());
    assert!(matches!(result, Err(AppError::ValidationFailed(_))));
}

#[test]
fn test_blobs_are_kept_verbatim() {
    let raw = br#"{"event_id":"abc","message":"hi","tags":{ "b" : 2,"a":1 },"extra":[1, 2.50]}"#;

    let decoded = parse_event(raw, received()).unwrap();

    assert_eq!(decoded.blobs.tags.unwrap().get(), r#"{ "b" : 2,"a":1 }"#);
    assert_eq!(decoded.blobs.extra.unwrap().get(), "[1, 2.50]");
    assert!(decoded.blobs.request.is_none());
}
