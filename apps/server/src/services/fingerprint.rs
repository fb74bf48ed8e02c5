//! Fingerprint engine.
//!
//! Turns a decoded event into a stable grouping key. Everything here is pure:
//! the same event and policy always produce the same fingerprint.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

use crate::models::{FrameInfo, IngestEvent};

/// Separator used in grouping keys (diamond character)
const GROUPING_SEPARATOR: &str = " ⋄ ";

/// Placeholder in a custom fingerprint that expands to the default key
const DEFAULT_PLACEHOLDER: &str = "{{ default }}";

/// Issue titles are stored in a VARCHAR(255)
const MAX_TITLE_LEN: usize = 255;

/// One regex substitution applied to exception values and messages
#[derive(Debug, Clone)]
pub struct NormalizationRule {
    pattern: Regex,
    replacement: String,
}

impl NormalizationRule {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.to_string(),
        })
    }

    fn apply(&self, input: &str) -> String {
        self.pattern
            .replace_all(input, self.replacement.as_str())
            .into_owned()
    }
}

/// Built-in rules, in application order. UUIDs go first so their hex groups
/// are not eaten by the number rule.
static DEFAULT_RULES: LazyLock<Vec<NormalizationRule>> = LazyLock::new(|| {
    [
        (
            r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b",
            "<uuid>",
        ),
        (r"(?i)\b0x[0-9a-f]+\b", "<addr>"),
        (r"\b\d{1,3}(?:\.\d{1,3}){3}\b", "<ip>"),
        (r"\b\d{4,}\b", "<num>"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| NormalizationRule::new(pattern, replacement).ok())
    .collect()
});

/// How fingerprints are derived: frame depth plus the normalization rule set
#[derive(Debug, Clone)]
pub struct FingerprintPolicy {
    frame_depth: usize,
    rules: Vec<NormalizationRule>,
}

impl FingerprintPolicy {
    /// Default rules with the given stack depth
    pub fn new(frame_depth: usize) -> Self {
        Self {
            frame_depth,
            rules: DEFAULT_RULES.clone(),
        }
    }

    /// Replaces the normalization rules
    pub fn with_rules(mut self, rules: Vec<NormalizationRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn frame_depth(&self) -> usize {
        self.frame_depth
    }

    /// Strips dynamic tokens (addresses, ids, numbers) from `input`
    pub fn normalize(&self, input: &str) -> String {
        self.rules
            .iter()
            .fold(input.trim().to_string(), |acc, rule| rule.apply(&acc))
    }
}

impl Default for FingerprintPolicy {
    fn default() -> Self {
        Self::new(crate::config::IngestConfig::DEFAULT_FRAME_DEPTH)
    }
}

/// Result of fingerprinting an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Human-readable key the hash was computed from
    pub key: String,
    /// SHA-256 of the key, hex encoded; the uniqueness key for issues
    pub hash: String,
    /// Display title for a new issue
    pub title: String,
}

/// Computes the fingerprint of an event
pub fn fingerprint(event: &IngestEvent, policy: &FingerprintPolicy) -> Fingerprint {
    let key = calculate_grouping_key(event, policy);
    Fingerprint {
        hash: hash_grouping_key(&key),
        title: get_title(event),
        key,
    }
}

/// Calculates the grouping key, honouring a custom fingerprint hint
pub fn calculate_grouping_key(event: &IngestEvent, policy: &FingerprintPolicy) -> String {
    match &event.fingerprint_hint {
        Some(parts) => parts
            .iter()
            .map(|part| {
                if part == DEFAULT_PLACEHOLDER {
                    default_grouping_key(event, policy)
                } else {
                    part.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(GROUPING_SEPARATOR),
        None => default_grouping_key(event, policy),
    }
}

/// Default grouping key.
///
/// With an exception: `type ⋄ normalized value ⋄ frames`.
/// Without: `normalized first message line ⋄ culprit`.
pub fn default_grouping_key(event: &IngestEvent, policy: &FingerprintPolicy) -> String {
    if let Some(exception) = &event.exception {
        let mut parts = vec![
            exception.exception_type.clone(),
            policy.normalize(&exception.value),
        ];
        let frames = frame_signature(&exception.frames, policy.frame_depth());
        if !frames.is_empty() {
            parts.push(frames);
        }
        return parts.join(GROUPING_SEPARATOR);
    }

    let message = event.message.as_deref().map(first_line).unwrap_or("");
    let culprit = event.culprit.as_deref().unwrap_or("<no culprit>");
    format!(
        "{}{}{}",
        policy.normalize(message),
        GROUPING_SEPARATOR,
        culprit
    )
}

/// Identifiers of the `depth` most recent frames, newest first.
///
/// When any frame is marked in-app only in-app frames count, so vendored
/// library frames do not split groups.
pub fn frame_signature(frames: &[FrameInfo], depth: usize) -> String {
    let any_in_app = frames.iter().any(|f| f.in_app);

    frames
        .iter()
        .rev()
        .filter(|f| !any_in_app || f.in_app)
        .filter_map(frame_identifier)
        .take(depth)
        .collect::<Vec<_>>()
        .join("|")
}

/// `module:function`, with the file basename standing in for a missing module.
/// Line numbers are left out on purpose.
fn frame_identifier(frame: &FrameInfo) -> Option<String> {
    let location = frame
        .module
        .as_deref()
        .or_else(|| frame.filename.as_deref().map(basename));

    match (location, frame.function.as_deref()) {
        (None, None) => None,
        (location, function) => Some(format!(
            "{}:{}",
            location.unwrap_or("?"),
            function.unwrap_or("?")
        )),
    }
}

fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Calculates the SHA256 hash of the grouping key
pub fn hash_grouping_key(grouping_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(grouping_key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Generates the issue title: "Type: first line of value", or the message
pub fn get_title(event: &IngestEvent) -> String {
    let title = match &event.exception {
        Some(exception) => {
            let first = first_line(&exception.value);
            if first.is_empty() {
                exception.exception_type.clone()
            } else {
                format!("{}: {}", exception.exception_type, first)
            }
        }
        None => event
            .message
            .as_deref()
            .map(first_line)
            .unwrap_or("<untitled>")
            .to_string(),
    };

    truncate(&title, MAX_TITLE_LEN)
}

fn first_line(s: &str) -> &str {
    s.trim().lines().next().unwrap_or("")
}

/// Truncates a string to at most `max_len` characters
pub fn truncate(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
