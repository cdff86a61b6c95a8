//! Fingerprint sensor event decoder.
//!
//! The sensor process publishes free-text status lines on
//! `device/fingerprint-events`. This module converts each line into a
//! structured [`SensorEvent`].
//!
//! # Vocabulary
//!
//! ```text
//! Sensor ready | Sensor error                      -> SensorStatus
//! No match found | Fingerprint ID: #<n>            -> Match
//! Enroll success | Scan 1 successful | ...         -> Enroll (success/failure/progress)
//! Deleted ID <n> | Failed to delete ID <n>         -> Delete
//! Enrolled IDs: 1, 2, 5 | No enrolled fingerprints -> List
//! All fingerprints deleted                         -> DeleteAll
//! anything else                                    -> Unrecognized
//! ```
//!
//! # Matching Order
//!
//! Some phrases are substrings of others (`Timeout waiting for finger` is a
//! prefix of `Timeout waiting for finger removal`, and several enrollment
//! lines embed an `ID <n>` fragment). Exact literals are tried first, then
//! patterns that extract numbers, then the generic phrase tables.
//!
//! # Examples
//!
//! ```
//! use doorlock_core::FingerprintId;
//! use doorlock_protocol::decoder::{decode, SensorEvent};
//!
//! let event = decode("Fingerprint ID: #12");
//! assert_eq!(
//!     event,
//!     SensorEvent::Match { matched: true, id: Some(FingerprintId::new(12)) }
//! );
//!
//! // Unknown lines never fail
//! assert!(matches!(decode("firmware v2.1 booted"), SensorEvent::Unrecognized(_)));
//! ```

use doorlock_core::FingerprintId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

const SENSOR_READY: &str = "Sensor ready";
const SENSOR_ERROR: &str = "Sensor error";
const NO_MATCH: &str = "No match found";
const MATCH_PREFIX: &str = "Fingerprint ID: #";
const INVALID_ID: &str = "Invalid ID: Must be between 1 and 127";
const ID_IN_USE: &str = "already in use";
const IMAGE_TOO_MESSY: &str = "Image too messy";
const IMAGE_CONVERSION_PREFIX: &str = "Image conversion failed: Error ";
const MODEL_CREATION_PREFIX: &str = "Model creation failed: Error ";
const STORE_FAILED_PREFIX: &str = "Failed to store fingerprint: Error ";
const RETRY_SCAN_PREFIX: &str = "Retry scan ";
const DELETED_PREFIX: &str = "Deleted ID ";
const DELETE_FAILED_PREFIX: &str = "Failed to delete ID ";
const NO_ENROLLED: &str = "No enrolled fingerprints";
const ENROLLED_PREFIX: &str = "Enrolled IDs: ";
const ALL_DELETED: &str = "All fingerprints deleted";

const ENROLL_SUCCESS_PHRASES: [&str; 3] = [
    "Enroll success",
    "Enrollment successful",
    "Fingerprint model created",
];

const ENROLL_FAILURE_PHRASES: [&str; 6] = [
    "Enroll failed",
    "Scan 1 failed after max retries",
    "Scan 2 failed after max retries",
    "Timeout waiting for finger",
    "Timeout waiting for finger removal",
    "Fingerprints do not match",
];

const ENROLL_PROGRESS_PHRASES: [&str; 6] = [
    "Starting enrollment",
    "Place finger for first scan",
    "Place same finger for second scan",
    "Scan 1 successful",
    "Scan 2 successful",
    "Could not identify features",
];

/// Health report from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    Ready,
    Error,
}

/// Stage of an enrollment reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollPhase {
    /// Intermediate step (prompt, scan accepted, retry).
    Progress,
    /// Template stored.
    Success,
    /// Enrollment aborted.
    Failure,
}

impl EnrollPhase {
    /// `true` for the phases that end an enrollment.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, EnrollPhase::Success | EnrollPhase::Failure)
    }
}

/// One enrollment line from the sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollEvent {
    pub phase: EnrollPhase,

    /// Position mentioned in the line, if any.
    pub id: Option<FingerprintId>,

    /// Short failure reason for [`EnrollPhase::Failure`].
    pub error: Option<String>,

    /// Scan retries left, from `Retry scan <s>: <r> attempts remaining`.
    pub attempts_remaining: Option<u8>,

    /// The trimmed line as received.
    pub message: String,
}

impl EnrollEvent {
    fn new(phase: EnrollPhase, id: Option<FingerprintId>, message: &str) -> Self {
        Self {
            phase,
            id,
            error: None,
            attempts_remaining: None,
            message: message.to_string(),
        }
    }

    fn failed(id: Option<FingerprintId>, error: impl Into<String>, message: &str) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(EnrollPhase::Failure, id, message)
        }
    }
}

/// Structured form of a fingerprint sensor line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SensorEvent {
    SensorStatus(SensorStatus),

    /// Result of a scan outside of enrollment.
    Match {
        matched: bool,
        id: Option<FingerprintId>,
    },

    Enroll(EnrollEvent),

    /// Positions currently holding a template.
    List(BTreeSet<FingerprintId>),

    Delete {
        id: FingerprintId,
        success: bool,
    },

    DeleteAll {
        success: bool,
    },

    /// Line outside the known vocabulary.
    Unrecognized(String),
}

impl SensorEvent {
    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SensorEvent::SensorStatus(_) => "sensor_status",
            SensorEvent::Match { .. } => "match",
            SensorEvent::Enroll(_) => "enroll",
            SensorEvent::List(_) => "list",
            SensorEvent::Delete { .. } => "delete",
            SensorEvent::DeleteAll { .. } => "delete_all",
            SensorEvent::Unrecognized(_) => "unrecognized",
        }
    }
}

impl fmt::Display for SensorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorEvent::SensorStatus(SensorStatus::Ready) => write!(f, "sensor ready"),
            SensorEvent::SensorStatus(SensorStatus::Error) => write!(f, "sensor error"),
            SensorEvent::Match {
                matched: true,
                id: Some(id),
            } => write!(f, "match {id}"),
            SensorEvent::Match { .. } => write!(f, "no match"),
            SensorEvent::Enroll(event) => write!(f, "enroll {:?}: {}", event.phase, event.message),
            SensorEvent::List(positions) => write!(f, "list of {} positions", positions.len()),
            SensorEvent::Delete { id, success } => write!(f, "delete {id} success={success}"),
            SensorEvent::DeleteAll { success } => write!(f, "delete all success={success}"),
            SensorEvent::Unrecognized(raw) => write!(f, "unrecognized '{raw}'"),
        }
    }
}

/// Decode a raw sensor line.
///
/// Pure and total: every input yields a variant, unknown text yields
/// [`SensorEvent::Unrecognized`] carrying the trimmed line.
///
/// # Examples
///
/// ```
/// use doorlock_protocol::decoder::{decode, EnrollPhase, SensorEvent};
///
/// match decode("Enrollment successful for ID #4") {
///     SensorEvent::Enroll(event) => {
///         assert_eq!(event.phase, EnrollPhase::Success);
///         assert_eq!(event.id.map(|id| id.as_u32()), Some(4));
///     }
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub fn decode(raw: &str) -> SensorEvent {
    let line = raw.trim();

    match line {
        SENSOR_READY => return SensorEvent::SensorStatus(SensorStatus::Ready),
        SENSOR_ERROR => return SensorEvent::SensorStatus(SensorStatus::Error),
        NO_MATCH => {
            return SensorEvent::Match {
                matched: false,
                id: None,
            };
        }
        _ => {}
    }

    if let Some(id) = prefixed_number(line, MATCH_PREFIX) {
        return SensorEvent::Match {
            matched: true,
            id: Some(FingerprintId::new(id)),
        };
    }

    if let Some(event) = decode_enroll(line) {
        return SensorEvent::Enroll(event);
    }

    if let Some(id) = prefixed_number(line, DELETED_PREFIX) {
        return SensorEvent::Delete {
            id: FingerprintId::new(id),
            success: true,
        };
    }
    if let Some(id) = prefixed_number(line, DELETE_FAILED_PREFIX) {
        return SensorEvent::Delete {
            id: FingerprintId::new(id),
            success: false,
        };
    }

    if line == NO_ENROLLED {
        return SensorEvent::List(BTreeSet::new());
    }
    if let Some(positions) = parse_enrolled_ids(line) {
        return SensorEvent::List(positions);
    }

    if line == ALL_DELETED {
        return SensorEvent::DeleteAll { success: true };
    }

    SensorEvent::Unrecognized(line.to_string())
}

fn decode_enroll(line: &str) -> Option<EnrollEvent> {
    if line == INVALID_ID {
        return Some(EnrollEvent::failed(None, "Invalid ID", line));
    }

    let id = search_id(line);

    if line.contains(ID_IN_USE) {
        return Some(EnrollEvent::failed(id, "ID in use", line));
    }
    if contains_any(line, &ENROLL_SUCCESS_PHRASES) {
        return Some(EnrollEvent::new(EnrollPhase::Success, id, line));
    }
    if contains_any(line, &ENROLL_FAILURE_PHRASES) {
        return Some(EnrollEvent::failed(id, "Scan failed", line));
    }
    if line.contains(IMAGE_TOO_MESSY) {
        return Some(EnrollEvent::failed(id, IMAGE_TOO_MESSY, line));
    }

    let coded_failures = [
        (IMAGE_CONVERSION_PREFIX, "Image conversion error"),
        (MODEL_CREATION_PREFIX, "Model creation error"),
        (STORE_FAILED_PREFIX, "Store error"),
    ];
    for (prefix, reason) in coded_failures {
        if let Some(code) = prefixed_number(line, prefix) {
            return Some(EnrollEvent::failed(id, format!("{reason} {code}"), line));
        }
    }

    if let Some(remaining) = parse_retry_scan(line) {
        return Some(EnrollEvent {
            attempts_remaining: Some(remaining),
            ..EnrollEvent::new(EnrollPhase::Progress, id, line)
        });
    }
    if contains_any(line, &ENROLL_PROGRESS_PHRASES) {
        return Some(EnrollEvent::new(EnrollPhase::Progress, id, line));
    }

    None
}

fn contains_any(line: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| line.contains(phrase))
}

/// Leading run of ASCII digits, parsed. `None` if there are no digits or the
/// value does not fit.
fn leading_number(s: &str) -> Option<u32> {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(s.len(), |(i, _)| i);
    if end == 0 {
        return None;
    }
    s[..end].parse().ok()
}

fn prefixed_number(line: &str, prefix: &str) -> Option<u32> {
    line.strip_prefix(prefix).and_then(leading_number)
}

/// First `ID <n>` or `ID #<n>` fragment anywhere in the line.
fn search_id(line: &str) -> Option<FingerprintId> {
    line.match_indices("ID ").find_map(|(index, fragment)| {
        let rest = &line[index + fragment.len()..];
        let rest = rest.strip_prefix('#').unwrap_or(rest);
        leading_number(rest).map(FingerprintId::new)
    })
}

/// `Retry scan <s>: <r> attempts remaining`, returning `r`.
fn parse_retry_scan(line: &str) -> Option<u8> {
    let rest = line.strip_prefix(RETRY_SCAN_PREFIX)?;
    let mut chars = rest.chars();
    chars.next().filter(char::is_ascii_digit)?;
    let rest = chars.as_str().strip_prefix(": ")?;
    let mut chars = rest.chars();
    let remaining = chars.next().and_then(|c| c.to_digit(10))?;
    chars.as_str().strip_prefix(" attempts remaining")?;
    u8::try_from(remaining).ok()
}

fn parse_enrolled_ids(line: &str) -> Option<BTreeSet<FingerprintId>> {
    let rest = line.strip_prefix(ENROLLED_PREFIX)?;
    let end = rest
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == ',' || c.is_whitespace()))
        .map_or(rest.len(), |(i, _)| i);
    if end == 0 {
        return None;
    }

    let positions = rest[..end]
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|part| part.parse::<u32>().ok())
        .map(FingerprintId::new)
        .collect();
    Some(positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("42 rest"), Some(42));
        assert_eq!(leading_number("x42"), None);
        assert_eq!(leading_number(""), None);
        assert_eq!(leading_number("99999999999"), None);
    }

    #[test]
    fn test_search_id_skips_non_numeric_fragment() {
        assert_eq!(
            search_id("ID pending, stored at ID #8"),
            Some(FingerprintId::new(8))
        );
        assert_eq!(search_id("no identifier here"), None);
    }

    #[test]
    fn test_parse_retry_scan() {
        assert_eq!(parse_retry_scan("Retry scan 1: 2 attempts remaining"), Some(2));
        assert_eq!(parse_retry_scan("Retry scan 12: 2 attempts remaining"), None);
        assert_eq!(parse_retry_scan("Retry scan 1: two attempts remaining"), None);
    }

    #[test]
    fn test_removal_timeout_is_scan_failure() {
        let event = decode("Timeout waiting for finger removal");
        let SensorEvent::Enroll(event) = event else {
            panic!("expected enroll event");
        };
        assert_eq!(event.phase, EnrollPhase::Failure);
        assert_eq!(event.error.as_deref(), Some("Scan failed"));
    }

    #[test]
    fn test_enrolled_ids_trailing_text_ignored() {
        let expected: BTreeSet<_> = [1, 3].into_iter().map(FingerprintId::new).collect();
        assert_eq!(
            decode("Enrolled IDs: 1, 3 (2 total)"),
            SensorEvent::List(expected)
        );
    }

    #[test]
    fn test_enrolled_prefix_without_ids_is_unrecognized() {
        assert!(matches!(
            decode("Enrolled IDs: none"),
            SensorEvent::Unrecognized(_)
        ));
    }
}
