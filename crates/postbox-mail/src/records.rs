//! Boundary schema for mailbox payloads.
//!
//! The provider's JSON is polymorphic: listings arrive as bare arrays or
//! wrapped objects, and field names differ between deployments. Instead of
//! probing `Value`s all over the client, each payload is resolved **once**
//! here into an explicit record type with a fixed key-resolution order
//! (earlier key wins).

use chrono::NaiveDateTime;
use serde_json::Value;

use postbox_core::timeparse::parse_instant;

/// Keys that may carry the email's timestamp, probed in order.
const TIME_KEYS: &[&str] = &[
    "created_at",
    "createdAt",
    "received_at",
    "receivedAt",
    "sent_at",
    "sentAt",
];

/// Keys that may carry the plain-text body, probed in order.
const TEXT_KEYS: &[&str] = &["content", "text", "text_content"];

/// Keys that may carry the HTML body, probed in order.
const HTML_KEYS: &[&str] = &["html_content", "htmlContent", "html"];

// ─────────────────────────────────────────────
// Listing records
// ─────────────────────────────────────────────

/// One email as seen in the listing endpoint. Transient, never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmailRecord {
    pub id: Option<String>,
    /// Raw timestamp value, whatever encoding the provider chose.
    pub timestamp_raw: Option<Value>,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
    pub preview: String,
}

impl EmailRecord {
    /// Resolve a listing entry into a record.
    pub fn from_value(value: &Value) -> Self {
        EmailRecord {
            id: id_field(value),
            timestamp_raw: TIME_KEYS
                .iter()
                .find_map(|key| value.get(*key).filter(|v| !v.is_null()).cloned()),
            subject: first_string(value, &["subject"]),
            body_text: first_string(value, TEXT_KEYS),
            body_html: first_string(value, HTML_KEYS),
            preview: first_string(value, &["preview", "snippet"]),
        }
    }
}

/// Full email body from the detail endpoint.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmailDetail {
    pub body_text: String,
    pub body_html: String,
}

impl EmailDetail {
    /// Resolve a detail payload, unwrapping a `{"data": {...}}` envelope once.
    pub fn from_value(value: &Value) -> Self {
        let inner = match value.get("data") {
            Some(data) if data.is_object() => data,
            _ => value,
        };
        EmailDetail {
            body_text: first_string(inner, TEXT_KEYS),
            body_html: first_string(inner, HTML_KEYS),
        }
    }
}

// ─────────────────────────────────────────────
// Listing normalization
// ─────────────────────────────────────────────

/// Normalize a listing payload to a flat array of email entries.
///
/// Supports a top-level array, an object wrapping `emails`/`data`/`items`,
/// and one additional level of unwrapping (`emails`/`items`) when that field
/// is itself an object. Anything else is a format failure.
pub fn unwrap_listing(payload: &Value) -> Option<Vec<Value>> {
    if let Some(array) = payload.as_array() {
        return Some(array.clone());
    }

    let obj = payload.as_object()?;
    let wrapped = ["emails", "data", "items"]
        .iter()
        .find_map(|key| obj.get(*key).filter(|v| !v.is_null()))?;

    if let Some(array) = wrapped.as_array() {
        return Some(array.clone());
    }
    if let Some(inner) = wrapped.as_object() {
        let deeper = ["emails", "items"]
            .iter()
            .find_map(|key| inner.get(*key).and_then(Value::as_array))?;
        return Some(deeper.clone());
    }
    None
}

// ─────────────────────────────────────────────
// Ordering
// ─────────────────────────────────────────────

/// An email record paired with its parsed instant, the ordering key.
#[derive(Clone, Debug)]
pub struct ParsedEmail {
    pub record: EmailRecord,
    pub instant: Option<NaiveDateTime>,
}

impl ParsedEmail {
    pub fn new(record: EmailRecord) -> Self {
        let instant = record.timestamp_raw.as_ref().and_then(parse_instant);
        ParsedEmail { record, instant }
    }
}

/// Order newest-first; entries without a parseable instant sort last,
/// keeping their original relative order (the sort is stable).
pub fn sort_newest_first(emails: &mut [ParsedEmail]) {
    use std::cmp::Ordering;
    emails.sort_by(|a, b| match (a.instant, b.instant) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

// ─────────────────────────────────────────────
// Field helpers
// ─────────────────────────────────────────────

/// First non-empty string among `keys`, else empty.
fn first_string(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| {
            value
                .get(*key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default()
        .to_string()
}

/// The `id` field, tolerating both string and numeric ids.
fn id_field(value: &Value) -> Option<String> {
    match value.get("id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
