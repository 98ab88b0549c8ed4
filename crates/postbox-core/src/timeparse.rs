//! Timestamp parsing: heterogeneous wire encodings to a comparable instant.
//!
//! Mailbox providers emit timestamps as epoch seconds, epoch milliseconds,
//! numeric strings, or ISO-8601-ish strings with anything from zero to nine
//! fractional digits. Everything is normalized to a **UTC-naive**
//! [`NaiveDateTime`] so instants from different encodings compare uniformly.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Epoch values above this are treated as milliseconds, not seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// Truncates sub-microsecond fractional seconds (chrono parses at most
/// nanoseconds, but providers have been seen emitting more digits).
fn subsecond_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\.\d{6})\d+").expect("static regex"))
}

/// Parse a raw timestamp value into a UTC-naive instant.
///
/// Accepted encodings:
/// - integer or float epoch seconds (values > 1e12 are epoch millis)
/// - digit-only strings under the same rule
/// - RFC 3339 / ISO-8601 strings; a trailing `Z` or explicit offset is
///   converted to UTC, offset-free values are taken as already UTC
///
/// Returns `None` for null, empty, or unparseable values. Never panics.
pub fn parse_instant(raw: &Value) -> Option<NaiveDateTime> {
    match raw {
        Value::Number(n) => from_epoch(n.as_f64()?),
        Value::String(s) => parse_str(s),
        _ => None,
    }
}

fn parse_str(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return from_epoch(raw.parse::<f64>().ok()?);
    }

    let raw = subsecond_re().replace(raw, "$1");

    // Offset-bearing forms first (this covers the trailing-Z case).
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Some(dt.naive_utc());
    }

    // Offset-free forms are interpreted as UTC.
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&raw, format) {
            return Some(dt);
        }
    }

    None
}

fn from_epoch(mut timestamp: f64) -> Option<NaiveDateTime> {
    if timestamp > EPOCH_MILLIS_THRESHOLD {
        timestamp /= 1000.0;
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9).round() as u32;
    DateTime::<Utc>::from_timestamp(secs as i64, nanos).map(|dt| dt.naive_utc())
}
