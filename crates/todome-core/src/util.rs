//! Shared utility functions used across multiple modules.

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Current time as an ISO-8601 UTC string with millisecond precision.
pub fn now_iso() -> String {
    format_timestamp(Utc::now())
}

/// Format a timestamp the way records store it (`2024-01-01T00:00:00.000Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored ISO-8601 timestamp. Offsets are normalized to UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Order two timestamps as instants; falls back to text order when either
/// side does not parse.
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// New globally unique, time-sortable record identifier (UUID v7).
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_rejects_empty() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some("   ".to_string())), None);
    }

    #[test]
    fn normalize_text_option_trims_value() {
        assert_eq!(
            normalize_text_option(Some(" https://example.com ".to_string())),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn is_http_url_accepts_valid_schemes() {
        assert!(is_http_url("http://localhost"));
        assert!(is_http_url("https://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn timestamps_use_millisecond_utc_format() {
        let now = now_iso();
        assert_eq!(now.len(), "2024-01-01T00:00:00.000Z".len());
        assert!(now.ends_with('Z'));
        assert!(parse_timestamp(&now).is_some());
    }

    #[test]
    fn parse_timestamp_normalizes_offsets() {
        let utc = parse_timestamp("2024-03-01T10:00:00.000Z").unwrap();
        let offset = parse_timestamp("2024-03-01T12:00:00.000+02:00").unwrap();
        assert_eq!(utc, offset);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn compare_timestamps_uses_instants() {
        assert_eq!(
            compare_timestamps("2024-03-01T10:00:00.000Z", "2024-03-01T11:00:00.000+02:00"),
            Ordering::Greater
        );
        assert_eq!(
            compare_timestamps("2024-03-01T10:00:00Z", "2024-03-01T10:00:00.000Z"),
            Ordering::Equal
        );
    }
}
