// Timestamps - reading the several timestamp shapes found in stored documents

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Parse a stored timestamp.
///
/// Accepts `{seconds, nanoseconds}` / `{_seconds, _nanoseconds}` objects,
/// RFC 3339 strings, bare `YYYY-MM-DD` dates and epoch milliseconds.
/// Anything else (including an unparseable string) yields `None`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, nanos.min(999_999_999) as u32).single()
        }
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n.as_i64().and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Whether a JSON value has the structured `{seconds, nanoseconds}` shape.
pub fn is_structured_timestamp(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            (map.contains_key("seconds") || map.contains_key("_seconds")) && map.len() <= 2
        }
        _ => false,
    }
}

/// Render a timestamp for spreadsheets and status lines.
pub fn format_human(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Timestamp format stored on documents this service writes.
pub fn to_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_rfc3339() -> String {
    to_rfc3339(&Utc::now())
}

/// `YYYY-MM-DD` used in export file names.
pub fn today_iso_date() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
