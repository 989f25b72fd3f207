use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::TimestampError;

/// A timestamp as it arrives from a source platform.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTimestamp {
    /// Seconds since the unix epoch, UTC.
    Epoch(f64),
    /// Any textual date representation.
    Text(String),
    /// Already a naive UTC datetime.
    Naive(NaiveDateTime),
    /// A datetime carrying an offset.
    Zoned(DateTime<FixedOffset>),
}

/// Offset-bearing formats tried after RFC 3339 / RFC 2822.
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M %p",
    "%d %B %Y %H:%M",
    "%B %d, %Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
];

/// Reduce any supported timestamp to a timezone-naive UTC datetime.
pub fn normalize(raw: &RawTimestamp) -> Result<NaiveDateTime, TimestampError> {
    match raw {
        RawTimestamp::Epoch(secs) => from_epoch_seconds(*secs),
        RawTimestamp::Text(s) => parse_text(s),
        RawTimestamp::Naive(dt) => Ok(*dt),
        RawTimestamp::Zoned(dt) => Ok(dt.with_timezone(&Utc).naive_utc()),
    }
}

/// Normalize a timestamp field taken straight from a JSON document.
///
/// Numbers are epoch seconds and strings are parsed. A `{"$date": ...}`
/// wrapper (extended JSON for a stored datetime) holds either a date string
/// or epoch milliseconds, optionally as `{"$numberLong": "..."}`.
pub fn normalize_json(value: &Value) -> Result<NaiveDateTime, TimestampError> {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(secs) => from_epoch_seconds(secs),
            None => Err(TimestampError::UnsupportedType("number")),
        },
        Value::String(s) => parse_text(s),
        Value::Object(map) => match map.get("$date") {
            Some(Value::String(s)) => parse_text(s),
            Some(Value::Number(n)) => {
                let millis = n.as_f64().ok_or(TimestampError::UnsupportedType("number"))?;
                from_epoch_seconds(millis / 1000.0)
            }
            Some(Value::Object(inner)) => match inner.get("$numberLong").and_then(|v| v.as_str()) {
                Some(s) => {
                    let millis: f64 = s
                        .trim()
                        .parse()
                        .map_err(|_| TimestampError::Unparseable(s.to_string()))?;
                    from_epoch_seconds(millis / 1000.0)
                }
                None => Err(TimestampError::UnsupportedType("object")),
            },
            _ => Err(TimestampError::UnsupportedType("object")),
        },
        Value::Null => Err(TimestampError::UnsupportedType("null")),
        Value::Bool(_) => Err(TimestampError::UnsupportedType("bool")),
        Value::Array(_) => Err(TimestampError::UnsupportedType("array")),
    }
}

/// Calendar month bucket, e.g. "2024-01".
pub fn month_key(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m").to_string()
}

fn from_epoch_seconds(secs: f64) -> Result<NaiveDateTime, TimestampError> {
    if !secs.is_finite() {
        return Err(TimestampError::OutOfRange(secs));
    }
    let whole = secs.floor();
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return Err(TimestampError::OutOfRange(secs));
    }
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
        .map(|dt| dt.naive_utc())
        .ok_or(TimestampError::OutOfRange(secs))
}

fn parse_text(raw: &str) -> Result<NaiveDateTime, TimestampError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(TimestampError::Unparseable(raw.to_string()));
    }

    if let Ok(secs) = s.parse::<f64>() {
        return parse_numeric_text(s, secs, raw);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc).naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&Utc).naive_utc());
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Ok(dt.with_timezone(&Utc).naive_utc());
        }
    }

    // Offset-less strings are taken as UTC; a trailing Z carries no extra information.
    let naive = s.strip_suffix(['Z', 'z']).unwrap_or(s);
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Ok(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(naive, fmt) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return Ok(dt);
            }
        }
    }

    Err(TimestampError::Unparseable(raw.to_string()))
}

/// A numeric string is an epoch value only when it has a fractional part or
/// at least 10 digits. Shorter integers are compact calendar dates:
/// `YYYYMMDD`, or a bare `YYYY` read as January 1st.
fn parse_numeric_text(s: &str, secs: f64, raw: &str) -> Result<NaiveDateTime, TimestampError> {
    let digits = s.trim_start_matches(['+', '-']);
    let integral = digits.bytes().all(|b| b.is_ascii_digit());
    if !integral || digits.len() >= 10 {
        return from_epoch_seconds(secs);
    }

    let date = match digits.len() {
        8 => NaiveDate::parse_from_str(digits, "%Y%m%d").ok(),
        4 => digits
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        _ => None,
    };
    date.filter(|_| !s.starts_with('-'))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| TimestampError::Unparseable(raw.to_string()))
}
