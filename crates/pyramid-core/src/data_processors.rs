use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::error::{PyramidError, Result};

// ── Field lookup ──────────────────────────────────────────────────────────────

/// Fetch `key` from a record, treating an explicit JSON `null` as absent.
pub fn field<'a>(record: &'a Value, key: &str) -> Option<&'a Value> {
    match record.get(key) {
        None | Some(Value::Null) => None,
        Some(v) => Some(v),
    }
}

/// Whether `key` appears (even as `null`) on at least one record.
pub fn has_column(records: &[Value], key: &str) -> bool {
    records
        .iter()
        .any(|r| r.as_object().is_some_and(|obj| obj.contains_key(key)))
}

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Parses transaction dates from the formats commonly found in ledgers.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Read a ledger date cell as a UTC instant.
    ///
    /// Strings may be RFC 3339 (a bare `Z` suffix is accepted), RFC 2822, or
    /// one of the day-first / month-first / ISO patterns below; date-only
    /// strings mean midnight UTC. Numbers are Unix seconds. Anything else,
    /// including `null`, is `None`.
    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => Self::parse_str(s.trim()),
            Value::Number(n) => n.as_i64().map_or_else(
                || n.as_f64().and_then(from_unix_seconds),
                |secs| DateTime::from_timestamp(secs, 0),
            ),
            _ => None,
        }
    }

    /// Like [`parse`](Self::parse), but a value that cannot be read is an error.
    pub fn coerce(field_name: &str, value: Option<&Value>) -> Result<DateTime<Utc>> {
        let Some(value) = value else {
            return Err(PyramidError::coercion(
                field_name,
                &Value::Null,
                "timestamp is missing",
            ));
        };
        Self::parse(value)
            .ok_or_else(|| PyramidError::coercion(field_name, value, "unrecognised date format"))
    }

    fn parse_str(s: &str) -> Option<DateTime<Utc>> {
        if s.is_empty() {
            return None;
        }
        let parsed = parse_with_offset(s)
            .or_else(|| parse_naive_datetime(s))
            .or_else(|| parse_naive_date(s));
        if parsed.is_none() {
            warn!("Unrecognised date \"{}\"", s);
        }
        parsed
    }
}

// Slash dates are month-first; day-first only matches when the first field
// cannot be a month (e.g. 13/04/2021).
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"];

fn from_unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
}

fn parse_with_offset(s: &str) -> Option<DateTime<Utc>> {
    let rfc3339 = match s.strip_suffix('Z') {
        Some(head) => DateTime::parse_from_rfc3339(&format!("{head}+00:00")),
        None => DateTime::parse_from_rfc3339(s),
    };
    rfc3339
        .or_else(|_| DateTime::parse_from_rfc2822(s))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive_datetime(s: &str) -> Option<DateTime<Utc>> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_naive_date(s: &str) -> Option<DateTime<Utc>> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

// ── AmountProcessor ───────────────────────────────────────────────────────────

/// Converts amount, price and quantity cells to `f64`.
pub struct AmountProcessor;

impl AmountProcessor {
    /// Coerce a numeric cell.
    ///
    /// Returns `Ok(None)` for a missing value (absent, `null`, blank string or
    /// the literal `"nan"`), which callers filter out. Anything else that is
    /// not a finite number is a [`PyramidError::Coercion`].
    pub fn coerce(field_name: &str, value: Option<&Value>) -> Result<Option<f64>> {
        let Some(value) = value else {
            return Ok(None);
        };
        match value {
            Value::Number(n) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(Some)
                .ok_or_else(|| PyramidError::coercion(field_name, value, "not a finite number")),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                    return Ok(None);
                }
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(Some)
                    .ok_or_else(|| PyramidError::coercion(field_name, value, "not a number"))
            }
            _ => Err(PyramidError::coercion(field_name, value, "not a number")),
        }
    }
}

// ── CustomerIdProcessor ───────────────────────────────────────────────────────

fn integral_float_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(-?\d+)\.0+$").expect("regex is valid"))
}

/// Normalises customer identifiers into opaque string keys.
pub struct CustomerIdProcessor;

impl CustomerIdProcessor {
    /// Coerce an identifier cell.
    ///
    /// Strings are trimmed; numbers are rendered without a trailing `.0`, so
    /// `17850`, `17850.0` and `"17850.0"` all map to `"17850"`. Missing or
    /// blank values yield `Ok(None)`.
    pub fn coerce(field_name: &str, value: Option<&Value>) -> Result<Option<String>> {
        let Some(value) = value else {
            return Ok(None);
        };
        let raw = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.to_string()
                } else if let Some(u) = n.as_u64() {
                    u.to_string()
                } else {
                    n.to_string()
                }
            }
            _ => {
                return Err(PyramidError::coercion(
                    field_name,
                    value,
                    "identifier must be a string or number",
                ))
            }
        };
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::normalize(&raw)))
    }

    /// Strip a purely zero fractional part from a numeric identifier.
    pub fn normalize(raw: &str) -> String {
        match integral_float_re().captures(raw) {
            Some(caps) => caps[1].to_string(),
            None => raw.to_string(),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
