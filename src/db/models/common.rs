//! Common types and utilities shared across models.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Current time as stored in `created_at` / `updated_at` columns.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render epoch milliseconds the way API responses carry instants.
pub fn millis_to_rfc3339(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ms.to_string(),
    }
}

/// Parse a UTC RFC 3339 datetime (`YYYY-MM-DDTHH:MM:SS[.fff]Z`) into epoch
/// milliseconds. Numeric offsets, a lowercase `t`/`z`, a space separator and
/// surrounding whitespace are all rejected.
pub fn parse_rfc3339_millis(value: &str) -> Option<i64> {
    if !value.ends_with('Z') || value.as_bytes().get(10) != Some(&b'T') {
        return None;
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
}

/// A JSON number or numeric string, as clients send form-ish payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberInput {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumberInput {
    /// The integral value, if this input denotes one (`12`, `12.0`, `"12"`).
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            NumberInput::Int(i) => Some(*i),
            NumberInput::Float(f) => float_to_integer(*f),
            NumberInput::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return None;
                }
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(float_to_integer))
            }
        }
    }
}

fn float_to_integer(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}
