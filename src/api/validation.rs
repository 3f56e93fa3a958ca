//! Input validation for API requests.
//!
//! Field validators return `Result<_, String>` with the message that ends up
//! in the `details` of a 400 response. Handlers collect them with
//! `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

use super::error::ApiError;
use crate::db::{parse_rfc3339_millis, GoalPeriod, NumberInput, NOTE_MAX_LEN, PRESETS};
use crate::stats::TzOffset;

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 72;

pub const ISO_WEEK_RANGE: std::ops::RangeInclusive<i64> = 1..=53;
pub const YEAR_RANGE: std::ops::RangeInclusive<i64> = 2000..=2100;

lazy_static! {
    /// Something@something.something, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(r"^\S+@\S+\.\S+$").unwrap();
}

/// Trim and lowercase an email so storage and lookup agree.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an already normalized email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email".to_string());
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    let len = password.chars().count();

    if len < PASSWORD_MIN_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_LEN
        ));
    }

    if len > PASSWORD_MAX_LEN {
        return Err(format!(
            "Password must be at most {} characters",
            PASSWORD_MAX_LEN
        ));
    }

    Ok(())
}

/// An integer from a number or numeric string
pub fn validate_integer(value: &NumberInput) -> Result<i64, String> {
    value
        .as_integer()
        .ok_or_else(|| "Expected an integer".to_string())
}

pub fn validate_preset(value: &NumberInput) -> Result<i64, String> {
    let preset = validate_integer(value)?;

    if !PRESETS.contains(&preset) {
        return Err("Preset must be one of 8, 12, 21".to_string());
    }

    Ok(preset)
}

/// Parse a UTC (`Z`) RFC 3339 datetime into epoch milliseconds
pub fn validate_datetime(value: &str) -> Result<i64, String> {
    parse_rfc3339_millis(value).ok_or_else(|| "Invalid datetime".to_string())
}

/// Notes are measured before trimming.
pub fn validate_note(note: &str) -> Result<(), String> {
    if note.chars().count() > NOTE_MAX_LEN {
        return Err(format!(
            "Note must be at most {} characters",
            NOTE_MAX_LEN
        ));
    }

    Ok(())
}

pub fn validate_period(value: &str) -> Result<GoalPeriod, String> {
    GoalPeriod::parse(value).ok_or_else(|| "Period must be one of week, month".to_string())
}

pub fn validate_hours_target(value: &NumberInput) -> Result<i64, String> {
    let hours = validate_integer(value)?;

    if hours < 1 {
        return Err("Hours target must be at least 1".to_string());
    }

    Ok(hours)
}

pub fn validate_iso_week(value: &NumberInput) -> Result<i64, String> {
    let week = validate_integer(value)?;

    if !ISO_WEEK_RANGE.contains(&week) {
        return Err("ISO week must be between 1 and 53".to_string());
    }

    Ok(week)
}

pub fn validate_year(value: &NumberInput) -> Result<i64, String> {
    let year = validate_integer(value)?;

    if !YEAR_RANGE.contains(&year) {
        return Err("Year must be between 2000 and 2100".to_string());
    }

    Ok(year)
}

/// Resource ids are UUIDs
pub fn validate_id(id: &str) -> Result<(), String> {
    uuid::Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| "Invalid id".to_string())
}

/// Check an `:id` path segment before it reaches the database
pub fn validate_path_id(id: &str) -> Result<(), ApiError> {
    validate_id(id).map_err(|message| ApiError::validation_field("id", message))
}

/// Parse `tzOffsetMinutes`; absent or blank means UTC.
pub fn validate_tz_offset(value: Option<&str>) -> Result<TzOffset, String> {
    let Some(raw) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(TzOffset::default());
    };

    let minutes = NumberInput::Text(raw.to_string())
        .as_integer()
        .ok_or_else(|| "Expected an integer".to_string())?;

    TzOffset::new(minutes).map_err(|e| e.to_string())
}
