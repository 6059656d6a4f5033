//! Lenient timestamp parsing for client-supplied appointment times.
//!
//! Appointment times are wall-clock values without a zone. Offsets sent by
//! clients are dropped rather than converted.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const STORE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        })
        .or_else(|| {
            value
                .get(..16)
                .and_then(|head| NaiveDateTime::parse_from_str(&head.replace(' ', "T"), "%Y-%m-%dT%H:%M").ok())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(truncate_to_seconds)
}

/// Parses an optional query bound; blank counts as absent.
pub fn parse_optional_bound(raw: Option<&str>, field: &str) -> Result<Option<NaiveDateTime>, String> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => parse_datetime(value)
            .map(Some)
            .ok_or_else(|| format!("Invalid {} date-time: {}", field, value)),
    }
}

pub fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(STORE_FORMAT).to_string()
}

pub fn to_hhmm(value: &NaiveTime) -> String {
    value.format("%H:%M").to_string()
}

/// Parses `HH:MM` or `HH:MM:SS`.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let value = raw.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

fn truncate_to_seconds(value: NaiveDateTime) -> NaiveDateTime {
    value.with_nanosecond(0).unwrap_or(value)
}
