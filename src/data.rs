//! Raw cell parsing helpers shared by dataset loading and type detection.
//!
//! Every value that reaches the classifier is a trimmed, non-placeholder
//! string. The helpers here decide what counts as a null cell and how numeric
//! and temporal tokens are recognised.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};

/// Lexeme pairs accepted by the boolean detector, compared lower-cased.
pub const BOOLEAN_PAIRS: &[(&str, &str)] = &[
    ("true", "false"),
    ("yes", "no"),
    ("y", "n"),
    ("1", "0"),
    ("on", "off"),
    ("active", "inactive"),
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Parses any supported timestamp shape. Date-only tokens resolve to midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = parse_naive_datetime(trimmed) {
        return Some(parsed);
    }
    parse_naive_date(trimmed)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

pub fn has_time_component(timestamp: &NaiveDateTime) -> bool {
    let time = timestamp.time();
    time.hour() != 0 || time.minute() != 0 || time.second() != 0 || time.nanosecond() != 0
}

/// Parses a finite number. `inf`, `NaN` and friends are not numeric here.
pub fn parse_numeric(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Some(parsed),
        _ => None,
    }
}

pub fn is_placeholder_token(lowered: &str) -> bool {
    let stripped = lowered.trim_start_matches('#');
    matches!(
        stripped,
        "na" | "n/a" | "n.a." | "nan" | "null" | "none" | "missing"
    ) || (!stripped.is_empty() && stripped.chars().all(|c| c == '-'))
}

/// Normalises a raw cell: blank and placeholder cells become `None`.
pub fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if is_placeholder_token(&trimmed.to_ascii_lowercase()) {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_naive_date_supports_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(parse_naive_date("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_date("06/05/2024").unwrap(), expected);
        assert_eq!(parse_naive_date("2024/05/06").unwrap(), expected);
    }

    #[test]
    fn parse_timestamp_resolves_dates_to_midnight() {
        let parsed = parse_timestamp("2024-05-06").expect("date parses");
        assert!(!has_time_component(&parsed));

        let parsed = parse_timestamp("2024-05-06T14:30:00Z").expect("rfc3339 parses");
        assert!(has_time_component(&parsed));

        let parsed = parse_timestamp("2024-05-06 14:30").expect("short datetime parses");
        assert_eq!(parsed.time().hour(), 14);
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn parse_numeric_rejects_non_finite_tokens() {
        assert_eq!(parse_numeric(" 42 "), Some(42.0));
        assert_eq!(parse_numeric("-1.5"), Some(-1.5));
        assert_eq!(parse_numeric("inf"), None);
        assert_eq!(parse_numeric("NaN"), None);
        assert_eq!(parse_numeric("12abc"), None);
    }

    #[test]
    fn normalize_cell_treats_placeholders_as_null() {
        assert_eq!(normalize_cell("  "), None);
        assert_eq!(normalize_cell("N/A"), None);
        assert_eq!(normalize_cell("#NULL"), None);
        assert_eq!(normalize_cell("---"), None);
        assert_eq!(normalize_cell(" Alice "), Some("Alice".to_string()));
        assert_eq!(normalize_cell("-5"), Some("-5".to_string()));
    }
}
