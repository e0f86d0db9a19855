//! Column type classification.
//!
//! Every detector in [`DETECTORS`] scores the same bounded sample
//! independently; [`classify`] keeps the highest score and resolves ties in
//! favour of the earlier entry. The `string` fallback scores a constant 0.1,
//! so any detector that recognises the sample at all outranks it.

use std::{collections::HashSet, sync::OnceLock};

use regex::Regex;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
    data::{BOOLEAN_PAIRS, has_time_component, parse_numeric, parse_timestamp},
    schema::ColumnType,
};

pub type Detector = fn(&[&str]) -> f64;

/// Registration order doubles as tie-break order.
pub const DETECTORS: &[(ColumnType, Detector)] = &[
    (ColumnType::Uuid, detect_uuid),
    (ColumnType::Email, detect_email),
    (ColumnType::Phone, detect_phone),
    (ColumnType::Url, detect_url),
    (ColumnType::DateTime, detect_datetime),
    (ColumnType::Date, detect_date),
    (ColumnType::Time, detect_time),
    (ColumnType::Boolean, detect_boolean),
    (ColumnType::Integer, detect_integer),
    (ColumnType::Float, detect_float),
    (ColumnType::JsonObject, detect_json),
    (ColumnType::Categorical, detect_categorical),
    (ColumnType::Text, detect_text),
    (ColumnType::String, detect_string),
];

pub const STRING_FALLBACK_CONFIDENCE: f64 = 0.1;
const DATE_MIN_CONFIDENCE: f64 = 0.7;
const TEXT_MIN_AVERAGE_LENGTH: f64 = 50.0;
const TEXT_FULL_CONFIDENCE_LENGTH: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub data_type: ColumnType,
    pub confidence: f64,
}

impl Classification {
    pub const fn unknown() -> Self {
        Self {
            data_type: ColumnType::Unknown,
            confidence: 0.0,
        }
    }
}

/// Picks the best-scoring type for a sample of non-null values.
pub fn classify(sample: &[&str]) -> Classification {
    let mut best = Classification::unknown();
    if sample.is_empty() {
        return best;
    }
    for (data_type, detector) in DETECTORS {
        let confidence = detector(sample).clamp(0.0, 1.0);
        if confidence > best.confidence {
            best = Classification {
                data_type: *data_type,
                confidence,
            };
        }
    }
    best
}

/// Every detector's score in registration order.
pub fn score_all(sample: &[&str]) -> Vec<(ColumnType, f64)> {
    DETECTORS
        .iter()
        .map(|(data_type, detector)| {
            let confidence = if sample.is_empty() {
                0.0
            } else {
                detector(sample).clamp(0.0, 1.0)
            };
            (*data_type, confidence)
        })
        .collect()
}

fn fraction<F>(sample: &[&str], predicate: F) -> f64
where
    F: Fn(&str) -> bool,
{
    if sample.is_empty() {
        return 0.0;
    }
    let matched = sample.iter().filter(|value| predicate(value.trim())).count();
    matched as f64 / sample.len() as f64
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email pattern")
    })
}

fn phone_regexes() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"^\d{10}$",
            r"^\(\d{3}\)\s?\d{3}[-.\s]\d{4}$",
            r"^\d{3}[-.\s]\d{3}[-.\s]\d{4}$",
            r"^\+\d{1,3}[-.\s]?\(?\d{1,4}\)?(?:[-.\s]?\d{2,4}){2,3}$",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("phone pattern"))
        .collect()
    })
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^https?://[^\s/$.?#][^\s]*$").expect("url pattern"))
}

fn time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?:[01]?\d|2[0-3]):[0-5]\d(?::[0-5]\d)?|(?:0?[1-9]|1[0-2]):[0-5]\d(?::[0-5]\d)?\s?(?i:am|pm))$",
        )
        .expect("time pattern")
    })
}

fn detect_uuid(sample: &[&str]) -> f64 {
    fraction(sample, |value| {
        value.len() == 36 && Uuid::try_parse(value).is_ok()
    })
}

fn detect_email(sample: &[&str]) -> f64 {
    fraction(sample, |value| email_regex().is_match(value))
}

fn detect_phone(sample: &[&str]) -> f64 {
    fraction(sample, |value| {
        phone_regexes().iter().any(|regex| regex.is_match(value))
    })
}

fn detect_url(sample: &[&str]) -> f64 {
    fraction(sample, |value| url_regex().is_match(value))
}

fn detect_datetime(sample: &[&str]) -> f64 {
    let parsed = sample
        .iter()
        .filter_map(|value| parse_timestamp(value))
        .collect::<Vec<_>>();
    if !parsed.iter().any(has_time_component) {
        return 0.0;
    }
    parsed.len() as f64 / sample.len() as f64
}

fn detect_date(sample: &[&str]) -> f64 {
    let mut parsed = 0usize;
    let mut with_time = 0usize;
    for value in sample {
        if let Some(timestamp) = parse_timestamp(value) {
            parsed += 1;
            if has_time_component(&timestamp) {
                with_time += 1;
            }
        }
    }
    let total = sample.len() as f64;
    let weighted = (parsed as f64 / total) * (1.0 - with_time as f64 / total);
    if weighted > DATE_MIN_CONFIDENCE {
        weighted
    } else {
        0.0
    }
}

fn detect_time(sample: &[&str]) -> f64 {
    fraction(sample, |value| time_regex().is_match(value))
}

fn detect_boolean(sample: &[&str]) -> f64 {
    let lowered = sample
        .iter()
        .map(|value| value.trim().to_ascii_lowercase())
        .collect::<Vec<_>>();
    BOOLEAN_PAIRS
        .iter()
        .map(|(truthy, falsy)| {
            let matched = lowered
                .iter()
                .filter(|value| value.as_str() == *truthy || value.as_str() == *falsy)
                .count();
            matched as f64 / sample.len() as f64
        })
        .fold(0.0, f64::max)
}

fn detect_integer(sample: &[&str]) -> f64 {
    fraction(sample, |value| {
        parse_numeric(value).is_some_and(|number| number == number.trunc())
    })
}

fn detect_float(sample: &[&str]) -> f64 {
    fraction(sample, |value| {
        parse_numeric(value).is_some_and(|number| number.fract() != 0.0)
    })
}

fn detect_json(sample: &[&str]) -> f64 {
    fraction(sample, |value| {
        (value.starts_with('{') || value.starts_with('['))
            && matches!(
                serde_json::from_str::<JsonValue>(value),
                Ok(JsonValue::Object(_) | JsonValue::Array(_))
            )
    })
}

fn detect_categorical(sample: &[&str]) -> f64 {
    let distinct = sample.iter().copied().collect::<HashSet<_>>().len();
    if distinct <= 1 {
        return 0.0;
    }
    let ratio = distinct as f64 / sample.len() as f64;
    if ratio < 0.05 {
        0.9
    } else if ratio < 0.1 {
        0.8
    } else {
        0.0
    }
}

fn detect_text(sample: &[&str]) -> f64 {
    let total_chars: usize = sample.iter().map(|value| value.chars().count()).sum();
    let average = total_chars as f64 / sample.len() as f64;
    if average > TEXT_MIN_AVERAGE_LENGTH {
        (average / TEXT_FULL_CONFIDENCE_LENGTH).min(1.0)
    } else {
        0.0
    }
}

fn detect_string(_sample: &[&str]) -> f64 {
    STRING_FALLBACK_CONFIDENCE
}
