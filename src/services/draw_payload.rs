//! Parsing of draw-result payloads from the external provider.
//!
//! Providers disagree on field names, so each field is looked up through an
//! ordered list of synonyms and the first non-empty value wins.

use crate::models::Outcome;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;

pub const ROUND_CODE_FIELDS: &[&str] = &["issue", "issueCode", "expect"];
pub const NUMBERS_FIELDS: &[&str] = &["code", "nums", "opencode"];
pub const DRAW_TIME_FIELDS: &[&str] = &["openTime", "open_time", "opentime", "time"];

const NAIVE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NAIVE_ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Stored raw payloads are capped at this many characters
pub const RAW_PAYLOAD_MAX_CHARS: usize = 255;

#[derive(Error, Debug, PartialEq)]
pub enum PayloadError {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing round code")]
    MissingRoundCode,

    #[error("missing drawn numbers")]
    MissingNumbers,

    #[error("invalid drawn numbers: {0}")]
    InvalidNumbers(String),

    #[error("unrecognised draw time: {0}")]
    InvalidDrawTime(String),
}

/// The usable part of a provider payload
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDraw {
    pub round_code: String,
    pub outcome: Outcome,
    /// `None` when the provider sent no draw time
    pub draw_time: Option<DateTime<Utc>>,
    pub raw_payload: String,
}

/// Scalar JSON value as text; empty strings count as absent
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join(","),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn first_field(payload: &Value, synonyms: &[&str]) -> Option<String> {
    synonyms
        .iter()
        .filter_map(|name| payload.get(*name))
        .find_map(scalar_text)
}

/// Parse the first three values of a comma-joined number list
pub fn parse_numbers(raw: &str) -> Result<Outcome, PayloadError> {
    let numbers = raw
        .split(',')
        .take(3)
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| PayloadError::InvalidNumbers(raw.to_string()))?;

    match numbers.as_slice() {
        [n1, n2, n3] => Outcome::from_numbers(*n1, *n2, *n3).map_err(PayloadError::InvalidNumbers),
        _ => Err(PayloadError::InvalidNumbers(raw.to_string())),
    }
}

/// Parse a provider timestamp.
///
/// `YYYY-MM-DD HH:MM:SS` and offset-less ISO-8601 are read as local time at
/// `source_offset`. Providers append `Z` to their local clock, so a trailing
/// `Z` is dropped and the time is still read at `source_offset`. An explicit
/// numeric offset, with or without a colon, is honoured as is.
pub fn parse_draw_time(raw: &str, source_offset: FixedOffset) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let raw = raw.strip_suffix(|c: char| c == 'Z' || c == 'z').unwrap_or(raw);

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(raw, format).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, NAIVE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, NAIVE_ISO_FORMAT))
        .ok()?;

    source_offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Truncate on a character boundary
pub fn truncate_raw(raw: &str) -> String {
    raw.chars().take(RAW_PAYLOAD_MAX_CHARS).collect()
}

pub fn parse_draw_payload(payload: &Value, source_offset: FixedOffset) -> Result<ParsedDraw, PayloadError> {
    if !payload.is_object() {
        return Err(PayloadError::NotAnObject);
    }

    let round_code =
        first_field(payload, ROUND_CODE_FIELDS).ok_or(PayloadError::MissingRoundCode)?;
    let numbers = first_field(payload, NUMBERS_FIELDS).ok_or(PayloadError::MissingNumbers)?;
    let outcome = parse_numbers(&numbers)?;

    let draw_time = match first_field(payload, DRAW_TIME_FIELDS) {
        Some(raw) => Some(
            parse_draw_time(&raw, source_offset).ok_or(PayloadError::InvalidDrawTime(raw))?,
        ),
        None => None,
    };

    Ok(ParsedDraw {
        round_code,
        outcome,
        draw_time,
        raw_payload: truncate_raw(&payload.to_string()),
    })
}
