use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} out of range: {value}"))
}

pub fn to_score(value: i64, field: &str) -> Result<u8> {
    match u8::try_from(value) {
        Ok(score) if score <= 100 => Ok(score),
        _ => Err(anyhow!("{field} out of range: {value}")),
    }
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_uuid(value: Option<String>, field: &str) -> Result<Option<Uuid>> {
    value
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| Uuid::parse_str(raw.trim()).with_context(|| format!("failed to parse {field}")))
        .transpose()
}

/// Comment lists are stored as JSON arrays in TEXT columns.
pub fn encode_list(values: &[String]) -> Result<String> {
    serde_json::to_string(values).context("failed to encode comment list")
}

pub fn decode_list(raw: &str, field: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).with_context(|| format!("failed to decode {field}"))
}
