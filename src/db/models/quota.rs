//! Monthly usage quota data model.

use std::fmt;

use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// `YYYY-MM` in the quota reference timezone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthKey(String);

impl MonthKey {
    pub fn for_instant(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = instant.with_timezone(&offset);
        Self(format!("{:04}-{:02}", local.year(), local.month()))
    }

    pub fn parse(value: &str) -> Result<Self> {
        let bytes = value.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[4] == b'-'
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            bail!("invalid month key '{value}', expected YYYY-MM");
        }
        let month: u32 = value[5..].parse()?;
        if !(1..=12).contains(&month) {
            bail!("invalid month in key '{value}'");
        }
        Ok(Self(value.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRecord {
    pub month_key: MonthKey,
    pub usage_count: u32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    pub month_key: MonthKey,
    pub used: u32,
    pub limit: u32,
}

impl QuotaStatus {
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).expect("offset")
    }

    #[test]
    fn month_boundary_follows_reference_zone() {
        // 2026-10-31 16:00 UTC is already November 1st in Tokyo.
        let instant = Utc.with_ymd_and_hms(2026, 10, 31, 16, 0, 0).unwrap();
        assert_eq!(MonthKey::for_instant(instant, jst()).as_str(), "2026-11");

        let utc = FixedOffset::east_opt(0).expect("offset");
        assert_eq!(MonthKey::for_instant(instant, utc).as_str(), "2026-10");
    }

    #[test]
    fn parse_validates_shape() {
        assert!(MonthKey::parse("2026-01").is_ok());
        assert!(MonthKey::parse("2026-13").is_err());
        assert!(MonthKey::parse("2026-1").is_err());
        assert!(MonthKey::parse("26-01-01").is_err());
    }

    #[test]
    fn status_remaining_saturates() {
        let status = QuotaStatus {
            month_key: MonthKey::parse("2026-10").unwrap(),
            used: 5,
            limit: 3,
        };
        assert_eq!(status.remaining(), 0);
        assert!(status.is_exhausted());
    }
}
