use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, to_u32},
    models::{MonthKey, QuotaRecord, ScoreRecord},
};

use super::score_records::upsert_score_record;

/// Result of the billing transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingOutcome {
    Committed {
        record: ScoreRecord,
        quota: QuotaRecord,
    },
    /// Another evaluation used the last slot after the pre-check passed.
    /// No record was written and usage was not incremented.
    QuotaExhausted { quota: QuotaRecord },
}

fn load_quota(conn: &Connection, month_key: &MonthKey) -> Result<Option<QuotaRecord>> {
    let row = conn
        .query_row(
            "SELECT usage_count, updated_at FROM usage_quotas WHERE month_key = ?1",
            params![month_key.as_str()],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    row.map(|(usage_count, updated_at)| -> Result<QuotaRecord> {
        Ok(QuotaRecord {
            month_key: month_key.clone(),
            usage_count: to_u32(usage_count, "usage_count")?,
            updated_at: parse_datetime(&updated_at, "updated_at")?,
        })
    })
    .transpose()
}

/// Inserts a zeroed row for the month unless one exists. The primary key on
/// `month_key` makes a second insert a no-op.
fn ensure_quota_row(conn: &Connection, month_key: &MonthKey, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO usage_quotas (month_key, usage_count, updated_at)
         VALUES (?1, 0, ?2)
         ON CONFLICT(month_key) DO NOTHING",
        params![month_key.as_str(), now.to_rfc3339()],
    )?;
    Ok(())
}

impl Database {
    /// Returns the month's quota record, creating it with zero usage if absent.
    pub async fn fetch_or_create_quota(
        &self,
        month_key: &MonthKey,
        now: DateTime<Utc>,
    ) -> Result<QuotaRecord> {
        let month_key = month_key.clone();
        self.execute_immediate(move |tx| {
            ensure_quota_row(tx, &month_key, now)?;
            load_quota(tx, &month_key)?
                .with_context(|| format!("quota row for {month_key} vanished"))
        })
        .await
    }

    pub async fn get_quota(&self, month_key: &MonthKey) -> Result<Option<QuotaRecord>> {
        let month_key = month_key.clone();
        self.execute(move |conn| load_quota(conn, &month_key)).await
    }

    /// Writes the score record and bills one evaluation in a single
    /// transaction. The increment only applies while `usage_count < limit`;
    /// otherwise no record is written and usage is left unchanged. A failed
    /// record write rolls the increment back.
    pub async fn commit_evaluation(
        &self,
        record: ScoreRecord,
        month_key: &MonthKey,
        limit: u32,
    ) -> Result<BillingOutcome> {
        let month_key = month_key.clone();
        self.execute_immediate(move |tx| {
            let now = record.evaluated_at;
            ensure_quota_row(tx, &month_key, now)?;

            let billed = tx.execute(
                "UPDATE usage_quotas
                 SET usage_count = usage_count + 1,
                     updated_at = ?1
                 WHERE month_key = ?2 AND usage_count < ?3",
                params![now.to_rfc3339(), month_key.as_str(), i64::from(limit)],
            )?;

            if billed == 0 {
                let quota = load_quota(tx, &month_key)?
                    .with_context(|| format!("quota row for {month_key} vanished"))?;
                return Ok(BillingOutcome::QuotaExhausted { quota });
            }

            upsert_score_record(tx, &record)
                .with_context(|| format!("failed to store score for entry {}", record.entry_id))?;
            let quota = load_quota(tx, &month_key)?
                .with_context(|| format!("quota row for {month_key} vanished"))?;

            Ok(BillingOutcome::Committed { record, quota })
        })
        .await
    }
}
