use anyhow::Result;
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{decode_list, encode_list, parse_datetime, to_score},
    models::{ScoreRecord, SubScores},
};

fn row_to_score_record(row: &Row) -> Result<ScoreRecord> {
    let highlights: String = row.get("highlights")?;
    let improvements: String = row.get("improvements")?;
    let next_steps: String = row.get("next_steps")?;
    let assumptions: String = row.get("assumptions")?;
    let evaluated_at: String = row.get("evaluated_at")?;

    Ok(ScoreRecord {
        entry_id: row.get("entry_id")?,
        total_score: to_score(row.get("total_score")?, "total_score")?,
        scores: SubScores {
            finish_quality: to_score(row.get("finish_quality")?, "finish_quality")?,
            edge_and_cuticle: to_score(row.get("edge_and_cuticle")?, "edge_and_cuticle")?,
            thickness_balance: to_score(row.get("thickness_balance")?, "thickness_balance")?,
            design_balance: to_score(row.get("design_balance")?, "design_balance")?,
            durability_prediction: to_score(
                row.get("durability_prediction")?,
                "durability_prediction",
            )?,
        },
        highlights: decode_list(&highlights, "highlights")?,
        improvements: decode_list(&improvements, "improvements")?,
        next_steps: decode_list(&next_steps, "next_steps")?,
        assumptions: decode_list(&assumptions, "assumptions")?,
        caution: row.get("caution")?,
        confidence: row.get("confidence")?,
        evaluated_at: parse_datetime(&evaluated_at, "evaluated_at")?,
        photo_hash: row.get("photo_hash")?,
    })
}

pub(crate) fn load_score_record(conn: &Connection, entry_id: &str) -> Result<Option<ScoreRecord>> {
    let mut stmt = conn.prepare(
        "SELECT entry_id, total_score, finish_quality, edge_and_cuticle, thickness_balance,
                design_balance, durability_prediction, highlights, improvements, next_steps,
                assumptions, caution, confidence, evaluated_at, photo_hash
         FROM score_records
         WHERE entry_id = ?1",
    )?;

    let mut rows = stmt.query(params![entry_id])?;
    let record = match rows.next()? {
        Some(row) => Some(row_to_score_record(row)?),
        None => None,
    };
    Ok(record)
}

/// Inserts the entry's record or overwrites every field of the existing one.
pub(crate) fn upsert_score_record(conn: &Connection, record: &ScoreRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO score_records (
             entry_id, total_score, finish_quality, edge_and_cuticle, thickness_balance,
             design_balance, durability_prediction, highlights, improvements, next_steps,
             assumptions, caution, confidence, evaluated_at, photo_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT(entry_id) DO UPDATE SET
             total_score = excluded.total_score,
             finish_quality = excluded.finish_quality,
             edge_and_cuticle = excluded.edge_and_cuticle,
             thickness_balance = excluded.thickness_balance,
             design_balance = excluded.design_balance,
             durability_prediction = excluded.durability_prediction,
             highlights = excluded.highlights,
             improvements = excluded.improvements,
             next_steps = excluded.next_steps,
             assumptions = excluded.assumptions,
             caution = excluded.caution,
             confidence = excluded.confidence,
             evaluated_at = excluded.evaluated_at,
             photo_hash = excluded.photo_hash",
        params![
            record.entry_id,
            record.total_score,
            record.scores.finish_quality,
            record.scores.edge_and_cuticle,
            record.scores.thickness_balance,
            record.scores.design_balance,
            record.scores.durability_prediction,
            encode_list(&record.highlights)?,
            encode_list(&record.improvements)?,
            encode_list(&record.next_steps)?,
            encode_list(&record.assumptions)?,
            record.caution,
            record.confidence,
            record.evaluated_at.to_rfc3339(),
            record.photo_hash,
        ],
    )?;
    Ok(())
}

impl Database {
    pub async fn get_score_record(&self, entry_id: &str) -> Result<Option<ScoreRecord>> {
        let entry_id = entry_id.to_string();
        self.execute(move |conn| load_score_record(conn, &entry_id))
            .await
    }

    /// Stored photo hash for the entry, if it was ever evaluated.
    pub async fn get_scored_photo_hash(&self, entry_id: &str) -> Result<Option<String>> {
        let entry_id = entry_id.to_string();
        self.execute(move |conn| {
            let mut stmt =
                conn.prepare("SELECT photo_hash FROM score_records WHERE entry_id = ?1")?;
            let mut rows = stmt.query(params![entry_id])?;
            let hash = match rows.next()? {
                Some(row) => Some(row.get::<_, String>(0)?),
                None => None,
            };
            Ok(hash)
        })
        .await
    }
}
