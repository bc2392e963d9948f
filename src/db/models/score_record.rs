//! Score record data model.
//!
//! A `ScoreRecord` is keyed by the owning entry's id: one record per entry,
//! overwritten on every successful re-evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five sub-scores, in the order highlights are reported.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMetric {
    FinishQuality,
    EdgeAndCuticle,
    ThicknessBalance,
    DesignBalance,
    DurabilityPrediction,
}

impl ScoreMetric {
    pub const ORDERED: [ScoreMetric; 5] = [
        ScoreMetric::FinishQuality,
        ScoreMetric::EdgeAndCuticle,
        ScoreMetric::ThicknessBalance,
        ScoreMetric::DesignBalance,
        ScoreMetric::DurabilityPrediction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreMetric::FinishQuality => "finish_quality",
            ScoreMetric::EdgeAndCuticle => "edge_and_cuticle",
            ScoreMetric::ThicknessBalance => "thickness_balance",
            ScoreMetric::DesignBalance => "design_balance",
            ScoreMetric::DurabilityPrediction => "durability_prediction",
        }
    }

    /// Prefix expected on the matching highlight comment.
    pub fn label(&self) -> &'static str {
        match self {
            ScoreMetric::FinishQuality => "Finish",
            ScoreMetric::EdgeAndCuticle => "Edge & cuticle",
            ScoreMetric::ThicknessBalance => "Thickness",
            ScoreMetric::DesignBalance => "Design balance",
            ScoreMetric::DurabilityPrediction => "Durability",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubScores {
    pub finish_quality: u8,
    pub edge_and_cuticle: u8,
    pub thickness_balance: u8,
    pub design_balance: u8,
    pub durability_prediction: u8,
}

impl SubScores {
    pub fn get(&self, metric: ScoreMetric) -> u8 {
        match metric {
            ScoreMetric::FinishQuality => self.finish_quality,
            ScoreMetric::EdgeAndCuticle => self.edge_and_cuticle,
            ScoreMetric::ThicknessBalance => self.thickness_balance,
            ScoreMetric::DesignBalance => self.design_balance,
            ScoreMetric::DurabilityPrediction => self.durability_prediction,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScoreMetric, u8)> + '_ {
        ScoreMetric::ORDERED
            .into_iter()
            .map(move |metric| (metric, self.get(metric)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub entry_id: String,
    pub total_score: u8,
    pub scores: SubScores,
    pub highlights: Vec<String>,
    pub improvements: Vec<String>,
    pub next_steps: Vec<String>,
    pub assumptions: Vec<String>,
    pub caution: Option<String>,
    pub confidence: f64,
    pub evaluated_at: DateTime<Utc>,
    /// Content fingerprint of the photo that produced this result.
    pub photo_hash: String,
}
