use serde::{Deserialize, Serialize};

use crate::db::SubScores;

/// Structured outcome returned by either gateway strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    pub total_score: u8,
    pub scores: SubScores,
    pub highlights: Vec<String>,
    pub improvements: Vec<String>,
    pub next_steps: Vec<String>,
    pub caution: Option<String>,
    pub confidence: f64,
    pub assumptions: Vec<String>,
}

/// Wire shape of the scoring endpoint's JSON body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScorePayload {
    pub total_score: i64,
    pub scores: ScoresPayload,
    #[serde(default)]
    pub highlights: Option<Vec<String>>,
    #[serde(default)]
    pub improvements: Option<Vec<String>>,
    #[serde(default)]
    pub next_steps: Option<Vec<String>>,
    #[serde(default)]
    pub caution: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub assumptions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoresPayload {
    pub finish_quality: i64,
    pub edge_and_cuticle: i64,
    pub thickness_balance: i64,
    pub design_balance: i64,
    pub durability_prediction: i64,
}

fn score_in_range(value: i64, field: &str) -> Result<u8, String> {
    match u8::try_from(value) {
        Ok(score) if score <= 100 => Ok(score),
        _ => Err(format!("{field} must be within 0..=100, got {value}")),
    }
}

impl ScorePayload {
    /// Range-checks every numeric field. Missing or null lists become empty,
    /// blank caution text becomes `None`.
    pub fn validate(self) -> Result<ScoreResult, String> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence must be within 0..=1, got {}",
                self.confidence
            ));
        }

        Ok(ScoreResult {
            total_score: score_in_range(self.total_score, "total_score")?,
            scores: SubScores {
                finish_quality: score_in_range(self.scores.finish_quality, "finish_quality")?,
                edge_and_cuticle: score_in_range(self.scores.edge_and_cuticle, "edge_and_cuticle")?,
                thickness_balance: score_in_range(
                    self.scores.thickness_balance,
                    "thickness_balance",
                )?,
                design_balance: score_in_range(self.scores.design_balance, "design_balance")?,
                durability_prediction: score_in_range(
                    self.scores.durability_prediction,
                    "durability_prediction",
                )?,
            },
            highlights: clean_list(self.highlights),
            improvements: clean_list(self.improvements),
            next_steps: clean_list(self.next_steps),
            caution: self
                .caution
                .map(|text| text.trim().to_owned())
                .filter(|text| !text.is_empty()),
            confidence: self.confidence,
            assumptions: clean_list(self.assumptions),
        })
    }
}

fn clean_list(values: Option<Vec<String>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> ScorePayload {
        serde_json::from_str(json).expect("payload")
    }

    const VALID: &str = r#"{
        "total_score": 82,
        "scores": {
            "finish_quality": 85, "edge_and_cuticle": 70, "thickness_balance": 90,
            "design_balance": 60, "durability_prediction": 77
        },
        "highlights": ["Finish: smooth", "  "],
        "improvements": null,
        "next_steps": ["Try a thinner top coat"],
        "caution": "  ",
        "confidence": 0.72,
        "assumptions": ["Photo taken indoors"]
    }"#;

    #[test]
    fn valid_payload_is_cleaned() {
        let result = payload(VALID).validate().expect("valid");
        assert_eq!(result.total_score, 82);
        assert_eq!(result.scores.design_balance, 60);
        assert_eq!(result.highlights, vec!["Finish: smooth"]);
        assert!(result.improvements.is_empty());
        assert_eq!(result.caution, None);
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let result = payload(
            r#"{"total_score": 50, "confidence": 0.1, "scores": {
                "finish_quality": 1, "edge_and_cuticle": 2, "thickness_balance": 3,
                "design_balance": 4, "durability_prediction": 5 }}"#,
        )
        .validate()
        .expect("valid");
        assert!(result.highlights.is_empty());
        assert!(result.assumptions.is_empty());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut bad = payload(VALID);
        bad.scores.thickness_balance = 101;
        assert!(bad.validate().unwrap_err().contains("thickness_balance"));

        let mut bad = payload(VALID);
        bad.total_score = -3;
        assert!(bad.validate().is_err());

        let mut bad = payload(VALID);
        bad.confidence = 1.5;
        assert!(bad.validate().unwrap_err().contains("confidence"));
    }
}
