use std::sync::Mutex;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    db::{ScoreMetric, SubScores},
    scoring::{
        comments::tier_comment,
        request::{EvaluationRequest, UNSPECIFIED},
        result::ScoreResult,
    },
};

const MOCK_MIN: u8 = 65;
const MOCK_MAX: u8 = 90;

/// Offline stand-in for the scoring backend. Scores are sampled in
/// `65..=90`; comments follow the same shape a real backend returns.
pub struct MockGateway {
    rng: Mutex<StdRng>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn generate(&self, request: &EvaluationRequest) -> ScoreResult {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut sample = || rng.gen_range(MOCK_MIN..=MOCK_MAX);
        let scores = SubScores {
            finish_quality: sample(),
            edge_and_cuticle: sample(),
            thickness_balance: sample(),
            design_balance: sample(),
            durability_prediction: sample(),
        };
        let total_score = sample();
        let confidence = f64::from(rng.gen_range(55u8..=80)) / 100.0;

        let highlights = scores
            .iter()
            .map(|(metric, value)| format!("{}: {} (mock)", metric.label(), tier_comment(value)))
            .collect();

        let weakest = scores
            .iter()
            .min_by_key(|(_, value)| *value)
            .map(|(metric, _)| metric)
            .unwrap_or(ScoreMetric::FinishQuality);

        let mut assumptions = vec!["Mock evaluation: no scoring service is configured.".to_owned()];
        if request.design_tag == UNSPECIFIED {
            assumptions.push("Design type was not recorded.".to_owned());
        }

        ScoreResult {
            total_score,
            scores,
            highlights,
            improvements: vec![format!("{}: focus here on the next set.", weakest.label())],
            next_steps: vec!["Retake the photo in daylight for a sharper read.".to_owned()],
            caution: None,
            confidence,
            assumptions,
        }
    }
}
