//! Per-metric highlight comments.
//!
//! Highlights are shown one per sub-score, in `ScoreMetric::ORDERED` order,
//! each starting with the metric label. Backends that do not follow that
//! format get their highlights replaced with templated ones.

use crate::db::{ScoreMetric, SubScores};

pub const HIGH_TIER_MIN: u8 = 85;
pub const STABLE_TIER_MIN: u8 = 70;

pub fn tier_comment(value: u8) -> &'static str {
    if value >= HIGH_TIER_MIN {
        "high and stable"
    } else if value >= STABLE_TIER_MIN {
        "stable, minor refinement possible"
    } else {
        "needs improvement"
    }
}

pub fn templated_highlight(metric: ScoreMetric, value: u8) -> String {
    format!("{}: {} ({value})", metric.label(), tier_comment(value))
}

pub fn templated_highlights(scores: &SubScores) -> Vec<String> {
    scores
        .iter()
        .map(|(metric, value)| templated_highlight(metric, value))
        .collect()
}

fn is_labelled(comment: &str, metric: ScoreMetric) -> bool {
    comment
        .trim_start()
        .to_lowercase()
        .starts_with(&metric.label().to_lowercase())
}

/// Keeps `highlights` when they are exactly one labelled comment per metric
/// in order; otherwise returns the templated set.
pub fn normalize_highlights(scores: &SubScores, highlights: Vec<String>) -> Vec<String> {
    let well_formed = highlights.len() == ScoreMetric::ORDERED.len()
        && highlights
            .iter()
            .zip(ScoreMetric::ORDERED)
            .all(|(comment, metric)| is_labelled(comment, metric));

    if well_formed {
        highlights
    } else {
        templated_highlights(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores() -> SubScores {
        SubScores {
            finish_quality: 85,
            edge_and_cuticle: 84,
            thickness_balance: 70,
            design_balance: 69,
            durability_prediction: 0,
        }
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(tier_comment(100), "high and stable");
        assert_eq!(tier_comment(85), "high and stable");
        assert_eq!(tier_comment(84), "stable, minor refinement possible");
        assert_eq!(tier_comment(70), "stable, minor refinement possible");
        assert_eq!(tier_comment(69), "needs improvement");
    }

    #[test]
    fn labelled_highlights_are_kept() {
        let given: Vec<String> = ScoreMetric::ORDERED
            .iter()
            .map(|metric| format!("{}: looks good", metric.label()))
            .collect();
        assert_eq!(normalize_highlights(&scores(), given.clone()), given);
    }

    #[test]
    fn short_or_unlabelled_highlights_are_replaced() {
        let short = vec!["Finish: glossy".to_string()];
        let replaced = normalize_highlights(&scores(), short);
        assert_eq!(replaced.len(), 5);
        assert_eq!(replaced[0], "Finish: high and stable (85)");
        assert_eq!(replaced[3], "Design balance: needs improvement (69)");

        let unlabelled = vec!["Nice".to_string(); 5];
        assert_eq!(normalize_highlights(&scores(), unlabelled), templated_highlights(&scores()));
    }

    #[test]
    fn out_of_order_highlights_are_replaced() {
        let mut given: Vec<String> = ScoreMetric::ORDERED
            .iter()
            .map(|metric| format!("{}: ok", metric.label()))
            .collect();
        given.swap(0, 1);
        assert_eq!(normalize_highlights(&scores(), given), templated_highlights(&scores()));
    }
}
