//! Rubric scoring — weighted per-dimension scores (1–10) folded into a single
//! 0–100 score with a grade bucket.
//!
//! Algorithm:
//! 1. Each known dimension takes its supplied score, clamped to [1, 10];
//!    a missing or non-finite score counts as 5 (neutral).
//! 2. weighted = Σ(weight × score) / Σ(weight)
//! 3. overall = round(weighted × 10), so all 10s → 100 and all 1s → 10.
//! 4. Grade: excellent ≥ 80, good ≥ 60, otherwise needs_work.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const NEUTRAL_SCORE: f64 = 5.0;
pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 10.0;

const EXCELLENT_MIN: u32 = 80;
const GOOD_MIN: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Dimension {
    pub key: &'static str,
    pub weight: f64,
    pub description: &'static str,
}

/// Default rubric. Weights sum to 1.0.
pub const DIMENSIONS: [Dimension; 5] = [
    Dimension {
        key: "clarity",
        weight: 0.25,
        description: "Easy to follow; no ambiguity or filler",
    },
    Dimension {
        key: "specificity",
        weight: 0.20,
        description: "Concrete details rather than generic statements",
    },
    Dimension {
        key: "tone_alignment",
        weight: 0.20,
        description: "Matches the requested tone",
    },
    Dimension {
        key: "format_compliance",
        weight: 0.15,
        description: "Follows the requested format and length",
    },
    Dimension {
        key: "completeness",
        weight: 0.20,
        description: "Addresses every part of the request",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Excellent,
    Good,
    NeedsWork,
}

impl Grade {
    pub fn from_score(score: u32) -> Self {
        if score >= EXCELLENT_MIN {
            Grade::Excellent
        } else if score >= GOOD_MIN {
            Grade::Good
        } else {
            Grade::NeedsWork
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Excellent => "excellent",
            Grade::Good => "good",
            Grade::NeedsWork => "needs_work",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: String,
    pub score: f64,
    pub weight: f64,
    /// True when no usable score was supplied and the neutral value was used.
    pub defaulted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubricReport {
    pub overall_score: u32, // 0 – 100
    pub grade: Grade,
    pub dimensions: Vec<DimensionScore>,
}

/// Scores against `DIMENSIONS`. Keys match case-insensitively; unknown keys
/// are ignored.
pub fn score_rubric(scores: &HashMap<String, f64>) -> RubricReport {
    let normalized: HashMap<String, f64> = scores
        .iter()
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), *v))
        .collect();

    let dimensions: Vec<DimensionScore> = DIMENSIONS
        .iter()
        .map(|d| {
            let supplied = normalized.get(d.key).copied().filter(|s| s.is_finite());
            DimensionScore {
                dimension: d.key.to_string(),
                score: supplied.map_or(NEUTRAL_SCORE, |s| s.clamp(MIN_SCORE, MAX_SCORE)),
                weight: d.weight,
                defaulted: supplied.is_none(),
            }
        })
        .collect();

    let total_weight: f64 = dimensions.iter().map(|d| d.weight).sum();
    let weighted = if total_weight > 0.0 {
        dimensions.iter().map(|d| d.weight * d.score).sum::<f64>() / total_weight
    } else {
        NEUTRAL_SCORE
    };

    let overall_score = (weighted * 10.0).round().clamp(0.0, 100.0) as u32;

    RubricReport {
        overall_score,
        grade: Grade::from_score(overall_score),
        dimensions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(score: f64) -> HashMap<String, f64> {
        DIMENSIONS
            .iter()
            .map(|d| (d.key.to_string(), score))
            .collect()
    }

    #[test]
    fn test_weights_sum_to_one() {
        let sum: f64 = DIMENSIONS.iter().map(|d| d.weight).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_tens_is_100() {
        let report = score_rubric(&all(10.0));
        assert_eq!(report.overall_score, 100);
        assert_eq!(report.grade, Grade::Excellent);
    }

    #[test]
    fn test_all_ones_is_minimum() {
        let report = score_rubric(&all(1.0));
        assert_eq!(report.overall_score, 10);
        assert_eq!(report.grade, Grade::NeedsWork);
    }

    #[test]
    fn test_missing_scores_default_to_neutral() {
        let report = score_rubric(&HashMap::new());
        assert_eq!(report.overall_score, 50);
        assert!(report.dimensions.iter().all(|d| d.defaulted));
    }

    #[test]
    fn test_weighted_average() {
        // clarity 10 (0.25), everything else 6 → 2.5 + 0.75×6 = 7.0
        let mut scores = all(6.0);
        scores.insert("clarity".to_string(), 10.0);
        let report = score_rubric(&scores);
        assert_eq!(report.overall_score, 70);
        assert_eq!(report.grade, Grade::Good);
    }

    #[test]
    fn test_out_of_range_scores_clamped() {
        let mut scores = all(5.0);
        scores.insert("clarity".to_string(), -4.0);
        scores.insert("specificity".to_string(), 25.0);
        let report = score_rubric(&scores);
        // 0.25×1 + 0.20×10 + 0.55×5 = 5.0
        assert_eq!(report.dimensions[0].score, MIN_SCORE);
        assert_eq!(report.dimensions[1].score, MAX_SCORE);
        assert_eq!(report.overall_score, 50);
    }

    #[test]
    fn test_keys_case_insensitive_and_unknown_ignored() {
        let mut scores = HashMap::new();
        scores.insert(" Clarity ".to_string(), 9.0);
        scores.insert("vibes".to_string(), 1.0);
        let report = score_rubric(&scores);
        let clarity = &report.dimensions[0];
        assert_eq!(clarity.score, 9.0);
        assert!(!clarity.defaulted);
        assert_eq!(report.dimensions.len(), DIMENSIONS.len());
    }

    #[test]
    fn test_nan_counts_as_missing() {
        let mut scores = all(8.0);
        scores.insert("completeness".to_string(), f64::NAN);
        let report = score_rubric(&scores);
        assert!(report.dimensions[4].defaulted);
        assert_eq!(report.dimensions[4].score, NEUTRAL_SCORE);
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(Grade::from_score(80), Grade::Excellent);
        assert_eq!(Grade::from_score(79), Grade::Good);
        assert_eq!(Grade::from_score(60), Grade::Good);
        assert_eq!(Grade::from_score(59), Grade::NeedsWork);
    }
}
