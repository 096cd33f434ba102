//! Diversity discretization for Verbalized Sampling.
//!
//! A continuous slider in [0, 1] maps onto four levels, each with a minimum
//! self-reported probability per option and a candidate count. Option labels
//! are derived from the probability alone.

use serde::{Deserialize, Serialize};

pub const SAFE_BET_MIN: f64 = 0.3;
pub const ALTERNATIVE_MIN: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversityLevel {
    Focused,
    Balanced,
    Diverse,
    Wild,
}

impl DiversityLevel {
    /// Out-of-range values clamp; NaN counts as 0.
    pub fn from_slider(value: f64) -> Self {
        let v = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        if v < 0.25 {
            DiversityLevel::Focused
        } else if v < 0.5 {
            DiversityLevel::Balanced
        } else if v < 0.75 {
            DiversityLevel::Diverse
        } else {
            DiversityLevel::Wild
        }
    }

    /// Minimum probability an option should carry at this level.
    pub fn threshold(&self) -> f64 {
        match self {
            DiversityLevel::Focused => 0.30,
            DiversityLevel::Balanced => 0.20,
            DiversityLevel::Diverse => 0.10,
            DiversityLevel::Wild => 0.05,
        }
    }

    pub fn candidates(&self) -> usize {
        match self {
            DiversityLevel::Focused => 3,
            DiversityLevel::Balanced => 4,
            DiversityLevel::Diverse | DiversityLevel::Wild => 5,
        }
    }

    pub fn temperature(&self) -> f32 {
        match self {
            DiversityLevel::Focused => 0.5,
            DiversityLevel::Balanced => 0.7,
            DiversityLevel::Diverse => 0.9,
            DiversityLevel::Wild => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiversityLabel {
    #[serde(rename = "Safe Bet")]
    SafeBet,
    #[serde(rename = "Alternative Angle")]
    AlternativeAngle,
    #[serde(rename = "Creative/Out of Box")]
    CreativeOutOfBox,
}

impl DiversityLabel {
    pub fn for_probability(probability: f64) -> Self {
        let p = clamp_probability(probability);
        if p >= SAFE_BET_MIN {
            DiversityLabel::SafeBet
        } else if p >= ALTERNATIVE_MIN {
            DiversityLabel::AlternativeAngle
        } else {
            DiversityLabel::CreativeOutOfBox
        }
    }
}

/// Clamps to [0, 1]; NaN becomes 0.
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}
