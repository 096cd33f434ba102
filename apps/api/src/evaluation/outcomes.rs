//! Outcome records — how a generated prompt actually fared — and the
//! aggregate statistics read from them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::evaluation::OutcomeRow;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;
const MAX_FEEDBACK_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    UsedAsIs,
    MinorEdits,
    MajorEdits,
    Abandoned,
}

impl OutcomeCategory {
    pub const ALL: [OutcomeCategory; 4] = [
        OutcomeCategory::UsedAsIs,
        OutcomeCategory::MinorEdits,
        OutcomeCategory::MajorEdits,
        OutcomeCategory::Abandoned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeCategory::UsedAsIs => "used_as_is",
            OutcomeCategory::MinorEdits => "minor_edits",
            OutcomeCategory::MajorEdits => "major_edits",
            OutcomeCategory::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        OutcomeCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown outcome category '{}'", s.trim()))
    }
}

/// Validated rating and feedback, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidOutcome {
    pub rating: i16,
    pub category: OutcomeCategory,
    pub edits_needed: bool,
    pub feedback: Option<String>,
}

pub fn validate_outcome(
    rating: i16,
    category: OutcomeCategory,
    edits_needed: bool,
    feedback: Option<&str>,
) -> Result<ValidOutcome, String> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}, got {rating}"
        ));
    }
    let feedback = feedback.map(str::trim).filter(|f| !f.is_empty());
    if feedback.is_some_and(|f| f.chars().count() > MAX_FEEDBACK_CHARS) {
        return Err(format!("feedback exceeds {MAX_FEEDBACK_CHARS} characters"));
    }
    Ok(ValidOutcome {
        rating,
        category,
        edits_needed,
        feedback: feedback.map(str::to_string),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeStats {
    pub count: usize,
    /// 0 when there are no outcomes.
    pub average_rating: f64,
    pub by_category: BTreeMap<OutcomeCategory, usize>,
    /// Share of outcomes that needed edits, 0.0 – 1.0.
    pub edit_rate: f64,
}

/// Rows whose category no longer parses still count toward totals but not
/// toward any category bucket.
pub fn compute_outcome_stats(rows: &[OutcomeRow]) -> OutcomeStats {
    let mut by_category: BTreeMap<OutcomeCategory, usize> =
        OutcomeCategory::ALL.into_iter().map(|c| (c, 0)).collect();

    for row in rows {
        if let Ok(category) = row.category.parse::<OutcomeCategory>() {
            *by_category.entry(category).or_default() += 1;
        }
    }

    let count = rows.len();
    let (average_rating, edit_rate) = if count == 0 {
        (0.0, 0.0)
    } else {
        let total: i64 = rows.iter().map(|r| i64::from(r.rating)).sum();
        let edited = rows.iter().filter(|r| r.edits_needed).count();
        (total as f64 / count as f64, edited as f64 / count as f64)
    };

    OutcomeStats {
        count,
        average_rating,
        by_category,
        edit_rate,
    }
}
