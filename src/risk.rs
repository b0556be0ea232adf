use serde::{Deserialize, Serialize};
use std::fmt;

/// Scores below this are `Low`.
pub const LOW_UPPER: f64 = -0.05;
/// Scores at or above this are `High`.
pub const HIGH_LOWER: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "Low",
            RiskCategory::Medium => "Medium",
            RiskCategory::High => "High",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `< -0.05` → Low, `[-0.05, 0.05)` → Medium, `>= 0.05` → High.
///
/// NaN falls through both comparisons and lands in `High`.
pub fn bucket(score: f64) -> RiskCategory {
    if score < LOW_UPPER {
        RiskCategory::Low
    } else if score < HIGH_LOWER {
        RiskCategory::Medium
    } else {
        RiskCategory::High
    }
}
