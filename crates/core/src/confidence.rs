//! Confidence grading for predictions, stats, and seasonal indices.

use serde::{Deserialize, Serialize};

/// How much the engine trusts a computed result.
///
/// `Low` is the graceful-degradation signal: results over thin or absent
/// history are still returned, graded `Low`, never turned into errors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Grade from the number of observations backing a statistic.
    pub fn from_sample_size(observations: usize, minimum: usize) -> Self {
        if observations < minimum {
            Confidence::Low
        } else if observations < minimum.saturating_mul(3) {
            Confidence::Medium
        } else {
            Confidence::High
        }
    }
}

impl core::fmt::Display for Confidence {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grades_by_sample_size() {
        assert_eq!(Confidence::from_sample_size(0, 3), Confidence::Low);
        assert_eq!(Confidence::from_sample_size(2, 3), Confidence::Low);
        assert_eq!(Confidence::from_sample_size(3, 3), Confidence::Medium);
        assert_eq!(Confidence::from_sample_size(9, 3), Confidence::High);
    }

    #[test]
    fn orders_low_to_high() {
        assert!(Confidence::Low < Confidence::Medium);
        assert!(Confidence::Medium < Confidence::High);
    }
}
