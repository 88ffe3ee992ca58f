//! End of round summary
use serde::{Deserialize, Serialize};

use crate::constants::{TIER_EXPERT_MIN, TIER_GOOD_EFFORT_MIN, TIER_NICE_STREAK_MIN};

/// Feedback band for a final streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakTier {
    /// No correct guesses
    Blank,
    /// A handful of correct guesses
    GoodEffort,
    /// Solid run
    NiceStreak,
    /// Long run
    Expert,
}

impl StreakTier {
    #[must_use]
    pub const fn for_score(score: u32) -> Self {
        if score >= TIER_EXPERT_MIN {
            Self::Expert
        } else if score >= TIER_NICE_STREAK_MIN {
            Self::NiceStreak
        } else if score >= TIER_GOOD_EFFORT_MIN {
            Self::GoodEffort
        } else {
            Self::Blank
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Blank => "Better luck next time!",
            Self::GoodEffort => "Good effort! Keep practicing!",
            Self::NiceStreak => "Nice streak! You know your memes!",
            Self::Expert => "Amazing! You're a meme expert!",
        }
    }
}

/// Everything the game-over screen needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub final_score: u32,
    /// Best streak including this round.
    pub high_score: u32,
    pub is_new_high_score: bool,
    pub tier: StreakTier,
}

impl RoundSummary {
    /// Build a summary from the final streak, the best streak before this round and
    /// whether the high-score store accepted the streak.
    #[must_use]
    pub fn new(final_score: u32, previous_best: u32, is_new_high_score: bool) -> Self {
        Self {
            final_score,
            high_score: previous_best.max(final_score),
            is_new_high_score,
            tier: StreakTier::for_score(final_score),
        }
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        self.tier.message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_score_bands() {
        assert_eq!(StreakTier::for_score(0), StreakTier::Blank);
        assert_eq!(StreakTier::for_score(1), StreakTier::GoodEffort);
        assert_eq!(StreakTier::for_score(4), StreakTier::GoodEffort);
        assert_eq!(StreakTier::for_score(5), StreakTier::NiceStreak);
        assert_eq!(StreakTier::for_score(9), StreakTier::NiceStreak);
        assert_eq!(StreakTier::for_score(10), StreakTier::Expert);
        assert_eq!(StreakTier::for_score(176), StreakTier::Expert);
    }

    #[test]
    fn summary_reports_best_of_previous_and_final() {
        let summary = RoundSummary::new(3, 7, false);
        assert_eq!(summary.high_score, 7);
        assert_eq!(summary.message(), "Good effort! Keep practicing!");

        let record = RoundSummary::new(12, 7, true);
        assert_eq!(record.high_score, 12);
        assert!(record.is_new_high_score);
        assert_eq!(record.tier, StreakTier::Expert);
    }
}
