//! Centralized rules and limits for the higher/lower game.
//!
//! Keeping them together means a rule change (tie handling, leaderboard
//! size) is a single reviewed edit rather than a scattered one.

use crate::session::TiePolicy;

// Session rules ------------------------------------------------------------
/// How a guess is judged when both items carry the same metric.
pub const TIE_POLICY: TiePolicy = TiePolicy::CountsAsCorrect;
/// Smallest catalog that can produce a comparison pair.
pub const MIN_CATALOG_SIZE: usize = 2;
/// HMAC domain tag for the sampler RNG stream.
pub(crate) const SAMPLER_STREAM_TAG: &[u8] = b"sampler";

// Leaderboard --------------------------------------------------------------
/// Entries tracked by the shared ranked list.
pub const MAX_ENTRIES: usize = 10;
/// Longest player name accepted after sanitizing.
pub const MAX_NAME_LENGTH: usize = 20;
/// Characters removed from player names before submission.
pub(crate) const STRIPPED_NAME_CHARS: [char; 2] = ['<', '>'];

// High score ---------------------------------------------------------------
/// Fixed key for the persisted best streak.
pub const HIGH_SCORE_KEY: &str = "meme-higher-lower-highscore";

// Result tiers -------------------------------------------------------------
pub(crate) const TIER_GOOD_EFFORT_MIN: u32 = 1;
pub(crate) const TIER_NICE_STREAK_MIN: u32 = 5;
pub(crate) const TIER_EXPERT_MIN: u32 = 10;
