//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Convert a signed score to the stored unsigned form, rejecting values outside `0..=max`.
#[must_use]
pub fn score_in_range(value: i64, max: u32) -> Option<u32> {
    let score = cast::<i64, u32>(value)?;
    (score <= max).then_some(score)
}

/// Saturating conversion from a collection length to a score value.
#[must_use]
pub fn len_to_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
