//! Input checks applied before anything is written to the shared list.
use crate::constants::STRIPPED_NAME_CHARS;
use crate::numbers::score_in_range;

/// Trim, cut to `max_len` characters, then drop angle brackets.
///
/// The steps run in that order, so a name made only of brackets comes back empty.
#[must_use]
pub fn sanitize_player_name(name: &str, max_len: usize) -> String {
    name.trim()
        .chars()
        .take(max_len)
        .filter(|ch| !STRIPPED_NAME_CHARS.contains(ch))
        .collect()
}

/// Accept only integer scores in `0..=max_score`.
#[must_use]
pub fn validate_score(score: i64, max_score: u32) -> Option<u32> {
    score_in_range(score, max_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_truncates_by_characters() {
        assert_eq!(sanitize_player_name("  ada  ", 20), "ada");
        assert_eq!(
            sanitize_player_name("abcdefghijklmnopqrstuvwxyz", 20),
            "abcdefghijklmnopqrst"
        );
        assert_eq!(sanitize_player_name("ééééé", 3), "ééé");
    }

    #[test]
    fn strips_angle_brackets_after_truncation() {
        assert_eq!(sanitize_player_name("<b>bold</b>", 20), "bbold/b");
        assert_eq!(sanitize_player_name("<<<>>>", 20), "");
        assert_eq!(sanitize_player_name("<script>alert(1)</script>", 20), "scriptalert(1)/sc");
    }

    #[test]
    fn whitespace_only_names_become_empty() {
        assert_eq!(sanitize_player_name(" \t\n ", 20), "");
    }

    #[test]
    fn scores_must_fit_the_catalog() {
        assert_eq!(validate_score(-1, 16), None);
        assert_eq!(validate_score(17, 16), None);
        assert_eq!(validate_score(16, 16), Some(16));
        assert_eq!(validate_score(0, 16), Some(0));
    }
}
