// SPDX-FileCopyrightText: 2026 Converge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Positional-overlap similarity for near-duplicate detection.
//!
//! This is deliberately not edit distance. Characters are compared at the
//! same position only, so it under-detects reorderings ("ab cd" vs "cd ab"
//! scores 0) and over-detects very short strings. It is kept because it is
//! cheap and matches the duplicate pattern this check exists for: a user
//! re-sending the same message with trailing punctuation or a typo fix.

/// Ratio of position-matching characters to the longer string's length.
///
/// Two empty strings are identical and score 1.0.
pub fn positional_overlap(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    let matches = a
        .chars()
        .zip(b.chars())
        .filter(|(ca, cb)| ca == cb)
        .count();
    matches as f64 / longest as f64
}

/// Whether `text` is a near-duplicate of `last`.
///
/// The check only applies when the character-length difference is within
/// `max_length_diff`; beyond that the messages are assumed distinct without
/// scoring. Texts are compared exactly as sent, with no case or
/// punctuation normalization.
pub fn is_near_duplicate(
    text: &str,
    last: &str,
    similarity_threshold: f64,
    max_length_diff: usize,
) -> bool {
    let text_len = text.chars().count();
    let last_len = last.chars().count();
    if text_len.abs_diff(last_len) > max_length_diff {
        return false;
    }
    positional_overlap(text, last) > similarity_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_punctuation_is_flagged() {
        assert!(is_near_duplicate("Hello there!", "Hello there", 0.8, 5));
    }

    #[test]
    fn same_length_different_text_is_not_flagged() {
        assert!(!is_near_duplicate("Goodbye now", "Hello there", 0.8, 5));
    }

    #[test]
    fn length_difference_beyond_limit_skips_scoring() {
        // Identical prefix, but 6 extra characters disqualify the pair.
        assert!(!is_near_duplicate("Hello there again!", "Hello there", 0.8, 5));
    }

    #[test]
    fn identical_text_scores_full_overlap() {
        assert_eq!(positional_overlap("same", "same"), 1.0);
        assert!(is_near_duplicate("same", "same", 0.99, 5));
    }

    #[test]
    fn reordered_text_scores_zero() {
        // Known limitation: positional comparison, not edit distance.
        assert_eq!(positional_overlap("abcd", "cdab"), 0.0);
    }

    #[test]
    fn empty_strings_are_identical() {
        assert_eq!(positional_overlap("", ""), 1.0);
        assert!(is_near_duplicate("", "", 0.8, 5));
    }

    #[test]
    fn overlap_counts_characters_not_bytes() {
        // Multibyte characters compare per character position.
        assert_eq!(positional_overlap("héllo", "héllo"), 1.0);
        let score = positional_overlap("héllo", "hallo");
        assert!(score > 0.7 && score < 0.9, "got {score}");
    }

    #[test]
    fn threshold_is_exclusive() {
        // 4 of 5 positions match: ratio exactly 0.8 does not exceed 0.8.
        assert_eq!(positional_overlap("abcde", "abcdX"), 0.8);
        assert!(!is_near_duplicate("abcde", "abcdX", 0.8, 5));
        assert!(is_near_duplicate("abcde", "abcdX", 0.79, 5));
    }
}
