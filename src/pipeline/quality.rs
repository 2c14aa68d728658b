//! Text quality estimation for OCR output.
//!
//! The score is a cheap plausibility heuristic, not a recogniser confidence:
//! real language has mostly alphabetic characters, words of a few letters and
//! little punctuation, while OCR noise has none of those properties.

/// Share of the score contributed by the alphabetic-character ratio.
const ALPHA_WEIGHT: f64 = 0.5;
/// Bonus when the mean word length is plausible.
const WORD_LENGTH_BONUS: f64 = 0.2;
const PLAUSIBLE_WORD_LENGTH: std::ops::RangeInclusive<f64> = 3.0..=8.0;
/// Penalty when punctuation/symbols exceed [`SPECIAL_RATIO_LIMIT`].
const SPECIAL_PENALTY: f64 = 0.3;
const SPECIAL_RATIO_LIMIT: f64 = 0.2;

/// Score `text` for OCR plausibility, in `[0.0, 1.0]`.
///
/// Empty or whitespace-only input scores 0.0. Otherwise:
/// `0.5 × alphabetic_ratio`, plus 0.2 when the mean word length lies in
/// 3–8 characters, minus 0.3 when more than 20% of characters are neither
/// alphanumeric nor whitespace; then clamped.
pub fn estimate_quality(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    let mut total = 0usize;
    let mut alphabetic = 0usize;
    let mut special = 0usize;
    for c in text.chars() {
        total += 1;
        if c.is_alphabetic() {
            alphabetic += 1;
        } else if !c.is_numeric() && !c.is_whitespace() {
            special += 1;
        }
    }
    let total = total as f64;

    let mut score = alphabetic as f64 / total * ALPHA_WEIGHT;

    let (word_count, word_chars) = text
        .split_whitespace()
        .fold((0usize, 0usize), |(n, len), w| (n + 1, len + w.chars().count()));
    if word_count > 0 {
        let mean = word_chars as f64 / word_count as f64;
        if PLAUSIBLE_WORD_LENGTH.contains(&mean) {
            score += WORD_LENGTH_BONUS;
        }
    }

    if special as f64 / total > SPECIAL_RATIO_LIMIT {
        score -= SPECIAL_PENALTY;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_scores_zero() {
        assert_eq!(estimate_quality(""), 0.0);
        assert_eq!(estimate_quality("   \n\t"), 0.0);
    }

    #[test]
    fn plain_prose_scores_high() {
        let s = estimate_quality("The quick brown fox jumps over the lazy dog");
        // 35 letters of 43 chars → 0.407 + 0.2 bonus
        assert!(s > 0.6, "got {s}");
        assert!(s <= 1.0);
    }

    #[test]
    fn pure_alphabetic_word() {
        let s = estimate_quality("invoice");
        assert!((s - 0.7).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn gibberish_is_penalised() {
        let s = estimate_quality("#@! %%^ &*( ]]{ ~~`");
        assert_eq!(s, 0.0);
        let s = estimate_quality("a#$ b%^ c&* d!!");
        assert!(s < 0.3, "got {s}");
    }

    #[test]
    fn long_tokens_get_no_bonus() {
        let s = estimate_quality("abcdefghijklmnopqrstuvwxyz");
        assert!((s - 0.5).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn digits_are_not_special() {
        // 4 digits, 0 specials, mean word length 4 → bonus only
        let s = estimate_quality("2024");
        assert!((s - 0.2).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn always_within_bounds() {
        for input in ["", "a", "!!!!", "ab cd ef", "12 34 56 78", "\u{1F600}\u{1F600}", "x\ny\nz"] {
            let s = estimate_quality(input);
            assert!((0.0..=1.0).contains(&s), "{input:?} scored {s}");
        }
    }
}
