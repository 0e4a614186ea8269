// ABOUTME: Trigram string similarity for fuzzy canonical-name matching
// ABOUTME: Word-padded trigram sets compared by Jaccard ratio

use std::collections::HashSet;

/// Extract the padded trigram set of a string.
///
/// The text is lowercased and split into alphanumeric words; each word is
/// padded with two leading and one trailing space before sliding a
/// three-character window over it, so word boundaries weigh into the score
/// the same way the Postgres trigram extension weighs them.
fn trigrams(text: &str) -> HashSet<[char; 3]> {
    let mut grams = HashSet::new();
    for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        let mut padded: Vec<char> = Vec::with_capacity(word.chars().count() + 3);
        padded.push(' ');
        padded.push(' ');
        padded.extend(word.chars());
        padded.push(' ');
        for window in padded.windows(3) {
            grams.insert([window[0], window[1], window[2]]);
        }
    }
    grams
}

/// Similarity of two strings in [0,1]: the Jaccard ratio of their trigram
/// sets. Returns 0.0 when either side has no trigrams.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let grams_a = trigrams(a);
    let grams_b = trigrams(b);
    if grams_a.is_empty() || grams_b.is_empty() {
        return 0.0;
    }

    let shared = grams_a.intersection(&grams_b).count();
    let total = grams_a.union(&grams_b).count();
    shared as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(trigram_similarity("apple", "apple"), 1.0);
    }

    #[test]
    fn close_variants_score_above_accept_threshold() {
        assert!(trigram_similarity("apple", "apples") >= 0.5);
        assert!(trigram_similarity("grilled chicken", "grilled chicken breast") >= 0.5);
    }

    #[test]
    fn unrelated_strings_score_below_floor() {
        assert!(trigram_similarity("apple", "spaghetti") < 0.3);
        assert!(trigram_similarity("rice", "broccoli") < 0.3);
    }

    #[test]
    fn comparison_is_case_insensitive() {
        assert_eq!(trigram_similarity("Apple", "aPPLe"), 1.0);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(trigram_similarity("", "apple"), 0.0);
        assert_eq!(trigram_similarity("apple", ""), 0.0);
        assert_eq!(trigram_similarity("", ""), 0.0);
        assert_eq!(trigram_similarity("  ", "--"), 0.0);
    }

    #[test]
    fn word_order_is_irrelevant() {
        let forward = trigram_similarity("chicken rice", "rice chicken");
        assert_eq!(forward, 1.0);
    }
}
