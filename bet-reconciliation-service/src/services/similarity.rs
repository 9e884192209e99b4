//! Blended text similarity between two event search strings.

use std::collections::{HashMap, HashSet};

/// Token Jaccard similarity over space-separated words, as a percentage.
/// Two empty strings score 0.
pub fn token_similarity(a: &str, b: &str) -> f64 {
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = left.intersection(&right).count();
    intersection as f64 / union as f64 * 100.0
}

/// Dice coefficient over character bigrams with whitespace removed, as a
/// percentage. Identical non-empty strings score 100; strings shorter than
/// two characters score 0 otherwise.
pub fn sequence_similarity(a: &str, b: &str) -> f64 {
    let left: Vec<char> = a.chars().filter(|c| !c.is_whitespace()).collect();
    let right: Vec<char> = b.chars().filter(|c| !c.is_whitespace()).collect();
    // Two empty strings are treated as no evidence rather than identical.
    if left.is_empty() && right.is_empty() {
        return 0.0;
    }
    if left == right {
        return 100.0;
    }
    if left.len() < 2 || right.len() < 2 {
        return 0.0;
    }

    let mut bigrams: HashMap<(char, char), usize> = HashMap::new();
    for pair in left.windows(2) {
        *bigrams.entry((pair[0], pair[1])).or_default() += 1;
    }
    let mut intersection = 0usize;
    for pair in right.windows(2) {
        if let Some(count) = bigrams.get_mut(&(pair[0], pair[1])) {
            if *count > 0 {
                *count -= 1;
                intersection += 1;
            }
        }
    }

    2.0 * intersection as f64 / (left.len() + right.len() - 2) as f64 * 100.0
}

/// Average of sequence and token similarity, in `[0, 100]`.
pub fn score(a: &str, b: &str) -> f64 {
    (sequence_similarity(a, b) + token_similarity(a, b)) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_search_strings_score_100() {
        assert_eq!(score("arsenal chelsea", "arsenal chelsea"), 100.0);
    }

    #[test]
    fn test_empty_strings_score_zero() {
        assert_eq!(token_similarity("", ""), 0.0);
        assert_eq!(sequence_similarity("", ""), 0.0);
        assert_eq!(score("", "arsenal"), 0.0);
    }

    #[test]
    fn test_token_overlap() {
        let s = token_similarity("arsenal chelsea", "arsenal spurs");
        assert!((s - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_bigram_dice() {
        // "night" / "nacht" share only the "ht" bigram.
        assert_eq!(sequence_similarity("night", "nacht"), 25.0);
    }

    #[test]
    fn test_score_is_symmetric() {
        let samples = [
            "",
            "a",
            "arsenal chelsea",
            "chelsea v arsenal",
            "man utd home",
            "aaaa aa",
            "liverpool everton draw",
        ];
        for a in samples {
            for b in samples {
                assert_eq!(score(a, b), score(b, a), "{:?} vs {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_score_bounds() {
        let s = score("leeds hull", "hull city leeds united");
        assert!(s > 0.0 && s < 100.0);
    }
}
