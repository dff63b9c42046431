//! String similarity and keyword overlap scoring.
//!
//! Both functions only lowercase their inputs. Callers are expected to trim
//! consistently.

use std::collections::HashSet;

/// Score returned when one string contains the other.
pub const CONTAINMENT_SCORE: f64 = 0.8;

/// Similarity of two strings in `[0, 1]`.
///
/// Discrete tiers first: `1.0` on case-insensitive equality, `0.8` when either
/// string contains the other. Otherwise the share of `b`'s words that also
/// occur in `a`, over the larger of `a`'s distinct word count and `b`'s total
/// word count.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return CONTAINMENT_SCORE;
    }

    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: Vec<&str> = b.split_whitespace().collect();
    let denominator = words_a.len().max(words_b.len());
    if denominator == 0 {
        return 0.0;
    }

    let common = words_b.iter().filter(|w| words_a.contains(*w)).count();
    common as f64 / denominator as f64
}

/// Number of keywords that overlap any word of `query`.
///
/// A keyword matches when a query word contains it or it contains a query
/// word. Each keyword counts at most once.
pub fn keyword_match_count<S: AsRef<str>>(query: &str, keywords: &[S]) -> usize {
    if keywords.is_empty() {
        return 0;
    }

    let query = query.to_lowercase();
    let query_words: HashSet<&str> = query.split_whitespace().collect();

    keywords
        .iter()
        .filter(|keyword| {
            let keyword = keyword.as_ref().to_lowercase();
            query_words
                .iter()
                .any(|word| word.contains(keyword.as_str()) || keyword.contains(word))
        })
        .count()
}
