//! Fuzzy title matching for free-text votes
//!
//! Implements the quick-ratio similarity used to resolve a free-text vote
//! against the option list: twice the size of the character-bag
//! intersection over the combined length. Cheap upper bound on edit-based
//! similarity; good enough to match "the mat" to "The Matrix" without
//! pulling in a full edit-distance implementation.

use std::collections::HashMap;

/// Quick-ratio similarity between two strings in [0.0, 1.0]
///
/// Computes `2 * M / T` where `M` is the size of the multiset
/// intersection of the two character bags and `T` the combined length.
/// Two empty strings are considered identical.
pub fn quick_ratio(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a + len_b == 0 {
        return 1.0;
    }

    let mut bag: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *bag.entry(c).or_insert(0) += 1;
    }

    let mut matches = 0usize;
    for c in a.chars() {
        if let Some(count) = bag.get_mut(&c) {
            if *count > 0 {
                *count -= 1;
                matches += 1;
            }
        }
    }

    2.0 * matches as f64 / (len_a + len_b) as f64
}

/// Best-scoring candidate for a needle, as `(index, score)`
///
/// Scans all candidates and keeps the first highest score. Returns `None`
/// only for an empty candidate list; thresholding is the caller's call.
pub fn best_match<'a, I>(needle: &str, candidates: I) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, f64)> = None;

    for (index, candidate) in candidates.into_iter().enumerate() {
        let score = quick_ratio(needle, candidate);
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((index, score));
        }
    }

    best
}
