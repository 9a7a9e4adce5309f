//! Similarity scoring for fuzzy matching.
//!
//! Two measures are provided: token-overlap over normalized word sets
//! and an edit-distance ratio over normalized strings. The resolver
//! uses whichever scores higher, so short reorderings and small typos
//! are both tolerated.

use std::collections::BTreeSet;

/// Token-overlap similarity (Sorensen-Dice) between two token sets.
///
/// Returns a value in `[0, 1]`. Two empty sets score 0.
pub fn token_overlap(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    (2 * shared) as f64 / (a.len() + b.len()) as f64
}

/// Edit-distance ratio between two strings.
///
/// `1.0` for identical inputs, `0.0` for fully dissimilar inputs.
/// Two empty strings score 0 so that absent subjects never match.
pub fn edit_distance_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let longest = a_chars.len().max(b_chars.len());
    let distance = levenshtein(&a_chars, &b_chars);
    1.0 - distance as f64 / longest as f64
}

/// Similarity between two normalized subject strings.
///
/// The larger of token overlap and edit-distance ratio.
pub fn subject_similarity(a: &str, b: &str) -> f64 {
    let a_tokens: BTreeSet<&str> = a.split_whitespace().collect();
    let b_tokens: BTreeSet<&str> = b.split_whitespace().collect();
    token_overlap(&a_tokens, &b_tokens).max(edit_distance_ratio(a, b))
}

/// Levenshtein distance with a rolling single-row buffer.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, &ca) in a.iter().enumerate() {
        let mut previous_diagonal = row[0];
        row[0] = i + 1;

        for (j, &cb) in b.iter().enumerate() {
            let substitution = if ca == cb {
                previous_diagonal
            } else {
                previous_diagonal + 1
            };
            previous_diagonal = row[j + 1];
            row[j + 1] = substitution.min(row[j] + 1).min(row[j + 1] + 1);
        }
    }

    row[b.len()]
}
