//! Numeric-aware deduplication of pooled retrieval candidates
//!
//! Exact duplicates are caught by hashing normalized text; near-duplicates
//! by a character-bigram similarity ratio. Two texts that read the same but
//! carry different numbers are the same problem template instantiated with
//! different values and must NOT be collapsed.

use crate::retrieval::Candidate;
use ahash::{AHashMap, AHashSet};
use regex::Regex;
use std::sync::OnceLock;

/// Above this ratio, numerically distinct texts are still kept apart
const FUZZY_DISTINCT_THRESHOLD: f64 = 0.90;
/// Above this ratio with matching (or absent) numbers, texts are duplicates
const FUZZY_DUPLICATE_THRESHOLD: f64 = 0.95;

fn numeric_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("static regex"))
}

/// Extract numeric tokens from a text, sorted so sets compare as multisets
fn numeric_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = numeric_token_regex()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    tokens.sort();
    tokens
}

/// Character-bigram multiset counts
fn bigram_counts(text: &str) -> AHashMap<(char, char), u32> {
    let chars: Vec<char> = text.chars().collect();
    let mut counts = AHashMap::new();
    for pair in chars.windows(2) {
        *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    counts
}

/// Dice coefficient over character bigrams, in [0, 1]
///
/// Cheap, symmetric, and robust to small edits; short strings (< 2 chars)
/// only match exactly.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let a_counts = bigram_counts(a);
    let b_counts = bigram_counts(b);
    let a_total: u32 = a_counts.values().sum();
    let b_total: u32 = b_counts.values().sum();
    if a_total == 0 || b_total == 0 {
        return 0.0;
    }

    let overlap: u32 = a_counts
        .iter()
        .map(|(bigram, count)| count.min(b_counts.get(bigram).unwrap_or(&0)))
        .sum();

    2.0 * overlap as f64 / (a_total + b_total) as f64
}

struct AcceptedEntry {
    normalized: String,
    numeric: Vec<String>,
}

/// Remove exact and near-duplicate candidates, order-preserving
///
/// Candidates with an empty id or blank text are dropped unconditionally.
/// The fuzzy pass is O(n²) over the pool, which stays in the hundreds.
pub fn deduplicate(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen_hashes: AHashSet<[u8; 32]> = AHashSet::new();
    let mut accepted: Vec<AcceptedEntry> = Vec::new();
    let mut unique = Vec::new();

    'outer: for candidate in candidates {
        if candidate.id.is_empty() || candidate.text.trim().is_empty() {
            continue;
        }

        let normalized = candidate.text.trim().to_lowercase();
        let hash = *blake3::hash(normalized.as_bytes()).as_bytes();
        if !seen_hashes.insert(hash) {
            continue;
        }

        let numeric = numeric_tokens(&normalized);
        for entry in &accepted {
            let ratio = similarity_ratio(&normalized, &entry.normalized);

            // Same template, different numbers: keep both.
            let numbers_differ = numeric != entry.numeric
                && (!numeric.is_empty() || !entry.numeric.is_empty());
            if ratio > FUZZY_DISTINCT_THRESHOLD && numbers_differ {
                continue;
            }

            if ratio > FUZZY_DUPLICATE_THRESHOLD {
                continue 'outer;
            }
        }

        accepted.push(AcceptedEntry { normalized, numeric });
        unique.push(candidate);
    }

    unique
}
