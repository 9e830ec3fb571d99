//! Multi-strategy name similarity scoring.
//!
//! Strategies are tried highest-fidelity first and the first applicable one
//! wins, so a pair is tagged with the best explanation of why it matched.
//! Score bands keep higher-fidelity matches above lower-fidelity ones:
//! exact 1.0, prefix (0.8, 1.0), substring (0.6, 0.85), fuzzy [0.4, 0.7],
//! text_search (0.3, 0.45].

use crate::normalize::name_tokens;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Minimum normalized edit similarity for a fuzzy match.
pub const FUZZY_THRESHOLD: f64 = 0.4;

const PREFIX_BASE: f64 = 0.8;
const SUBSTRING_BASE: f64 = 0.6;
const FUZZY_CEILING: f64 = 0.7;
const TEXT_SEARCH_BASE: f64 = 0.3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Prefix,
    Substring,
    Fuzzy,
    TextSearch,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Prefix => "prefix",
            MatchKind::Substring => "substring",
            MatchKind::Fuzzy => "fuzzy",
            MatchKind::TextSearch => "text_search",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredMatch {
    pub score: f64,
    pub kind: MatchKind,
}

/// Score a normalized query against a normalized candidate name.
///
/// Returns `None` when no strategy applies; such candidates are excluded
/// from results entirely rather than scored at zero.
pub fn score_match(query: &str, candidate: &str) -> Option<ScoredMatch> {
    if query.is_empty() || candidate.is_empty() {
        return None;
    }

    if query == candidate {
        return Some(ScoredMatch {
            score: 1.0,
            kind: MatchKind::Exact,
        });
    }

    let length_ratio = length_ratio(query, candidate);

    if candidate.starts_with(query) || query.starts_with(candidate) {
        return Some(ScoredMatch {
            score: PREFIX_BASE + 0.2 * length_ratio,
            kind: MatchKind::Prefix,
        });
    }

    if candidate.contains(query) {
        return Some(ScoredMatch {
            score: SUBSTRING_BASE + 0.25 * length_ratio,
            kind: MatchKind::Substring,
        });
    }

    let distance = levenshtein(query, candidate);
    let max_len = query.chars().count().max(candidate.chars().count());
    let edit_similarity = 1.0 - distance as f64 / max_len as f64;
    if edit_similarity >= FUZZY_THRESHOLD {
        return Some(ScoredMatch {
            score: edit_similarity.min(FUZZY_CEILING),
            kind: MatchKind::Fuzzy,
        });
    }

    token_overlap(query, candidate).map(|fraction| ScoredMatch {
        score: TEXT_SEARCH_BASE + 0.15 * fraction,
        kind: MatchKind::TextSearch,
    })
}

/// Deterministic result ordering: score descending, then shorter candidate
/// name, then lexical name order. Stable across pagination.
pub fn compare_matches(
    left_score: f64,
    left_name: &str,
    right_score: f64,
    right_name: &str,
) -> Ordering {
    right_score
        .total_cmp(&left_score)
        .then_with(|| left_name.len().cmp(&right_name.len()))
        .then_with(|| left_name.cmp(right_name))
}

/// Classic two-row Levenshtein over chars.
pub fn levenshtein(left: &str, right: &str) -> usize {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();

    if left.is_empty() {
        return right.len();
    }
    if right.is_empty() {
        return left.len();
    }

    let mut previous: Vec<usize> = (0..=right.len()).collect();
    let mut current = vec![0usize; right.len() + 1];

    for (row, left_char) in left.iter().enumerate() {
        current[0] = row + 1;
        for (col, right_char) in right.iter().enumerate() {
            let substitution = previous[col] + usize::from(left_char != right_char);
            current[col + 1] = substitution
                .min(previous[col + 1] + 1)
                .min(current[col] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[right.len()]
}

fn length_ratio(left: &str, right: &str) -> f64 {
    let left_len = left.chars().count();
    let right_len = right.chars().count();
    let shorter = left_len.min(right_len) as f64;
    let longer = left_len.max(right_len) as f64;
    if longer == 0.0 {
        0.0
    } else {
        shorter / longer
    }
}

/// Fraction of query tokens that appear in the candidate, counting a hit
/// when the candidate contains the token or one of its words starts with
/// it. `None` when no token matches at all.
fn token_overlap(query: &str, candidate: &str) -> Option<f64> {
    let query_tokens = name_tokens(query);
    let candidate_tokens = name_tokens(candidate);

    if query_tokens.is_empty() || candidate_tokens.is_empty() {
        return None;
    }

    let matched = query_tokens
        .iter()
        .filter(|token| {
            candidate_tokens
                .iter()
                .any(|word| word == *token || word.starts_with(**token))
        })
        .count();

    if matched == 0 {
        None
    } else {
        Some(matched as f64 / query_tokens.len() as f64)
    }
}
