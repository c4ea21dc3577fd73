//! Bounded lexical relevance scoring.
//!
//! [`lexical_score`] rewards phrase matches heavily while still giving
//! partial credit for partial term overlap:
//!
//! ```text
//! per matched term:  0.5 if the whole query occurs in the text, else 0.2
//! score = Σ awards × (matched / total terms), clamped to [0, 1]
//! ```

use crate::tokenize::query_terms;

/// Award per matched term when the whole query occurs in the text.
pub const PHRASE_AWARD: f64 = 0.5;
/// Award per matched term otherwise.
pub const TERM_AWARD: f64 = 0.2;

/// Clamp a score into `[0.0, 1.0]`. NaN and infinities become `0.0`.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Case-insensitive substring test. `needle` must already be lowercase.
pub fn contains_lower(haystack_lower: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack_lower.contains(needle)
}

/// Score how well `text` matches `query`, in `[0.0, 1.0]`.
///
/// Returns 0 for a query with no terms.
pub fn lexical_score(query: &str, text: &str) -> f64 {
    let terms = query_terms(query);
    if terms.is_empty() {
        return 0.0;
    }

    let text_lower = text.to_lowercase();
    let phrase = terms.join(" ");
    let award = if contains_lower(&text_lower, &phrase) {
        PHRASE_AWARD
    } else {
        TERM_AWARD
    };

    let matched = terms
        .iter()
        .filter(|t| contains_lower(&text_lower, t))
        .count();

    let raw = award * matched as f64;
    clamp_score(raw * (matched as f64 / terms.len() as f64))
}

/// Query terms (whitespace split, lowercased) that occur anywhere in `text`.
pub fn matched_terms(query: &str, text: &str) -> Vec<String> {
    let text_lower = text.to_lowercase();
    let mut out: Vec<String> = Vec::new();
    for term in query_terms(query) {
        if contains_lower(&text_lower, &term) && !out.contains(&term) {
            out.push(term);
        }
    }
    out
}
