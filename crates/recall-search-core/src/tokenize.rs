//! Text normalization into searchable terms.

/// Shortest token kept by [`tokenize`].
pub const MIN_TOKEN_CHARS: usize = 3;

/// Lowercase `text` and split it on anything that is not alphanumeric,
/// dropping tokens shorter than [`MIN_TOKEN_CHARS`] characters.
///
/// Token order follows the input; duplicates are preserved.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Like [`tokenize`], but keeps only the first occurrence of each term.
pub fn unique_terms(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Whitespace-delimited, lowercased query terms (no length filter).
///
/// This is the term split used by the lexical scorer and for highlights,
/// where short words like "ai" still count.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
