//! The three independent retrieval paths.
//!
//! Each retriever is a pure function from corpus snapshot + query to a
//! candidate list. They share no state, so the engine runs them
//! concurrently.
//!
//! | Retriever | Score |
//! |-----------|-------|
//! | [`conversations`] | `lexical(query, message)` |
//! | [`notes`] | `1.5·lexical(title) + lexical(content) + 0.3·keyword + 0.2·importance` |
//! | [`semantic`] | `(0.6·literal + 0.1·expanded hits) / (expanded + 1)` |

use tracing::debug;

use crate::models::{Conversation, DedupKey, Note, ResultKind, SearchFilters, SearchResult};
use crate::score::{clamp_score, contains_lower, lexical_score, matched_terms};
use crate::tokenize::query_terms;

/// Marker placed where a snippet was cut.
pub const ELLIPSIS: &str = "...";

/// Title weight in the note score.
pub const NOTE_TITLE_WEIGHT: f64 = 1.5;
/// Award when any note keyword contains the query.
pub const NOTE_KEYWORD_AWARD: f64 = 0.3;
/// Importance weight in the note score.
pub const NOTE_IMPORTANCE_WEIGHT: f64 = 0.2;

/// Award when the literal query occurs in a message (semantic path).
pub const SEMANTIC_LITERAL_AWARD: f64 = 0.6;
/// Award per expanded term found in a message (semantic path).
pub const SEMANTIC_TERM_AWARD: f64 = 0.1;
/// Lowest bar a semantic candidate must clear.
pub const SEMANTIC_THRESHOLD: f64 = 0.15;

/// Tunables shared by the retrievers.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Characters kept on each side of a query occurrence in a snippet.
    pub snippet_radius: usize,
    /// Characters kept when the query does not occur verbatim.
    pub snippet_fallback_len: usize,
    /// Semantic candidates must score above `max(this, filters.min_relevance)`.
    pub semantic_threshold: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            snippet_radius: 50,
            snippet_fallback_len: 100,
            semantic_threshold: SEMANTIC_THRESHOLD,
        }
    }
}

/// Lowercased query with whitespace runs collapsed to single spaces.
fn normalized_query(query: &str) -> String {
    query_terms(query).join(" ")
}

/// Char span `[start, end)` of the first case-insensitive occurrence of
/// `needle` in `text`.
fn find_case_insensitive(text: &str, needle: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = needle.to_lowercase().chars().collect();
    if needle.is_empty() {
        return None;
    }

    // Lowercasing may expand a char, so remember where each lowered char came from.
    let mut lowered = Vec::new();
    let mut origin = Vec::new();
    for (i, c) in text.chars().enumerate() {
        for lc in c.to_lowercase() {
            lowered.push(lc);
            origin.push(i);
        }
    }

    lowered
        .windows(needle.len())
        .position(|w| w == needle.as_slice())
        .map(|pos| (origin[pos], origin[pos + needle.len() - 1] + 1))
}

/// Excerpt of `text` around the first occurrence of `query`.
///
/// Keeps `radius` characters on each side of the match, with [`ELLIPSIS`]
/// on any side that was cut. Without a match, falls back to the first
/// `fallback_len` characters.
pub fn extract_snippet(text: &str, query: &str, radius: usize, fallback_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();

    match find_case_insensitive(text, &normalized_query(query)) {
        Some((start, end)) => {
            let from = start.saturating_sub(radius);
            let to = (end + radius).min(chars.len());
            let mut snippet = String::new();
            if from > 0 {
                snippet.push_str(ELLIPSIS);
            }
            snippet.extend(&chars[from..to]);
            if to < chars.len() {
                snippet.push_str(ELLIPSIS);
            }
            snippet
        }
        None if chars.len() > fallback_len => {
            let mut snippet: String = chars[..fallback_len].iter().collect();
            snippet.push_str(ELLIPSIS);
            snippet
        }
        None => text.to_string(),
    }
}

/// Score every message of every conversation inside the date window.
///
/// Keeps messages scoring strictly above `filters.min_relevance`.
pub fn conversations(
    conversations: &[Conversation],
    query: &str,
    filters: &SearchFilters,
    params: &RetrievalParams,
) -> Vec<SearchResult> {
    let floor = filters.floor();
    let mut out = Vec::new();

    for conv in conversations.iter().filter(|c| filters.in_range(c.created_at)) {
        for msg in &conv.messages {
            let score = lexical_score(query, &msg.text);
            if score <= floor {
                continue;
            }
            out.push(SearchResult {
                kind: ResultKind::Message,
                title: conv.title.clone(),
                snippet: extract_snippet(
                    &msg.text,
                    query,
                    params.snippet_radius,
                    params.snippet_fallback_len,
                ),
                score,
                key: DedupKey::Message {
                    conversation_id: conv.id.clone(),
                    message_id: msg.id.clone(),
                },
                timestamp: msg.timestamp,
                highlights: matched_terms(query, &msg.text),
                note_type: None,
                explain: None,
            });
        }
    }

    debug!(candidates = out.len(), "conversation retrieval");
    out
}

/// Score a single note against `query`, clamped to `[0.0, 1.0]`.
pub fn note_score(query: &str, note: &Note) -> f64 {
    let phrase = normalized_query(query);
    let keyword_hit = note
        .keywords
        .iter()
        .any(|k| contains_lower(&k.to_lowercase(), &phrase));

    let raw = NOTE_TITLE_WEIGHT * lexical_score(query, &note.title)
        + lexical_score(query, &note.content)
        + if keyword_hit { NOTE_KEYWORD_AWARD } else { 0.0 }
        + NOTE_IMPORTANCE_WEIGHT * note.bounded_importance();
    clamp_score(raw)
}

/// Score recalled notes, honoring the type allow-list and date window.
pub fn notes(
    recalled: &[Note],
    query: &str,
    filters: &SearchFilters,
    params: &RetrievalParams,
) -> Vec<SearchResult> {
    let floor = filters.floor();

    let out: Vec<SearchResult> = recalled
        .iter()
        .filter(|n| filters.allows_type(&n.note_type) && filters.in_range(n.created_at))
        .filter_map(|note| {
            let score = note_score(query, note);
            if score <= floor {
                return None;
            }

            let snippet = if note.summary.trim().is_empty() {
                extract_snippet(
                    &note.content,
                    query,
                    params.snippet_radius,
                    params.snippet_fallback_len,
                )
            } else {
                note.summary.clone()
            };

            let haystack = format!(
                "{}\n{}\n{}",
                note.title,
                note.content,
                note.keywords.join(" ")
            );

            Some(SearchResult {
                kind: ResultKind::Note,
                title: note.title.clone(),
                snippet,
                score,
                key: DedupKey::Note {
                    note_id: note.id.clone(),
                },
                timestamp: note.created_at,
                highlights: matched_terms(query, &haystack),
                note_type: Some(note.note_type.clone()),
                explain: None,
            })
        })
        .collect();

    debug!(candidates = out.len(), "note retrieval");
    out
}

/// Score a message against the literal query plus the expansion terms.
pub fn semantic_score(query: &str, expanded: &[String], text: &str) -> f64 {
    let text_lower = text.to_lowercase();
    let mut raw = 0.0;
    if contains_lower(&text_lower, &normalized_query(query)) {
        raw += SEMANTIC_LITERAL_AWARD;
    }
    for term in expanded {
        if contains_lower(&text_lower, &term.to_lowercase()) {
            raw += SEMANTIC_TERM_AWARD;
        }
    }
    clamp_score(raw / (expanded.len() as f64 + 1.0))
}

/// Score every message using AI-expanded terms.
///
/// Yields nothing when the expansion is empty.
pub fn semantic(
    conversations: &[Conversation],
    query: &str,
    expanded: &[String],
    filters: &SearchFilters,
    params: &RetrievalParams,
) -> Vec<SearchResult> {
    if expanded.is_empty() {
        return Vec::new();
    }

    let threshold = params.semantic_threshold.max(filters.floor());
    let mut out = Vec::new();

    for conv in conversations.iter().filter(|c| filters.in_range(c.created_at)) {
        for msg in &conv.messages {
            let score = semantic_score(query, expanded, &msg.text);
            if score <= threshold {
                continue;
            }

            let text_lower = msg.text.to_lowercase();
            let mut highlights = matched_terms(query, &msg.text);
            for term in expanded {
                if contains_lower(&text_lower, term) && !highlights.contains(term) {
                    highlights.push(term.clone());
                }
            }

            out.push(SearchResult {
                kind: ResultKind::Semantic,
                title: conv.title.clone(),
                snippet: extract_snippet(
                    &msg.text,
                    query,
                    params.snippet_radius,
                    params.snippet_fallback_len,
                ),
                score,
                key: DedupKey::Message {
                    conversation_id: conv.id.clone(),
                    message_id: msg.id.clone(),
                },
                timestamp: msg.timestamp,
                highlights,
                note_type: None,
                explain: None,
            });
        }
    }

    debug!(candidates = out.len(), expanded = expanded.len(), "semantic retrieval");
    out
}
