//! Recent-query history and follow-up suggestions.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::models::SearchResult;

/// Default number of queries kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
/// Maximum number of suggestions returned by [`suggest`].
pub const MAX_SUGGESTIONS: usize = 5;

/// Most-recent-first list of distinct queries, bounded in length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistory {
    entries: VecDeque<String>,
    limit: usize,
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl SearchHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    /// Rebuild a history from a persisted list, enforcing the invariants
    /// (no duplicates, at most `limit` entries, first occurrence wins).
    pub fn from_entries(entries: Vec<String>, limit: usize) -> Self {
        let mut history = Self::new(limit);
        for entry in entries.into_iter().rev() {
            history.record(&entry);
        }
        history
    }

    /// Move `query` to the front, evicting the oldest entry on overflow.
    pub fn record(&mut self, query: &str) {
        self.entries.retain(|e| e != query);
        self.entries.push_front(query.to_string());
        self.entries.truncate(self.limit);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Follow-up queries derived from the latest results.
///
/// One `"Show me all {type}s"` per distinct note type (in result order),
/// then two fixed templates, truncated to [`MAX_SUGGESTIONS`].
pub fn suggest(query: &str, results: &[SearchResult]) -> Vec<String> {
    let mut types: Vec<&str> = Vec::new();
    for t in results.iter().filter_map(|r| r.note_type.as_deref()) {
        if !types.contains(&t) {
            types.push(t);
        }
    }

    let mut out: Vec<String> = types.iter().map(|t| format!("Show me all {t}s")).collect();
    out.push(format!("Recent discussions about {query}"));
    out.push(format!("Earlier conversations about {query}"));
    out.truncate(MAX_SUGGESTIONS);
    out
}
