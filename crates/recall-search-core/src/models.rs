//! Core data types shared by every retrieval path.
//!
//! Documents ([`Conversation`], [`Message`], [`Note`]) are immutable
//! snapshots handed over by the stores for the duration of one search.
//! Retrievers turn them into [`SearchResult`] candidates, which the ranker
//! finalizes in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single chat message inside a [`Conversation`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

/// A conversation: a titled, ordered list of messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// A curated knowledge note.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Free-form type tag (e.g. `"decision"`, `"person"`, `"fact"`).
    pub note_type: String,
    /// Importance in `[0.0, 1.0]`. Values outside the range are clamped on use.
    #[serde(default)]
    pub importance: f64,
    pub created_at: DateTime<Utc>,
    /// Conversation the note was distilled from, if any.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Identifiers of notes this one links to.
    #[serde(default)]
    pub connections: Vec<String>,
}

impl Note {
    /// Importance clamped into `[0.0, 1.0]`; non-finite values count as 0.
    pub fn bounded_importance(&self) -> f64 {
        crate::score::clamp_score(self.importance)
    }
}

/// Optional constraints applied to a search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchFilters {
    /// Inclusive lower bound on document creation time.
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on document creation time.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    /// Allow-list of note types. `None` allows every type.
    #[serde(default)]
    pub note_types: Option<Vec<String>>,
    /// Relevance floor for candidates.
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f64,
}

/// Default relevance floor.
pub const DEFAULT_MIN_RELEVANCE: f64 = 0.1;

fn default_min_relevance() -> f64 {
    DEFAULT_MIN_RELEVANCE
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            note_types: None,
            min_relevance: DEFAULT_MIN_RELEVANCE,
        }
    }
}

impl SearchFilters {
    /// Whether `ts` falls inside the `[start, end]` window.
    pub fn in_range(&self, ts: DateTime<Utc>) -> bool {
        if let Some(start) = self.start {
            if ts < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if ts > end {
                return false;
            }
        }
        true
    }

    /// Whether a note of type `note_type` passes the type allow-list.
    pub fn allows_type(&self, note_type: &str) -> bool {
        match &self.note_types {
            Some(types) => types.iter().any(|t| t == note_type),
            None => true,
        }
    }

    /// The relevance floor, sanitized into `[0.0, 1.0]`.
    pub fn floor(&self) -> f64 {
        crate::score::clamp_score(self.min_relevance)
    }
}

/// Which retriever produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Message,
    Note,
    Semantic,
}

/// Identity used to collapse duplicates across retrievers.
///
/// Message-origin and semantic-origin results share the `Message` variant,
/// so the same message surfaced by both paths collapses to one entry.
/// Notes carry their own variant and can never collide with a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DedupKey {
    Message {
        conversation_id: String,
        message_id: String,
    },
    Note {
        note_id: String,
    },
}

/// A scored hit. Produced as a candidate by a retriever, then rescored in
/// place by [`rank`](crate::rank::rank).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub kind: ResultKind,
    pub title: String,
    pub snippet: String,
    /// Relevance in `[0.0, 1.0]`.
    pub score: f64,
    pub key: DedupKey,
    pub timestamp: DateTime<Utc>,
    /// Query terms found in the underlying text.
    pub highlights: Vec<String>,
    /// Note type tag for note-origin results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_type: Option<String>,
    /// Final-score breakdown, filled in by the ranker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explain: Option<ScoreExplanation>,
}

/// How a result's final score was composed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreExplanation {
    /// Retriever score before boosts.
    pub base: f64,
    pub recency_boost: f64,
    pub type_boost: f64,
    pub title_boost: f64,
    /// `base + boosts`, clamped to `[0.0, 1.0]`.
    pub total: f64,
}
