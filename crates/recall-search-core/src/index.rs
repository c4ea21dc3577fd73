//! In-memory inverted index from term to owning conversation.
//!
//! Postings are kept at conversation granularity. Re-indexing a
//! conversation only ever adds postings; [`InvertedIndex::clear`] followed
//! by a full rebuild is the only way to drop stale ones.

use std::collections::{BTreeSet, HashMap};

use crate::models::Conversation;
use crate::tokenize::{tokenize, MIN_TOKEN_CHARS};

#[derive(Debug, Default, Clone)]
pub struct InvertedIndex {
    postings: HashMap<String, BTreeSet<String>>,
    indexed: BTreeSet<String>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over every conversation's title and messages.
    pub fn build(conversations: &[Conversation]) -> Self {
        let mut index = Self::new();
        for conv in conversations {
            index.index_conversation(conv);
        }
        index
    }

    /// Tokenize `text` and post `conversation_id` under every distinct term.
    pub fn index_document(&mut self, conversation_id: &str, text: &str) {
        if !self.indexed.contains(conversation_id) {
            self.indexed.insert(conversation_id.to_string());
        }
        for term in tokenize(text) {
            let posting = self.postings.entry(term).or_default();
            if !posting.contains(conversation_id) {
                posting.insert(conversation_id.to_string());
            }
        }
    }

    /// Index a conversation's title and all of its messages.
    pub fn index_conversation(&mut self, conversation: &Conversation) {
        self.index_document(&conversation.id, &conversation.title);
        for msg in &conversation.messages {
            self.index_document(&conversation.id, &msg.text);
        }
    }

    /// Conversations whose postings contain *every* term.
    ///
    /// Terms are normalized the same way as indexed text. Returns the empty
    /// set for an empty term list or when any term is absent, including a
    /// term that normalizes to nothing (e.g. one shorter than
    /// [`MIN_TOKEN_CHARS`]).
    pub fn lookup(&self, terms: &[String]) -> BTreeSet<String> {
        let mut normalized: Vec<String> = Vec::with_capacity(terms.len());
        for term in terms {
            let tokens = tokenize(term);
            if tokens.is_empty() {
                return BTreeSet::new();
            }
            normalized.extend(tokens);
        }
        if normalized.is_empty() {
            return BTreeSet::new();
        }

        let mut sets = Vec::with_capacity(normalized.len());
        for term in &normalized {
            match self.postings.get(term) {
                Some(set) => sets.push(set),
                None => return BTreeSet::new(),
            }
        }

        // Intersect starting from the smallest posting set.
        sets.sort_by_key(|s| s.len());
        let mut acc: BTreeSet<String> = sets[0].clone();
        for set in &sets[1..] {
            acc.retain(|id| set.contains(id));
            if acc.is_empty() {
                break;
            }
        }
        acc
    }

    /// Conversations in which any of `query_terms` can occur as a substring.
    ///
    /// This is the candidate set for substring scoring: the union over all
    /// terms of every posting whose term contains the query term. Returns
    /// `None` when the postings cannot answer exactly, i.e. for an empty
    /// term list or a term that is shorter than [`MIN_TOKEN_CHARS`] or not
    /// purely alphanumeric, since such a term can match text the tokenizer
    /// never posts.
    pub fn candidates(&self, query_terms: &[String]) -> Option<BTreeSet<String>> {
        if query_terms.is_empty() {
            return None;
        }

        let mut out = BTreeSet::new();
        for term in query_terms {
            let term = term.to_lowercase();
            if term.chars().count() < MIN_TOKEN_CHARS || !term.chars().all(char::is_alphanumeric) {
                return None;
            }
            for (key, ids) in &self.postings {
                if key.contains(&term) {
                    out.extend(ids.iter().cloned());
                }
            }
        }
        Some(out)
    }

    /// Whether `conversation_id` has been indexed at all.
    pub fn contains_conversation(&self, conversation_id: &str) -> bool {
        self.indexed.contains(conversation_id)
    }

    /// Drop every posting.
    pub fn clear(&mut self) {
        self.postings.clear();
        self.indexed.clear();
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Number of distinct conversations with at least one posting.
    pub fn conversation_count(&self) -> usize {
        let mut ids = BTreeSet::new();
        for set in self.postings.values() {
            ids.extend(set.iter().map(String::as_str));
        }
        ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}
