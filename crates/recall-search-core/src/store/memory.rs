//! In-memory collaborator implementations for tests and embedding.
//!
//! Data lives behind `std::sync::RwLock`; every async method returns an
//! immediately-ready future.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Conversation, Note};
use crate::tokenize::tokenize;

use super::{ConversationStore, KeyValueStore, NoteStore};

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

/// Conversations held in a `Vec`.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<Vec<Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new(conversations: Vec<Conversation>) -> Self {
        Self {
            conversations: RwLock::new(conversations),
        }
    }

    /// Append a conversation, replacing any with the same id.
    pub fn upsert(&self, conversation: Conversation) -> Result<()> {
        let mut convs = self.conversations.write().map_err(poisoned)?;
        convs.retain(|c| c.id != conversation.id);
        convs.push(conversation);
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn conversations(&self) -> Result<Vec<Conversation>> {
        Ok(self.conversations.read().map_err(poisoned)?.clone())
    }
}

/// Notes held in a `Vec`.
///
/// `recall` returns every note sharing at least one token with the query
/// (title, content, summary or keywords), most important first, then newest.
#[derive(Default)]
pub struct InMemoryNoteStore {
    notes: RwLock<Vec<Note>>,
}

impl InMemoryNoteStore {
    pub fn new(notes: Vec<Note>) -> Self {
        Self {
            notes: RwLock::new(notes),
        }
    }

    pub fn upsert(&self, note: Note) -> Result<()> {
        let mut notes = self.notes.write().map_err(poisoned)?;
        notes.retain(|n| n.id != note.id);
        notes.push(note);
        Ok(())
    }
}

/// Token-overlap recall shared by the bundled note stores.
pub fn recall_by_overlap(notes: &[Note], query: &str) -> Vec<Note> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<Note> = notes
        .iter()
        .filter(|n| {
            let mut haystack = tokenize(&n.title);
            haystack.extend(tokenize(&n.content));
            haystack.extend(tokenize(&n.summary));
            for kw in &n.keywords {
                haystack.extend(tokenize(kw));
            }
            query_tokens.iter().any(|q| haystack.contains(q))
        })
        .cloned()
        .collect();

    hits.sort_by(|a, b| {
        b.bounded_importance()
            .partial_cmp(&a.bounded_importance())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.created_at.cmp(&a.created_at))
    });
    hits
}

#[async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn recall(&self, query: &str) -> Result<Vec<Note>> {
        let notes = self.notes.read().map_err(poisoned)?;
        Ok(recall_by_overlap(&notes, query))
    }

    async fn list_by_type(&self, note_type: &str) -> Result<Vec<Note>> {
        let notes = self.notes.read().map_err(poisoned)?;
        Ok(notes
            .iter()
            .filter(|n| n.note_type == note_type)
            .cloned()
            .collect())
    }
}

/// A `HashMap`-backed key-value store.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().map_err(poisoned)?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
