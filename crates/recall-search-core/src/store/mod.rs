//! Collaborator boundaries for Recall Search.
//!
//! The search core reads its corpus through these traits and never mutates
//! what they return. Implementations must be `Send + Sync` so the engine
//! can share them across concurrent retrievers.
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`ConversationStore`] | Read-only list of conversations |
//! | [`NoteStore`] | Note recall for a query, and listing by type |
//! | [`KeyValueStore`] | String persistence for the search history |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Conversation, Note};

/// Source of conversations and their messages.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Every conversation, in store order.
    async fn conversations(&self) -> Result<Vec<Conversation>>;
}

/// Source of curated notes.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Candidate notes for `query`. How the store picks them is its own
    /// business; the core treats the result as an unranked candidate list.
    async fn recall(&self, query: &str) -> Result<Vec<Note>>;

    /// All notes with the given type tag.
    async fn list_by_type(&self, note_type: &str) -> Result<Vec<Note>>;
}

/// Minimal string key-value persistence.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}
