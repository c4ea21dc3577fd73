//! JSON-file backed conversation and note stores.
//!
//! The files are re-read on every call, so edits made by other tools show
//! up on the next search or index rebuild. A missing file is an empty
//! corpus; a malformed one is an error.
//!
//! ```json
//! // conversations.json
//! [{ "id": "c1", "title": "Trip Planning", "created_at": "2024-05-01T12:00:00Z",
//!    "messages": [{ "id": "m1", "text": "Let's book flights to Tokyo",
//!                   "is_user": true, "timestamp": "2024-05-01T12:00:00Z" }] }]
//!
//! // notes.json
//! [{ "id": "n1", "title": "Tokyo Itinerary", "content": "...", "note_type": "plan",
//!    "keywords": ["tokyo"], "importance": 0.8, "created_at": "2024-05-02T00:00:00Z" }]
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use recall_search_core::models::{Conversation, Note};
use recall_search_core::store::memory::recall_by_overlap;
use recall_search_core::store::{ConversationStore, NoteStore};
use serde::de::DeserializeOwned;

/// Conversations and notes stored as two JSON arrays on disk.
#[derive(Debug, Clone)]
pub struct JsonCorpus {
    conversations_path: PathBuf,
    notes_path: PathBuf,
}

impl JsonCorpus {
    pub fn new(conversations_path: impl Into<PathBuf>, notes_path: impl Into<PathBuf>) -> Self {
        Self {
            conversations_path: conversations_path.into(),
            notes_path: notes_path.into(),
        }
    }

    async fn read_notes(&self) -> Result<Vec<Note>> {
        read_json_array(&self.notes_path).await
    }
}

async fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "corpus file not found; treating as empty");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

#[async_trait]
impl ConversationStore for JsonCorpus {
    async fn conversations(&self) -> Result<Vec<Conversation>> {
        read_json_array(&self.conversations_path).await
    }
}

#[async_trait]
impl NoteStore for JsonCorpus {
    async fn recall(&self, query: &str) -> Result<Vec<Note>> {
        Ok(recall_by_overlap(&self.read_notes().await?, query))
    }

    async fn list_by_type(&self, note_type: &str) -> Result<Vec<Note>> {
        Ok(self
            .read_notes()
            .await?
            .into_iter()
            .filter(|n| n.note_type == note_type)
            .collect())
    }
}
