//! The search engine: runs the three retrievers concurrently, ranks their
//! merged output, and maintains history and suggestions.
//!
//! # Pipeline
//!
//! ```text
//! search(query, filters)
//!   ├─ blank query ──────────────────────────────▶ []  (nothing recorded)
//!   ├─ load conversations (optionally index-pruned)
//!   ├─ join! ┬─ retrieve::conversations
//!   │        ├─ note store recall ─▶ retrieve::notes
//!   │        └─ expand_query ──────▶ retrieve::semantic
//!   ├─ rank::rank(conversation ++ notes ++ semantic, query, clock.now())
//!   └─ record history + suggestions
//! ```
//!
//! Cancelling a search through its [`CancellationToken`] drops every
//! in-flight retriever (including the reasoning request) and records
//! nothing.

use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use recall_search_core::clock::{Clock, SystemClock};
use recall_search_core::expand::expand_query;
use recall_search_core::history::{suggest, SearchHistory, DEFAULT_HISTORY_LIMIT};
use recall_search_core::index::InvertedIndex;
use recall_search_core::models::{Conversation, Note, SearchFilters, SearchResult};
use recall_search_core::rank::{rank, RankingParams};
use recall_search_core::reasoning::Reasoner;
use recall_search_core::retrieve::{self, RetrievalParams, SEMANTIC_TERM_AWARD};
use recall_search_core::store::{ConversationStore, KeyValueStore, NoteStore};
use recall_search_core::tokenize::{query_terms, tokenize};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::corpus::JsonCorpus;
use crate::kv::JsonFileKv;
use crate::reasoning::create_reasoner;

/// Key under which the history list is persisted.
pub const HISTORY_KEY: &str = "search_history";

/// External collaborators the engine reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub conversations: Arc<dyn ConversationStore>,
    pub notes: Arc<dyn NoteStore>,
    pub reasoner: Arc<dyn Reasoner>,
    pub kv: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub retrieval: RetrievalParams,
    pub ranking: RankingParams,
    /// Default relevance floor for callers that do not pass their own filters.
    pub min_relevance: f64,
    /// Prune conversations through the inverted index before scoring.
    pub prefilter: bool,
    /// Truncate ranked results to this many.
    pub limit: Option<usize>,
    pub history_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            retrieval: RetrievalParams::default(),
            ranking: RankingParams::default(),
            min_relevance: SearchFilters::default().min_relevance,
            prefilter: false,
            limit: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retrieval: config.retrieval.params(),
            ranking: config.ranking.params(),
            min_relevance: config.retrieval.min_relevance,
            prefilter: config.retrieval.prefilter,
            limit: config.retrieval.limit,
            history_limit: config.history.max_entries,
        }
    }
}

/// Size of the inverted index.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct IndexStats {
    pub terms: usize,
    pub conversations: usize,
}

pub struct SearchEngine {
    collaborators: Collaborators,
    settings: EngineSettings,
    index: RwLock<InvertedIndex>,
    history: Mutex<SearchHistory>,
    suggestions: RwLock<Vec<String>>,
}

impl SearchEngine {
    pub fn new(collaborators: Collaborators, settings: EngineSettings) -> Self {
        let history = SearchHistory::new(settings.history_limit);
        Self {
            collaborators,
            settings,
            index: RwLock::new(InvertedIndex::new()),
            history: Mutex::new(history),
            suggestions: RwLock::new(Vec::new()),
        }
    }

    /// Wire up the JSON corpus, file-backed history and configured reasoner,
    /// restore history and build the index.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let corpus = Arc::new(JsonCorpus::new(
            &config.corpus.conversations_path,
            &config.corpus.notes_path,
        ));
        let collaborators = Collaborators {
            conversations: corpus.clone(),
            notes: corpus,
            reasoner: create_reasoner(&config.reasoning)?,
            kv: Arc::new(JsonFileKv::new(&config.history.path)),
            clock: Arc::new(SystemClock),
        };

        let engine = Self::new(collaborators, EngineSettings::from_config(config));
        engine.load_history().await?;
        engine.rebuild_index().await?;
        Ok(engine)
    }

    /// Filters carrying this engine's default relevance floor.
    pub fn default_filters(&self) -> SearchFilters {
        SearchFilters {
            min_relevance: self.settings.min_relevance,
            ..Default::default()
        }
    }

    /// Run a search to completion.
    pub async fn search(&self, query: &str, filters: &SearchFilters) -> Vec<SearchResult> {
        let never = CancellationToken::new();
        self.search_cancellable(query, filters, &never)
            .await
            .unwrap_or_default()
    }

    /// Run a search that can be abandoned through `cancel`.
    ///
    /// Returns `None` if cancelled before completion; in that case neither
    /// history nor suggestions change.
    pub async fn search_cancellable(
        &self,
        query: &str,
        filters: &SearchFilters,
        cancel: &CancellationToken,
    ) -> Option<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Some(Vec::new());
        }

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(query, "search cancelled");
                return None;
            }
            results = self.retrieve_and_rank(query, filters) => results,
        };

        self.record(query, &results).await;
        Some(results)
    }

    async fn retrieve_and_rank(&self, query: &str, filters: &SearchFilters) -> Vec<SearchResult> {
        let now = self.collaborators.clock.now();
        let conversations = self.load_conversations(query).await;
        let params = &self.settings.retrieval;

        let (from_conversations, from_notes, from_semantic) = tokio::join!(
            async { retrieve::conversations(&conversations, query, filters, params) },
            async {
                match self.collaborators.notes.recall(query).await {
                    Ok(recalled) => retrieve::notes(&recalled, query, filters, params),
                    Err(e) => {
                        warn!(error = %e, "note recall failed");
                        Vec::new()
                    }
                }
            },
            async {
                let expanded = expand_query(self.collaborators.reasoner.as_ref(), query).await;
                retrieve::semantic(&conversations, query, &expanded, filters, params)
            },
        );

        let mut candidates = from_conversations;
        candidates.extend(from_notes);
        candidates.extend(from_semantic);
        let total = candidates.len();

        let mut ranked = rank(candidates, query, now, &self.settings.ranking);
        if let Some(limit) = self.settings.limit {
            ranked.truncate(limit);
        }
        debug!(candidates = total, results = ranked.len(), "search ranked");
        ranked
    }

    async fn load_conversations(&self, query: &str) -> Vec<Conversation> {
        let mut conversations = match self.collaborators.conversations.conversations().await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "loading conversations failed");
                return Vec::new();
            }
        };

        // Semantic hits without the literal query score below
        // SEMANTIC_TERM_AWARD, so below that bar pruning could drop them.
        if self.settings.prefilter
            && self.settings.retrieval.semantic_threshold >= SEMANTIC_TERM_AWARD
        {
            let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ids) = index.candidates(&query_terms(query)) {
                conversations
                    .retain(|c| ids.contains(&c.id) || !index.contains_conversation(&c.id));
                debug!(kept = conversations.len(), "index prefilter");
            }
        }
        conversations
    }

    async fn record(&self, query: &str, results: &[SearchResult]) {
        // Held across the write so persisted order matches in-memory order.
        let mut history = self.history.lock().await;
        history.record(query);
        *self.suggestions.write().unwrap_or_else(PoisonError::into_inner) = suggest(query, results);
        if let Err(e) = self.persist_history(&history).await {
            warn!(error = %e, "persisting search history failed");
        }
    }

    async fn persist_history(&self, history: &SearchHistory) -> Result<()> {
        let json = serde_json::to_string(&history.entries())?;
        self.collaborators.kv.set(HISTORY_KEY, &json).await
    }

    /// Restore history from the key-value store, replacing what is in memory.
    pub async fn load_history(&self) -> Result<()> {
        let stored = self.collaborators.kv.get(HISTORY_KEY).await?;
        let entries: Vec<String> = match stored {
            Some(json) => serde_json::from_str(&json)
                .context("Stored search history is not a JSON string list")?,
            None => Vec::new(),
        };
        *self.history.lock().await =
            SearchHistory::from_entries(entries, self.settings.history_limit);
        Ok(())
    }

    /// Past queries, most recent first.
    pub async fn history(&self) -> Vec<String> {
        self.history.lock().await.entries()
    }

    pub async fn clear_history(&self) -> Result<()> {
        let mut history = self.history.lock().await;
        history.clear();
        self.persist_history(&history).await
    }

    /// Follow-up suggestions for the most recent completed search.
    pub fn suggestions(&self) -> Vec<String> {
        self.suggestions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rebuild the inverted index from the full conversation corpus.
    pub async fn rebuild_index(&self) -> Result<IndexStats> {
        let conversations = self.collaborators.conversations.conversations().await?;
        let fresh = InvertedIndex::build(&conversations);
        let stats = IndexStats {
            terms: fresh.term_count(),
            conversations: fresh.conversation_count(),
        };
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        info!(terms = stats.terms, conversations = stats.conversations, "index rebuilt");
        Ok(stats)
    }

    pub fn index_stats(&self) -> IndexStats {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        IndexStats {
            terms: index.term_count(),
            conversations: index.conversation_count(),
        }
    }

    /// Conversation ids containing every term of `query`.
    pub fn lookup(&self, query: &str) -> Vec<String> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.lookup(&tokenize(query)).into_iter().collect()
    }

    pub async fn notes_by_type(&self, note_type: &str) -> Result<Vec<Note>> {
        self.collaborators.notes.list_by_type(note_type).await
    }
}

/// A single caller's search stream: starting a new search cancels the
/// previous one if it is still running.
pub struct SearchSession {
    engine: Arc<SearchEngine>,
    current: std::sync::Mutex<Option<CancellationToken>>,
}

impl SearchSession {
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        Self {
            engine,
            current: std::sync::Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &Arc<SearchEngine> {
        &self.engine
    }

    /// Search, superseding any in-flight search from this session.
    ///
    /// Returns `None` if this search was itself superseded.
    pub async fn search(&self, query: &str, filters: &SearchFilters) -> Option<Vec<SearchResult>> {
        let token = CancellationToken::new();
        {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = current.replace(token.clone()) {
                previous.cancel();
            }
        }
        self.engine.search_cancellable(query, filters, &token).await
    }
}
