//! End-to-end tests for the search engine over in-memory collaborators.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use recall_search::engine::{
    Collaborators, EngineSettings, SearchEngine, SearchSession, HISTORY_KEY,
};
use recall_search::kv::JsonFileKv;
use recall_search_core::clock::FixedClock;
use recall_search_core::models::{
    Conversation, DedupKey, Message, Note, ResultKind, SearchFilters, SearchResult,
};
use recall_search_core::reasoning::{Reasoner, ReasoningError};
use recall_search_core::store::memory::{
    InMemoryConversationStore, InMemoryKeyValueStore, InMemoryNoteStore,
};
use recall_search_core::store::KeyValueStore;
use tempfile::TempDir;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// Replies with a fixed answer (or error) and counts calls.
struct ScriptedReasoner {
    reply: Option<String>,
    delay: Option<StdDuration>,
    calls: AtomicUsize,
}

impl ScriptedReasoner {
    fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            reply: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn slow(reply: &str, delay: StdDuration) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _user_prompt: &str,
        _system_prompt: &str,
        _temperature: f32,
    ) -> Result<String, ReasoningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .ok_or_else(|| ReasoningError::Network("connection refused".to_string()))
    }
}

fn trip_planning() -> Conversation {
    Conversation {
        id: "c1".to_string(),
        title: "Trip Planning".to_string(),
        created_at: now() - Duration::days(3),
        messages: vec![
            Message {
                id: "m1".to_string(),
                text: "Let's book flights to Tokyo next week".to_string(),
                is_user: true,
                timestamp: now() - Duration::days(2),
            },
            Message {
                id: "m2".to_string(),
                text: "Sounds good, I will check hotels too.".to_string(),
                is_user: false,
                timestamp: now() - Duration::days(2),
            },
        ],
    }
}

fn groceries() -> Conversation {
    Conversation {
        id: "c2".to_string(),
        title: "Groceries".to_string(),
        created_at: now() - Duration::days(10),
        messages: vec![Message {
            id: "m1".to_string(),
            text: "We need rice, miso and green tea".to_string(),
            is_user: true,
            timestamp: now() - Duration::days(10),
        }],
    }
}

fn note(id: &str, title: &str, content: &str, note_type: &str, age_days: i64) -> Note {
    Note {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        summary: String::new(),
        keywords: vec![],
        note_type: note_type.to_string(),
        importance: 0.0,
        created_at: now() - Duration::days(age_days),
        conversation_id: None,
        connections: vec![],
    }
}

fn engine_with(
    conversations: Vec<Conversation>,
    notes: Vec<Note>,
    reasoner: Arc<ScriptedReasoner>,
    kv: Arc<dyn KeyValueStore>,
    settings: EngineSettings,
) -> SearchEngine {
    SearchEngine::new(
        Collaborators {
            conversations: Arc::new(InMemoryConversationStore::new(conversations)),
            notes: Arc::new(InMemoryNoteStore::new(notes)),
            reasoner,
            kv,
            clock: Arc::new(FixedClock(now())),
        },
        settings,
    )
}

fn simple_engine(reasoner: Arc<ScriptedReasoner>) -> SearchEngine {
    engine_with(
        vec![trip_planning(), groceries()],
        vec![],
        reasoner,
        Arc::new(InMemoryKeyValueStore::new()),
        EngineSettings::default(),
    )
}

#[tokio::test]
async fn test_tokyo_flights_scenario() {
    let engine = simple_engine(Arc::new(ScriptedReasoner::failing()));
    let results = engine
        .search("Tokyo flights", &SearchFilters::default())
        .await;

    assert_eq!(results.len(), 1);
    let hit = &results[0];
    assert_eq!(hit.kind, ResultKind::Message);
    assert_eq!(hit.title, "Trip Planning");
    assert!(hit.snippet.contains("Tokyo"));

    let explain = hit.explain.expect("ranked results carry a breakdown");
    assert!(explain.base > 0.1);
    assert!((explain.base - 0.4).abs() < 1e-9);
    let expected_recency = 0.2 * (1.0 - 2.0 / 30.0);
    assert!((explain.recency_boost - expected_recency).abs() < 1e-6);
    assert!((hit.score - (0.4 + expected_recency)).abs() < 1e-6);
}

#[tokio::test]
async fn test_blank_query_does_nothing() {
    let reasoner = Arc::new(ScriptedReasoner::replying("anything"));
    let engine = simple_engine(reasoner.clone());

    assert!(engine.search("", &SearchFilters::default()).await.is_empty());
    assert!(engine.search("   ", &SearchFilters::default()).await.is_empty());
    assert_eq!(reasoner.calls(), 0);
    assert!(engine.history().await.is_empty());
    assert!(engine.suggestions().is_empty());
}

#[tokio::test]
async fn test_reasoner_failure_keeps_other_retrievers() {
    let reasoner = Arc::new(ScriptedReasoner::failing());
    let engine = engine_with(
        vec![trip_planning()],
        vec![note("n1", "Tokyo hotels", "Shortlist near Shinjuku station", "plan", 5)],
        reasoner.clone(),
        Arc::new(InMemoryKeyValueStore::new()),
        EngineSettings::default(),
    );

    let results = engine.search("tokyo", &SearchFilters::default()).await;
    assert_eq!(reasoner.calls(), 1);
    assert!(results.iter().any(|r| r.kind == ResultKind::Message));
    assert!(results.iter().any(|r| r.kind == ResultKind::Note));
    assert!(results.iter().all(|r| r.kind != ResultKind::Semantic));
}

#[tokio::test]
async fn test_title_match_boosts_note() {
    let engine = engine_with(
        vec![],
        vec![
            note("n1", "Tokyo Itinerary", "Hotels and trains.", "plan", 60),
            note("n2", "Trip Itinerary", "Three days in Tokyo.", "plan", 60),
        ],
        Arc::new(ScriptedReasoner::failing()),
        Arc::new(InMemoryKeyValueStore::new()),
        EngineSettings::default(),
    );

    let results = engine.search("Tokyo", &SearchFilters::default()).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "Tokyo Itinerary");

    let titled = results[0].explain.unwrap();
    let untitled = results[1].explain.unwrap();
    assert_eq!(titled.title_boost, 0.2);
    assert_eq!(untitled.title_boost, 0.0);
    assert_eq!(titled.type_boost, 0.3);
    assert_eq!(titled.recency_boost, 0.0);
    assert!(results[0].score > results[1].score);
}

#[tokio::test]
async fn test_semantic_duplicates_collapse_into_message() {
    let reasoner = Arc::new(ScriptedReasoner::replying("japan, airfare, travel"));
    let engine = simple_engine(reasoner.clone());

    let results = engine.search("tokyo", &SearchFilters::default()).await;
    assert_eq!(reasoner.calls(), 1);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].kind, ResultKind::Message);
}

#[tokio::test]
async fn test_search_is_deterministic() {
    let engine = engine_with(
        vec![trip_planning(), groceries()],
        vec![
            note("n1", "Tokyo hotels", "Shortlist near Shinjuku", "plan", 5),
            note("n2", "Tea", "Green tea from Tokyo", "fact", 8),
        ],
        Arc::new(ScriptedReasoner::replying("japan, travel")),
        Arc::new(InMemoryKeyValueStore::new()),
        EngineSettings::default(),
    );

    let first = engine.search("tokyo", &SearchFilters::default()).await;
    let second = engine.search("tokyo", &SearchFilters::default()).await;
    assert!(!first.is_empty());
    assert_eq!(first, second);
    for pair in first.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn test_filters_apply_to_every_path() {
    let engine = engine_with(
        vec![trip_planning(), groceries()],
        vec![
            note("n1", "Tokyo hotels", "Shortlist near Shinjuku", "plan", 5),
            note("n2", "Tokyo tea", "Green tea shops", "fact", 5),
        ],
        Arc::new(ScriptedReasoner::failing()),
        Arc::new(InMemoryKeyValueStore::new()),
        EngineSettings::default(),
    );

    let only_facts = SearchFilters {
        note_types: Some(vec!["fact".to_string()]),
        ..Default::default()
    };
    let results = engine.search("tokyo", &only_facts).await;
    let notes: Vec<_> = results
        .iter()
        .filter(|r| r.kind == ResultKind::Note)
        .collect();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].note_type.as_deref(), Some("fact"));

    let future_only = SearchFilters {
        start: Some(now() + Duration::days(1)),
        ..Default::default()
    };
    assert!(engine.search("tokyo", &future_only).await.is_empty());
}

#[tokio::test]
async fn test_suggestions_follow_last_search() {
    let engine = engine_with(
        vec![trip_planning()],
        vec![note("n1", "Tokyo hotels", "Shortlist near Shinjuku", "plan", 5)],
        Arc::new(ScriptedReasoner::failing()),
        Arc::new(InMemoryKeyValueStore::new()),
        EngineSettings::default(),
    );

    engine.search("tokyo", &SearchFilters::default()).await;
    assert_eq!(
        engine.suggestions(),
        vec![
            "Show me all plans".to_string(),
            "Recent discussions about tokyo".to_string(),
            "Earlier conversations about tokyo".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_history_is_bounded_and_move_to_front() {
    let engine = simple_engine(Arc::new(ScriptedReasoner::failing()));
    let filters = SearchFilters::default();

    for i in 0..25 {
        engine.search(&format!("query {i}"), &filters).await;
    }
    let history = engine.history().await;
    assert_eq!(history.len(), 20);
    assert_eq!(history[0], "query 24");
    assert_eq!(history[19], "query 5");

    engine.search("query 10", &filters).await;
    let history = engine.history().await;
    assert_eq!(history.len(), 20);
    assert_eq!(history[0], "query 10");
    assert_eq!(history.iter().filter(|q| *q == "query 10").count(), 1);

    engine.clear_history().await.unwrap();
    assert!(engine.history().await.is_empty());
}

#[tokio::test]
async fn test_history_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("state.json");

    let engine = engine_with(
        vec![trip_planning()],
        vec![],
        Arc::new(ScriptedReasoner::failing()),
        Arc::new(JsonFileKv::new(&path)),
        EngineSettings::default(),
    );
    engine.search("alpha", &SearchFilters::default()).await;
    engine.search("beta", &SearchFilters::default()).await;

    let reopened = engine_with(
        vec![trip_planning()],
        vec![],
        Arc::new(ScriptedReasoner::failing()),
        Arc::new(JsonFileKv::new(&path)),
        EngineSettings::default(),
    );
    reopened.load_history().await.unwrap();
    assert_eq!(reopened.history().await, vec!["beta", "alpha"]);
}

#[tokio::test]
async fn test_newer_search_cancels_older_one() {
    let reasoner = Arc::new(ScriptedReasoner::slow(
        "japan",
        StdDuration::from_millis(300),
    ));
    let engine = Arc::new(simple_engine(reasoner));
    let session = Arc::new(SearchSession::new(engine.clone()));

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.search("tokyo", &SearchFilters::default()).await })
    };
    tokio::time::sleep(StdDuration::from_millis(50)).await;

    let second = session.search("flights", &SearchFilters::default()).await;
    let first = first.await.unwrap();

    assert!(first.is_none());
    assert!(second.is_some());
    assert_eq!(engine.history().await, vec!["flights"]);
}

#[tokio::test]
async fn test_prefilter_matches_full_scan() {
    let settings = EngineSettings {
        prefilter: true,
        ..Default::default()
    };
    let engine = engine_with(
        vec![trip_planning(), groceries()],
        vec![],
        Arc::new(ScriptedReasoner::failing()),
        Arc::new(InMemoryKeyValueStore::new()),
        settings,
    );

    let stats = engine.rebuild_index().await.unwrap();
    assert_eq!(stats.conversations, 2);
    assert_eq!(engine.lookup("tokyo flights"), vec!["c1".to_string()]);

    let pruned = engine.search("tokyo", &SearchFilters::default()).await;
    let full = simple_engine(Arc::new(ScriptedReasoner::failing()))
        .search("tokyo", &SearchFilters::default())
        .await;
    assert_eq!(pruned, full);
}

/// Run `query` on an index-pruning engine and a full-scan engine.
async fn search_both_ways(
    query: &str,
    reply: Option<&str>,
) -> (Vec<SearchResult>, Vec<SearchResult>) {
    let reasoner = || {
        Arc::new(match reply {
            Some(r) => ScriptedReasoner::replying(r),
            None => ScriptedReasoner::failing(),
        })
    };
    let pruning = engine_with(
        vec![trip_planning(), groceries()],
        vec![],
        reasoner(),
        Arc::new(InMemoryKeyValueStore::new()),
        EngineSettings {
            prefilter: true,
            ..Default::default()
        },
    );
    pruning.rebuild_index().await.unwrap();
    let full = engine_with(
        vec![trip_planning(), groceries()],
        vec![],
        reasoner(),
        Arc::new(InMemoryKeyValueStore::new()),
        EngineSettings::default(),
    );

    let filters = SearchFilters::default();
    (
        pruning.search(query, &filters).await,
        full.search(query, &filters).await,
    )
}

#[tokio::test]
async fn test_prefilter_keeps_partial_term_matches() {
    // Two of three terms: 0.2 * 2 * (2/3) clears the 0.1 floor.
    let (pruned, full) = search_both_ways("tokyo flights cheap", None).await;
    assert_eq!(full.len(), 1);
    assert_eq!(pruned, full);
}

#[tokio::test]
async fn test_prefilter_keeps_substring_matches() {
    let (pruned, full) = search_both_ways("flight", None).await;
    assert_eq!(full.len(), 1);
    assert_eq!(pruned, full);

    let (pruned, full) = search_both_ways("green tea", None).await;
    assert_eq!(full.len(), 1);
    assert_eq!(pruned, full);
}

#[tokio::test]
async fn test_prefilter_with_short_terms_and_expansion() {
    let (pruned, full) = search_both_ways("to tokyo", None).await;
    assert!(!full.is_empty());
    assert_eq!(pruned, full);

    let (pruned, full) = search_both_ways("tokyo", Some("japan, travel, tea")).await;
    assert!(!full.is_empty());
    assert_eq!(pruned, full);
}

#[tokio::test]
async fn test_prefilter_keeps_conversations_added_after_rebuild() {
    let store = Arc::new(InMemoryConversationStore::new(vec![trip_planning()]));
    let engine = SearchEngine::new(
        Collaborators {
            conversations: store.clone(),
            notes: Arc::new(InMemoryNoteStore::new(vec![])),
            reasoner: Arc::new(ScriptedReasoner::failing()),
            kv: Arc::new(InMemoryKeyValueStore::new()),
            clock: Arc::new(FixedClock(now())),
        },
        EngineSettings {
            prefilter: true,
            ..Default::default()
        },
    );
    engine.rebuild_index().await.unwrap();

    let mut osaka = groceries();
    osaka.id = "c3".to_string();
    osaka.messages[0].text = "Flights to Osaka are booked".to_string();
    store.upsert(osaka).unwrap();

    let results = engine.search("osaka", &SearchFilters::default()).await;
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].key,
        DedupKey::Message {
            conversation_id: "c3".to_string(),
            message_id: "m1".to_string(),
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_searches_keep_history_consistent() {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let engine = Arc::new(engine_with(
        vec![trip_planning(), groceries()],
        vec![],
        Arc::new(ScriptedReasoner::replying("japan")),
        kv.clone(),
        EngineSettings::default(),
    ));

    let mut handles = Vec::new();
    for i in 0..60 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let query = format!("query {}", i % 25);
            engine.search(&query, &SearchFilters::default()).await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let history = engine.history().await;
    assert_eq!(history.len(), 20);
    let distinct: HashSet<&String> = history.iter().collect();
    assert_eq!(distinct.len(), history.len());

    let stored = kv.get(HISTORY_KEY).await.unwrap().unwrap();
    let persisted: Vec<String> = serde_json::from_str(&stored).unwrap();
    assert_eq!(persisted, history);
}

#[tokio::test]
async fn test_limit_truncates_ranked_list() {
    let settings = EngineSettings {
        limit: Some(1),
        ..Default::default()
    };
    let engine = engine_with(
        vec![trip_planning()],
        vec![note("n1", "Tokyo hotels", "Shortlist near Shinjuku", "plan", 5)],
        Arc::new(ScriptedReasoner::failing()),
        Arc::new(InMemoryKeyValueStore::new()),
        settings,
    );

    let results = engine.search("tokyo", &SearchFilters::default()).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].kind, ResultKind::Note);
}
