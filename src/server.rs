//! JSON HTTP API for presentation layers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/search` | Run a search; supersedes any search still in flight |
//! | `GET`  | `/history` | Past queries, most recent first |
//! | `DELETE` | `/history` | Clear the history |
//! | `GET`  | `/suggestions` | Suggestions for the latest search |
//! | `GET`  | `/notes?type=<t>` | Notes of one type |
//! | `POST` | `/index/rebuild` | Rebuild the inverted index |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Errors use one shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "..." } }
//! ```

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use recall_search_core::history::suggest;
use recall_search_core::models::{Note, SearchFilters, SearchResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::engine::{IndexStats, SearchEngine, SearchSession};

#[derive(Clone)]
struct AppState {
    session: Arc<SearchSession>,
}

impl AppState {
    fn engine(&self) -> &SearchEngine {
        self.session.engine()
    }
}

/// Build the router over `engine`. All requests share one [`SearchSession`],
/// so a newer search cancels an older one that is still running.
pub fn router(engine: Arc<SearchEngine>) -> Router {
    let state = AppState {
        session: Arc::new(SearchSession::new(engine)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search", post(handle_search))
        .route("/history", get(handle_history).delete(handle_clear_history))
        .route("/suggestions", get(handle_suggestions))
        .route("/notes", get(handle_notes))
        .route("/index/rebuild", post(handle_rebuild))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `bind` until the process is stopped.
pub async fn run_server(engine: Arc<SearchEngine>, bind: &str) -> anyhow::Result<()> {
    let app = router(engine);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "server listening");
    println!("Recall server listening on http://{}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: format!("{:#}", err),
    }
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchBody {
    query: String,
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
    #[serde(default)]
    note_types: Option<Vec<String>>,
    #[serde(default)]
    min_relevance: Option<f64>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    /// True when a newer search superseded this one.
    cancelled: bool,
    results: Vec<SearchResult>,
    suggestions: Vec<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResponse>, AppError> {
    let defaults = state.engine().default_filters();
    let min_relevance = body.min_relevance.unwrap_or(defaults.min_relevance);
    if !(0.0..=1.0).contains(&min_relevance) {
        return Err(bad_request("min_relevance must be in [0.0, 1.0]"));
    }
    let filters = SearchFilters {
        start: body.start,
        end: body.end,
        note_types: body.note_types,
        min_relevance,
    };

    let query = body.query.trim().to_string();
    let outcome = state.session.search(&query, &filters).await;
    let cancelled = outcome.is_none();
    let results = outcome.unwrap_or_default();
    // From this request's own results, not the engine-wide latest.
    let suggestions = if cancelled || query.is_empty() {
        Vec::new()
    } else {
        suggest(&query, &results)
    };
    Ok(Json(SearchResponse {
        query,
        cancelled,
        results,
        suggestions,
    }))
}

// ============ /history ============

#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<String>,
}

async fn handle_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        history: state.engine().history().await,
    })
}

async fn handle_clear_history(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    state.engine().clear_history().await.map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ GET /suggestions ============

#[derive(Serialize)]
struct SuggestionsResponse {
    suggestions: Vec<String>,
}

async fn handle_suggestions(State(state): State<AppState>) -> Json<SuggestionsResponse> {
    Json(SuggestionsResponse {
        suggestions: state.engine().suggestions(),
    })
}

// ============ GET /notes ============

#[derive(Deserialize)]
struct NotesQuery {
    #[serde(rename = "type")]
    note_type: String,
}

#[derive(Serialize)]
struct NotesResponse {
    notes: Vec<Note>,
}

async fn handle_notes(
    State(state): State<AppState>,
    Query(q): Query<NotesQuery>,
) -> Result<Json<NotesResponse>, AppError> {
    let notes = state
        .engine()
        .notes_by_type(&q.note_type)
        .await
        .map_err(internal)?;
    Ok(Json(NotesResponse { notes }))
}

// ============ POST /index/rebuild ============

async fn handle_rebuild(State(state): State<AppState>) -> Result<Json<IndexStats>, AppError> {
    let stats = state.engine().rebuild_index().await.map_err(internal)?;
    Ok(Json(stats))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
