//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, see [`load_or_default`]) yields a working configuration that
//! searches `./data/*.json` with query expansion disabled.

use anyhow::{bail, Context, Result};
use recall_search_core::history::DEFAULT_HISTORY_LIMIT;
use recall_search_core::models::DEFAULT_MIN_RELEVANCE;
use recall_search_core::rank::RankingParams;
use recall_search_core::retrieve::{RetrievalParams, SEMANTIC_THRESHOLD};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_conversations_path")]
    pub conversations_path: PathBuf,
    #[serde(default = "default_notes_path")]
    pub notes_path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            conversations_path: default_conversations_path(),
            notes_path: default_notes_path(),
        }
    }
}

fn default_conversations_path() -> PathBuf {
    PathBuf::from("./data/conversations.json")
}
fn default_notes_path() -> PathBuf {
    PathBuf::from("./data/notes.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f64,
    #[serde(default = "default_semantic_threshold")]
    pub semantic_threshold: f64,
    #[serde(default = "default_snippet_radius")]
    pub snippet_radius: usize,
    #[serde(default = "default_snippet_fallback_len")]
    pub snippet_fallback_len: usize,
    /// Truncate the ranked list to this many results.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Prune conversations through the inverted index before scoring.
    #[serde(default)]
    pub prefilter: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_relevance: default_min_relevance(),
            semantic_threshold: default_semantic_threshold(),
            snippet_radius: default_snippet_radius(),
            snippet_fallback_len: default_snippet_fallback_len(),
            limit: None,
            prefilter: false,
        }
    }
}

fn default_min_relevance() -> f64 {
    DEFAULT_MIN_RELEVANCE
}
fn default_semantic_threshold() -> f64 {
    SEMANTIC_THRESHOLD
}
fn default_snippet_radius() -> usize {
    50
}
fn default_snippet_fallback_len() -> usize {
    100
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            snippet_radius: self.snippet_radius,
            snippet_fallback_len: self.snippet_fallback_len,
            semantic_threshold: self.semantic_threshold,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RankingConfig {
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: f64,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    #[serde(default = "default_note_boost")]
    pub note_boost: f64,
    #[serde(default = "default_title_boost")]
    pub title_boost: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            recency_window_days: default_recency_window_days(),
            recency_weight: default_recency_weight(),
            note_boost: default_note_boost(),
            title_boost: default_title_boost(),
        }
    }
}

fn default_recency_window_days() -> f64 {
    30.0
}
fn default_recency_weight() -> f64 {
    0.2
}
fn default_note_boost() -> f64 {
    0.3
}
fn default_title_boost() -> f64 {
    0.2
}

impl RankingConfig {
    pub fn params(&self) -> RankingParams {
        RankingParams {
            recency_window_days: self.recency_window_days,
            recency_weight: self.recency_weight,
            note_boost: self.note_boost,
            title_boost: self.title_boost,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReasoningConfig {
    /// `disabled`, `openai`, or `ollama`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// JSON key-value file the history is persisted into.
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_history_path() -> PathBuf {
    PathBuf::from("./data/state.json")
}
fn default_max_entries() -> usize {
    DEFAULT_HISTORY_LIMIT
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7878".to_string()
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Read, parse and validate the config file at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Like [`load_config`], but a missing file yields [`Config::default`].
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found; using defaults");
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    let unit = 0.0..=1.0;

    if !unit.contains(&config.retrieval.min_relevance) {
        bail!("retrieval.min_relevance must be in [0.0, 1.0]");
    }
    if !(SEMANTIC_THRESHOLD..=1.0).contains(&config.retrieval.semantic_threshold) {
        bail!(
            "retrieval.semantic_threshold must be in [{}, 1.0]",
            SEMANTIC_THRESHOLD
        );
    }
    if config.retrieval.limit == Some(0) {
        bail!("retrieval.limit must be >= 1");
    }

    let r = &config.ranking;
    if !(r.recency_window_days > 0.0 && r.recency_window_days.is_finite()) {
        bail!("ranking.recency_window_days must be > 0");
    }
    for (name, value) in [
        ("ranking.recency_weight", r.recency_weight),
        ("ranking.note_boost", r.note_boost),
        ("ranking.title_boost", r.title_boost),
    ] {
        if !unit.contains(&value) {
            bail!("{} must be in [0.0, 1.0]", name);
        }
    }

    if config.history.max_entries == 0 {
        bail!("history.max_entries must be >= 1");
    }

    match config.reasoning.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown reasoning provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
