//! Aggregation and final ranking.
//!
//! # Algorithm
//!
//! 1. Concatenate the retrievers' candidate lists (conversation, notes, semantic).
//! 2. Deduplicate by [`DedupKey`], keeping the first occurrence.
//! 3. Rescore: `base + recency + type + title`, clamped to `[0, 1]`.
//! 4. Stable sort by score, descending.
//!
//! The result depends only on the candidates, the query and `now`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::models::{DedupKey, ResultKind, ScoreExplanation, SearchResult};
use crate::score::{clamp_score, contains_lower};
use crate::tokenize::query_terms;

/// Weights for the final composite score.
#[derive(Debug, Clone)]
pub struct RankingParams {
    /// Age at which the recency boost reaches zero.
    pub recency_window_days: f64,
    /// Recency boost for brand-new content.
    pub recency_weight: f64,
    /// Flat boost for note-origin results.
    pub note_boost: f64,
    /// Boost when the title contains the query.
    pub title_boost: f64,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self {
            recency_window_days: 30.0,
            recency_weight: 0.2,
            note_boost: 0.3,
            title_boost: 0.2,
        }
    }
}

/// Keep only the first candidate for each [`DedupKey`], preserving order.
pub fn dedupe(candidates: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen: HashSet<DedupKey> = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.key.clone()))
        .collect()
}

/// `max(0, 1 - age_days / window) × weight`.
///
/// Timestamps in the future are treated as brand new.
pub fn recency_boost(timestamp: DateTime<Utc>, now: DateTime<Utc>, params: &RankingParams) -> f64 {
    if params.recency_window_days <= 0.0 {
        return 0.0;
    }
    let age_days = (now - timestamp).num_milliseconds() as f64 / 86_400_000.0;
    let factor = (1.0 - age_days.max(0.0) / params.recency_window_days).max(0.0);
    clamp_score(factor * params.recency_weight)
}

/// Compute the final score breakdown for one candidate.
pub fn explain(
    candidate: &SearchResult,
    query: &str,
    now: DateTime<Utc>,
    params: &RankingParams,
) -> ScoreExplanation {
    let base = clamp_score(candidate.score);
    let recency_boost = recency_boost(candidate.timestamp, now, params);
    let type_boost = if candidate.kind == ResultKind::Note {
        params.note_boost
    } else {
        0.0
    };
    let phrase = query_terms(query).join(" ");
    let title_boost = if contains_lower(&candidate.title.to_lowercase(), &phrase) {
        params.title_boost
    } else {
        0.0
    };

    ScoreExplanation {
        base,
        recency_boost,
        type_boost,
        title_boost,
        total: clamp_score(base + recency_boost + type_boost + title_boost),
    }
}

/// Deduplicate, rescore and sort `candidates`.
pub fn rank(
    candidates: Vec<SearchResult>,
    query: &str,
    now: DateTime<Utc>,
    params: &RankingParams,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = dedupe(candidates)
        .into_iter()
        .map(|mut c| {
            let breakdown = explain(&c, query, now, params);
            c.score = breakdown.total;
            c.explain = Some(breakdown);
            c
        })
        .collect();

    // `sort_by` is stable, so equal scores keep their candidate order.
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}
