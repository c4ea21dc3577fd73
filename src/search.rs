//! `recall search` command: filter parsing and result printing.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use recall_search_core::history::suggest;
use recall_search_core::models::{ResultKind, SearchFilters, SearchResult};
use serde::Serialize;

use crate::engine::SearchEngine;

/// Command-line filter arguments, before parsing.
#[derive(Debug, Default)]
pub struct FilterArgs {
    pub since: Option<String>,
    pub until: Option<String>,
    pub note_types: Vec<String>,
    pub min_relevance: Option<f64>,
}

/// Parse a date bound given as RFC 3339 or `YYYY-MM-DD`.
///
/// A bare date means the start of that day, or its last second when
/// `end_of_day` is set.
pub fn parse_date_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}': use YYYY-MM-DD or RFC 3339", value))?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    };
    match time {
        Some(t) => Ok(t.and_utc()),
        None => bail!("invalid date '{}'", value),
    }
}

impl FilterArgs {
    pub fn into_filters(self, defaults: SearchFilters) -> Result<SearchFilters> {
        let min_relevance = self.min_relevance.unwrap_or(defaults.min_relevance);
        if !(0.0..=1.0).contains(&min_relevance) {
            bail!("--min-relevance must be in [0.0, 1.0]");
        }
        Ok(SearchFilters {
            start: self
                .since
                .as_deref()
                .map(|s| parse_date_bound(s, false))
                .transpose()?,
            end: self
                .until
                .as_deref()
                .map(|s| parse_date_bound(s, true))
                .transpose()?,
            note_types: if self.note_types.is_empty() {
                None
            } else {
                Some(self.note_types)
            },
            min_relevance,
        })
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    query: &'a str,
    results: &'a [SearchResult],
    suggestions: Vec<String>,
}

fn kind_label(kind: ResultKind) -> &'static str {
    match kind {
        ResultKind::Message => "message",
        ResultKind::Note => "note",
        ResultKind::Semantic => "semantic",
    }
}

/// Run one search and print it.
pub async fn run_search(
    engine: &SearchEngine,
    query: &str,
    filters: &SearchFilters,
    json: bool,
    explain: bool,
) -> Result<()> {
    let query = query.trim();
    let results = engine.search(query, filters).await;
    let suggestions = if query.is_empty() {
        Vec::new()
    } else {
        suggest(query, &results)
    };

    if json {
        let out = JsonOutput {
            query,
            results: &results,
            suggestions,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} / {}",
            i + 1,
            result.score,
            kind_label(result.kind),
            result.title
        );
        println!("    date: {}", result.timestamp.format("%Y-%m-%d %H:%M"));
        if let Some(ref t) = result.note_type {
            println!("    type: {}", t);
        }
        println!(
            "    excerpt: \"{}\"",
            result.snippet.replace('\n', " ").trim()
        );
        if !result.highlights.is_empty() {
            println!("    matched: {}", result.highlights.join(", "));
        }
        if explain {
            if let Some(ref e) = result.explain {
                println!(
                    "    score: base {:.3} + recency {:.3} + type {:.3} + title {:.3} = {:.3}",
                    e.base, e.recency_boost, e.type_boost, e.title_boost, e.total
                );
            }
        }
        println!();
    }

    if !suggestions.is_empty() {
        println!("Try also:");
        for s in suggestions {
            println!("  - {}", s);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_parse_bare_dates() {
        let start = parse_date_bound("2024-05-01", false).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        let end = parse_date_bound("2024-05-01", true).unwrap();
        assert_eq!(end.hour(), 23);
        assert_eq!(end.second(), 59);
    }

    #[test]
    fn test_parse_rfc3339_converts_to_utc() {
        let ts = parse_date_bound("2024-05-01T09:00:00+02:00", false).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_date_bound("yesterday", false).is_err());
    }

    #[test]
    fn test_filter_args_defaults() {
        let filters = FilterArgs::default()
            .into_filters(SearchFilters::default())
            .unwrap();
        assert_eq!(filters, SearchFilters::default());
    }

    #[test]
    fn test_filter_args_full() {
        let filters = FilterArgs {
            since: Some("2024-01-01".to_string()),
            until: Some("2024-01-31".to_string()),
            note_types: vec!["plan".to_string()],
            min_relevance: Some(0.3),
        }
        .into_filters(SearchFilters::default())
        .unwrap();
        assert!(filters.start.is_some() && filters.end.is_some());
        assert_eq!(filters.note_types, Some(vec!["plan".to_string()]));
        assert_eq!(filters.min_relevance, 0.3);

        let bad = FilterArgs {
            min_relevance: Some(2.0),
            ..Default::default()
        };
        assert!(bad.into_filters(SearchFilters::default()).is_err());
    }
}
