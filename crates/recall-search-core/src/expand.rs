//! AI-assisted query expansion.
//!
//! [`expand_query`] makes exactly one call to the [`Reasoner`] asking for
//! synonyms, related concepts and alternate phrasings. The raw answer is
//! tokenized like any other text. Any failure yields an empty expansion:
//! the semantic retriever then simply produces nothing.

use tracing::{debug, warn};

use crate::reasoning::Reasoner;
use crate::tokenize::{tokenize, unique_terms};

/// System instruction sent with every expansion request.
pub const EXPANSION_SYSTEM_PROMPT: &str = "You expand search queries for a personal \
knowledge base of conversations and notes. Reply with a flat, comma-separated list of \
synonyms, related concepts, and alternate phrasings for the user's query. \
No numbering, no explanations, no quotes.";

/// Sampling temperature for expansion requests.
pub const EXPANSION_TEMPERATURE: f32 = 0.3;

/// Build the user prompt for `query`.
pub fn expansion_prompt(query: &str) -> String {
    format!("Query: {query}\n\nRelated terms:")
}

/// Turn a raw reasoning response into a list of distinct expansion terms.
///
/// Terms already present in the original query are dropped, since they add
/// nothing beyond the literal-query award.
pub fn parse_expansion(query: &str, response: &str) -> Vec<String> {
    let original = tokenize(query);
    unique_terms(response)
        .into_iter()
        .filter(|t| !original.contains(t))
        .collect()
}

/// Ask `reasoner` for related terms. Never fails: errors become `vec![]`.
pub async fn expand_query(reasoner: &dyn Reasoner, query: &str) -> Vec<String> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    match reasoner
        .complete(
            &expansion_prompt(query),
            EXPANSION_SYSTEM_PROMPT,
            EXPANSION_TEMPERATURE,
        )
        .await
    {
        Ok(response) => {
            let terms = parse_expansion(query, &response);
            debug!(reasoner = reasoner.name(), terms = terms.len(), "query expanded");
            terms
        }
        Err(e) => {
            warn!(
                reasoner = reasoner.name(),
                error = %e,
                "query expansion failed; continuing without it"
            );
            Vec::new()
        }
    }
}
