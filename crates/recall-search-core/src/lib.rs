//! # Recall Search Core
//!
//! Shared, I/O-free logic for Recall Search: the data model, tokenizer,
//! inverted index, lexical scorer, the three source retrievers, the
//! aggregator/ranker, and the history and suggestion tracker.
//!
//! This crate contains no tokio, reqwest, or filesystem I/O. Collaborators
//! (conversation store, note store, reasoning service, key-value
//! persistence) are reached only through the traits in [`store`] and
//! [`reasoning`].
//!
//! ```text
//!   query ──┬──▶ retrieve::conversations ─┐
//!           ├──▶ retrieve::notes ─────────┼──▶ rank::rank ──▶ results
//!           └──▶ expand ─▶ retrieve::semantic ┘        │
//!                                                      ▼
//!                                          history + suggestions
//! ```

pub mod clock;
pub mod expand;
pub mod history;
pub mod index;
pub mod models;
pub mod rank;
pub mod reasoning;
pub mod retrieve;
pub mod score;
pub mod store;
pub mod tokenize;
