//! # Recall Search
//!
//! Local-first search over a personal corpus of conversations and curated
//! notes, with AI-assisted query expansion.
//!
//! The algorithms live in [`recall_search_core`]; this crate wires them to
//! JSON files on disk, an HTTP reasoning service, a CLI and an HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────────┐   ┌──────────────┐
//! │ JSON corpus  │──▶│      SearchEngine        │◀──│  Reasoner    │
//! │ convs+notes  │   │ retrieve ×3 → rank       │   │ OpenAI/Ollama│
//! └──────────────┘   │ history + suggestions    │   └──────────────┘
//!                    └────────────┬─────────────┘
//!                       ┌─────────┴─────────┐
//!                       ▼                   ▼
//!                  ┌──────────┐       ┌──────────┐
//!                  │   CLI    │       │   HTTP   │
//!                  │ (recall) │       │  server  │
//!                  └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`corpus`] | JSON-file conversation and note stores |
//! | [`kv`] | JSON-file key-value store for history |
//! | [`reasoning`] | Reasoning service clients |
//! | [`engine`] | Concurrent search, history and suggestions |
//! | [`search`] | `recall search` command |
//! | [`server`] | HTTP API |

pub mod config;
pub mod corpus;
pub mod engine;
pub mod kv;
pub mod reasoning;
pub mod search;
pub mod server;

pub use recall_search_core as core;
