//! # Recall CLI (`recall`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall search "<query>"` | Search conversations and notes |
//! | `recall history` | Show (or `--clear`) past queries |
//! | `recall notes --type <t>` | List notes of one type |
//! | `recall index` | Rebuild the inverted index and print its size |
//! | `recall serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! recall search "tokyo flights" --since 2024-05-01
//! recall search "budget" --type decision --explain
//! RUST_LOG=recall_search=debug recall search "ramen"
//! ```

use clap::{Parser, Subcommand};
use recall_search::config;
use recall_search::engine::SearchEngine;
use recall_search::search::{self, FilterArgs};
use recall_search::server;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Recall: search your conversations and notes.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Search and rank personal conversations and curated notes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply if it does not exist.
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search conversations and notes.
    ///
    /// Runs the conversation, note and AI-expanded retrievers concurrently
    /// and prints one ranked list followed by follow-up suggestions.
    Search {
        /// The search query string.
        query: String,

        /// Only include content created on or after this date (YYYY-MM-DD or RFC 3339).
        #[arg(long)]
        since: Option<String>,

        /// Only include content created on or before this date (YYYY-MM-DD or RFC 3339).
        #[arg(long)]
        until: Option<String>,

        /// Only include notes of this type. Repeatable.
        #[arg(long = "type")]
        note_types: Vec<String>,

        /// Relevance floor in [0.0, 1.0].
        #[arg(long)]
        min_relevance: Option<f64>,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Show how each final score was composed.
        #[arg(long)]
        explain: bool,
    },

    /// Show past queries, most recent first.
    History {
        /// Forget all past queries.
        #[arg(long)]
        clear: bool,
    },

    /// List notes of one type.
    Notes {
        #[arg(long = "type")]
        note_type: String,
    },

    /// Rebuild the inverted index and print its size.
    Index,

    /// Start the HTTP API.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;
    let engine = SearchEngine::from_config(&cfg).await?;

    match cli.command {
        Commands::Search {
            query,
            since,
            until,
            note_types,
            min_relevance,
            json,
            explain,
        } => {
            let filters = FilterArgs {
                since,
                until,
                note_types,
                min_relevance,
            }
            .into_filters(engine.default_filters())?;
            search::run_search(&engine, &query, &filters, json, explain).await?;
        }
        Commands::History { clear } => {
            if clear {
                engine.clear_history().await?;
                println!("History cleared.");
            } else {
                let history = engine.history().await;
                if history.is_empty() {
                    println!("No history.");
                }
                for (i, q) in history.iter().enumerate() {
                    println!("{:>2}. {}", i + 1, q);
                }
            }
        }
        Commands::Notes { note_type } => {
            let notes = engine.notes_by_type(&note_type).await?;
            if notes.is_empty() {
                println!("No {} notes.", note_type);
            }
            for note in notes {
                println!(
                    "- {} ({}, importance {:.2})",
                    note.title,
                    note.created_at.format("%Y-%m-%d"),
                    note.bounded_importance()
                );
            }
        }
        Commands::Index => {
            let stats = engine.rebuild_index().await?;
            println!(
                "Indexed {} terms across {} conversations.",
                stats.terms, stats.conversations
            );
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            server::run_server(Arc::new(engine), &bind).await?;
        }
    }

    Ok(())
}
