//! lexvec CLI - build and query a hybrid keyword + vector index.
//!
//! # Usage
//!
//! ```bash
//! # Index a JSONL chunk file (one {"text": .., "metadata": {..}} per line)
//! lexvec --embedding-url http://localhost:8080/v1/embeddings build --chunks chunks.jsonl
//! lexvec --offline-dim 256 build --chunks chunks.jsonl
//!
//! # Search the existing index
//! lexvec search "error E1234"
//! lexvec search "invoice 4711000123" -n 3 --json
//! lexvec search "pump maintenance" --context
//!
//! # Replace the index, inspect it
//! lexvec rebuild --chunks chunks.jsonl
//! lexvec info --json
//! ```

mod config;
mod index;
mod output;
mod search;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::EngineArgs;
use lexvec_core::search::format_context;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Hybrid retrieval over chunked documents.
///
/// Exact keyword hits (part numbers, codes, long numbers) are fused with
/// dense embedding similarity.
#[derive(Parser)]
#[command(name = "lexvec", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    engine: EngineArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Load the persisted index, or build it from a chunk file if unusable
    Build {
        /// JSONL chunk file
        #[arg(long)]
        chunks: PathBuf,

        /// Rebuild even if a usable index exists
        #[arg(long)]
        force: bool,
    },
    /// Replace the index with a fresh build from a chunk file
    Rebuild {
        /// JSONL chunk file
        #[arg(long)]
        chunks: PathBuf,
    },
    /// Search the index
    Search {
        /// Search query
        query: String,

        /// Maximum number of results to return (default: --top-k)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output results as JSON
        #[arg(long, conflicts_with = "context")]
        json: bool,

        /// Output the numbered context block used for answer generation
        #[arg(long)]
        context: bool,
    },
    /// Show information about the persisted index
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose when set
    let default_level = if cli.verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let manager = cli.engine.open_manager()?;

    match cli.command {
        Command::Build { chunks, force } => {
            let info = index::execute_build(manager, &chunks, force).await?;
            println!("{}", output::format_info(&info));
        }
        Command::Rebuild { chunks } => {
            let info = index::execute_rebuild(manager, &chunks).await?;
            println!("{}", output::format_info(&info));
        }
        Command::Search {
            query,
            limit,
            json,
            context,
        } => {
            let results = search::execute_search(&manager, &query, limit).await?;

            let output = if json {
                output::format_json(&query, &results)
            } else if context {
                format_context(&results)
            } else {
                output::format_human(&query, &results)
            };

            println!("{}", output);
        }
        Command::Info { json } => {
            let info = index::execute_info(manager).await?;
            let output = if json {
                output::format_info_json(&info)
            } else {
                output::format_info(&info)
            };
            println!("{}", output);
        }
    }

    Ok(())
}
