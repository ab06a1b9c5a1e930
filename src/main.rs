//! # vsctl CLI
//!
//! The `vsctl` binary manages a remotely hosted document retrieval index
//! and a grounded chat session on top of it.
//!
//! ## Usage
//!
//! ```bash
//! vsctl --config ./config/vsctl.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vsctl build` | Ingest the local corpus into a new remote index |
//! | `vsctl search "<query>"` | Semantic search with top-k relevance ranking |
//! | `vsctl search --list-files` | Enumerate indexed files and their chunks |
//! | `vsctl chat` | Interactive chat grounded in the indexed documents |
//! | `vsctl delete [handle]` | Delete the remote index (asks for confirmation) |
//!
//! The API key is read from the environment (`OPENAI_API_KEY` by default).

mod chat;
mod config;
mod delete;
mod error;
mod ingest;
mod models;
mod registry;
mod scanner;
mod search;
mod service;

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// vsctl — remote vector-store lifecycle and grounded chat.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; every setting has a default, so the file is optional.
#[derive(Parser)]
#[command(
    name = "vsctl",
    about = "Manage a remote document retrieval index and chat over it",
    version,
    long_about = "vsctl ingests a local document corpus into a remotely hosted semantic index, \
    searches it with relevance ranking, runs a grounded multi-turn chat session, and tears the \
    index down. The active index handle is persisted locally between invocations."
)]
struct Cli {
    /// Path to configuration file (TOML). Optional — defaults apply.
    #[arg(long, global = true, default_value = "./config/vsctl.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build a remote index from the local corpus.
    ///
    /// Scans the corpus directory by extension allow-list, creates a remote
    /// index, uploads all documents as one batch, polls the batch to a
    /// terminal status, and saves the index handle. Individual file
    /// failures never abort the batch; the command exits non-zero so the
    /// build can be rerun to retry them.
    Build,

    /// Search the indexed documents.
    ///
    /// Sends the query to the remote index and prints the top-k results by
    /// relevance score. With no query words, prompts for one.
    Search {
        /// The search query (joined from the remaining arguments).
        query: Vec<String>,

        /// List every indexed file and print all of its chunks instead of
        /// searching.
        #[arg(long)]
        list_files: bool,
    },

    /// Chat over the indexed documents.
    ///
    /// Starts an interactive session grounded in the index. Type `quit` or
    /// `exit` to end the conversation.
    Chat,

    /// Delete the remote index and clear the saved handle.
    ///
    /// Uses the given handle, or the saved one when omitted. Asks for an
    /// interactive `yes` confirmation naming the index before deleting.
    Delete {
        /// Index handle to delete. Defaults to the saved handle.
        handle: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Build => {
            ingest::run_build(&cfg).await?;
        }
        Commands::Search { query, list_files } => {
            if list_files {
                search::run_list_chunks(&cfg).await?;
            } else {
                let query = if query.is_empty() {
                    prompt_for_query()?
                } else {
                    query.join(" ")
                };
                search::run_search(&cfg, &query).await?;
            }
        }
        Commands::Chat => {
            chat::run_chat(&cfg).await?;
        }
        Commands::Delete { handle } => {
            delete::run_delete(&cfg, handle.as_deref()).await?;
        }
    }

    Ok(())
}

fn prompt_for_query() -> anyhow::Result<String> {
    print!("Enter your search query: ");
    std::io::stdout().flush()?;
    let mut query = String::new();
    std::io::stdin().read_line(&mut query)?;
    Ok(query.trim().to_string())
}
