//! # ragcell CLI
//!
//! Command-line interface for the ragcell document indexing and retrieval
//! core. All commands accept a `--config` flag pointing to a TOML
//! configuration file and a `--scope` flag selecting the tenancy scope
//! (`common` or `user:<id>`).
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragcell init` | Create the storage and index directories |
//! | `ragcell upload <path>` | Store a local file and index it |
//! | `ragcell index <file>` | Index an already-stored file |
//! | `ragcell search "<query>"` | Similarity search within the scope |
//! | `ragcell list` | List stored documents and their index status |
//! | `ragcell delete <file>` | Remove a document's chunks, file, and metadata |
//! | `ragcell status` | Show filesystem/index sync state |
//! | `ragcell cleanup` | Delete chunks whose backing file is gone |
//! | `ragcell reindex` | Index stored files the collection is missing |
//!
//! ## Examples
//!
//! ```bash
//! ragcell --config ./ragcell.toml init
//! ragcell --config ./ragcell.toml --scope user:alice@example.com upload ./notes.pdf
//! ragcell --config ./ragcell.toml --scope user:alice@example.com search "quarterly revenue"
//! ragcell --config ./ragcell.toml status
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ragcell::config;
use ragcell::models::SyncState;
use ragcell::{RagService, Scope};

/// ragcell — a multi-tenant document indexing and retrieval core for RAG
/// backends.
#[derive(Parser)]
#[command(
    name = "ragcell",
    about = "ragcell — multi-tenant document indexing and retrieval for RAG backends",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./ragcell.toml")]
    config: PathBuf,

    /// Tenancy scope: `common` or `user:<id>`.
    #[arg(long, global = true, default_value = "common")]
    scope: String,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the storage and index directories (and the metadata
    /// database when configured). Idempotent.
    Init,

    /// Store a local file in the scope and index it.
    ///
    /// Rejects unsupported extensions, oversized files, and duplicates.
    /// If indexing fails after the file is saved, the file stays stored
    /// and `reindex` will pick it up later.
    Upload {
        /// Path to the local file to upload.
        path: PathBuf,
    },

    /// Index an already-stored file.
    ///
    /// Idempotent: a file whose chunks are already present is not
    /// re-embedded.
    Index {
        /// File name within the scope's store.
        file_name: String,
    },

    /// Similarity search within the scope.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results (defaults to retrieval.top_k).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// List stored documents with their index status.
    List,

    /// Remove a document's chunks, stored file, and metadata.
    Delete {
        /// File name within the scope's store.
        file_name: String,
    },

    /// Show how the scope's collection relates to its file store.
    Status,

    /// Delete chunks whose backing file no longer exists.
    Cleanup,

    /// Index every stored file missing from the collection.
    Reindex,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let scope = Scope::parse(&cli.scope)?;
    let service = RagService::from_config(cfg).await?;

    match cli.command {
        Commands::Init => {
            println!("Initialized storage and index directories.");
        }

        Commands::Upload { path } => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| anyhow::anyhow!("not a file path: {}", path.display()))?;
            let bytes = std::fs::read(&path)?;
            let report = service.upload_document(&scope, &file_name, &bytes).await?;
            if report.indexed {
                println!(
                    "Uploaded and indexed {} ({} chunks).",
                    report.file_name, report.chunk_count
                );
            } else {
                println!(
                    "Uploaded {} but indexing failed: {}",
                    report.file_name,
                    report.warning.unwrap_or_default()
                );
                println!("Run `ragcell reindex` to retry.");
            }
        }

        Commands::Index { file_name } => {
            use ragcell::models::IndexOutcome;
            match service.index_document(&scope, &file_name).await? {
                IndexOutcome::Indexed { chunk_count } => {
                    println!("Indexed {} ({} chunks).", file_name, chunk_count);
                }
                IndexOutcome::AlreadyIndexed { chunk_count } => {
                    println!("{} is already indexed ({} chunks).", file_name, chunk_count);
                }
            }
        }

        Commands::Search { query, top_k } => {
            let hits = service.search(&scope, &query, top_k).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} (chunk {}/{})",
                    i + 1,
                    hit.similarity,
                    hit.file_name,
                    hit.chunk_index + 1,
                    hit.total_chunks
                );
                let preview: String = hit.text.chars().take(240).collect();
                println!("   {}", preview.replace('\n', " "));
            }
        }

        Commands::List => {
            let docs = service.list_documents(&scope).await?;
            if docs.is_empty() {
                println!("No documents in scope {}.", scope);
            }
            for doc in docs {
                let status = if doc.indexed {
                    format!("indexed, {} chunks", doc.chunk_count)
                } else {
                    "pending".to_string()
                };
                println!("{}  {} bytes  ({})", doc.file_name, doc.file_size, status);
            }
        }

        Commands::Delete { file_name } => {
            let deleted = service.remove_document(&scope, &file_name).await?;
            println!("Deleted {} ({} chunks removed).", file_name, deleted);
        }

        Commands::Status => {
            let stats = service.sync_stats(&scope).await?;
            println!("scope:        {}", scope);
            println!("state:        {}", stats.state);
            println!("files:        {}", stats.filesystem_files);
            println!("vectors:      {}", stats.vector_entries);
            println!("detail:       {}", stats.message);
            match stats.state {
                SyncState::NeedsIndexing => println!("hint: run `ragcell reindex`"),
                SyncState::NeedsCleanup => println!("hint: run `ragcell cleanup`"),
                SyncState::Partial => {
                    println!("hint: run `ragcell cleanup` then `ragcell reindex`")
                }
                _ => {}
            }
        }

        Commands::Cleanup => {
            let report = service.cleanup_orphans(&scope).await?;
            println!(
                "Cleaned {} chunks from {} orphaned files.",
                report.cleaned_chunks,
                report.orphaned_files.len()
            );
            for file in report.orphaned_files {
                println!("  - {}", file);
            }
        }

        Commands::Reindex => {
            let report = service.reindex_pending(&scope).await?;
            println!(
                "Reindexed {} of {} pending files.",
                report.reindexed, report.pending
            );
            for (file, error) in report.errors {
                println!("  {} failed: {}", file, error);
            }
        }
    }

    Ok(())
}
