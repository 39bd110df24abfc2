//! # Scripture Harness CLI (`scripture`)
//!
//! The `scripture` binary drives the whole pipeline: store creation, remote
//! and local imports, schema evolution, search index maintenance, search,
//! and statistics.
//!
//! ## Usage
//!
//! ```bash
//! scripture --config ./config/scripture.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scripture init` | Delete and recreate the store |
//! | `scripture import` | Import translations from the remote source |
//! | `scripture import-local` | Import configured local books |
//! | `scripture migrate` | Create missing tables and widen the testament constraint |
//! | `scripture index rebuild` | Rebuild the whole search projection |
//! | `scripture index refresh <CODE>` | Refresh one translation's search entries |
//! | `scripture search "<query>"` | Full-text verse search |
//! | `scripture stats` | Store statistics |
//!
//! ## Examples
//!
//! ```bash
//! # See what the remote source offers
//! scripture import --list
//!
//! # Import two translations into a scratch store
//! scripture --db /tmp/bible.db import -t KJV -t YLT
//!
//! # Start over and import everything
//! scripture import --fresh
//!
//! # Search one translation
//! scripture search "still small voice" -t KJV --limit 5
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use scripture_harness::models::Testament;
use scripture_harness::progress::ProgressMode;
use scripture_harness::{config, ingest, local, migrate, search, search_index, stats};

/// Scripture Harness CLI: import scripture translations into SQLite.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/scripture.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "scripture",
    about = "Scripture Harness — import scripture translations into SQLite with full-text search",
    version,
    long_about = "Scripture Harness downloads translations from a remote JSON source, imports \
    locally maintained annotated books, normalizes verse text, and stores everything in one \
    SQLite file with an FTS5 search projection."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/scripture.toml`. A missing file means all
    /// defaults.
    #[arg(long, global = true, default_value = "./config/scripture.toml")]
    config: PathBuf,

    /// Override the store location from the config file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Delete the store and create the full schema.
    ///
    /// Destructive: every translation, book, and verse is removed.
    Init,

    /// Import translations from the remote source.
    ///
    /// Each translation is committed on its own. A translation that fails is
    /// reported in the final summary and the run continues.
    Import {
        /// Translation codes to import (repeatable). Defaults to all.
        #[arg(short = 't', long = "translation")]
        translations: Vec<String>,

        /// List available translations without writing anything.
        #[arg(long)]
        list: bool,

        /// Recreate the store before importing.
        #[arg(long)]
        fresh: bool,

        /// Progress output on stderr. Defaults to human when stderr is a
        /// terminal, otherwise off.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Import locally sourced annotated books.
    ImportLocal {
        /// Book ids to import (repeatable). Defaults to all configured books.
        #[arg(short = 'b', long = "book")]
        books: Vec<i64>,

        /// List configured books and whether their files exist.
        #[arg(long)]
        list: bool,
    },

    /// Create missing tables and widen the testament constraint.
    ///
    /// Safe to run repeatedly: nothing changes once the constraint already
    /// permits every requested category.
    Migrate {
        /// Categories the books table must accept.
        #[arg(long, value_delimiter = ',', default_value = "OT,NT,DC,NC")]
        require: Vec<Testament>,
    },

    /// Maintain the full-text search projection.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Full-text search over verse text.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to one translation.
        #[arg(short = 't', long = "translation")]
        translation: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show store statistics.
    Stats,
}

/// Search index subcommands.
#[derive(Subcommand)]
enum IndexAction {
    /// Drop and rebuild the projection from every verse row.
    Rebuild,
    /// Replace one translation's search entries.
    Refresh {
        /// Translation code.
        code: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut cfg = config::load_config(&cli.config)?;
    if let Some(db) = cli.db {
        cfg.db.path = db;
    }

    match cli.command {
        Commands::Init => {
            migrate::run_init(&cfg).await?;
        }
        Commands::Import {
            translations,
            list,
            fresh,
            progress,
        } => {
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();
            let options = ingest::ImportOptions {
                translations,
                list,
                fresh,
            };
            ingest::run_import(&cfg, &options, reporter.as_ref()).await?;
        }
        Commands::ImportLocal { books, list } => {
            let options = local::LocalImportOptions { books, list };
            local::run_local_import(&cfg, &options).await?;
        }
        Commands::Migrate { require } => {
            migrate::run_migrate(&cfg, &require).await?;
        }
        Commands::Index { action } => match action {
            IndexAction::Rebuild => {
                search_index::run_rebuild(&cfg).await?;
            }
            IndexAction::Refresh { code } => {
                search_index::run_refresh(&cfg, &code).await?;
            }
        },
        Commands::Search {
            query,
            translation,
            limit,
        } => {
            search::run_search(&cfg, &query, translation, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
