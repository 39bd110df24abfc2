//! # Scripture Harness
//!
//! A local-first ingestion pipeline for scripture translations.
//!
//! Scripture Harness pulls translations from a remote JSON source, imports
//! locally maintained bracket-annotated books, normalizes verse text, and
//! stores everything in a single SQLite file with an FTS5 search projection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │   Sources   │──▶│   Pipeline   │──▶│  SQLite   │
//! │ remote/local│   │ clean+resolve│   │ rows+FTS5 │
//! └─────────────┘   └──────────────┘   └─────┬─────┘
//!                                            │
//!                                            ▼
//!                                     ┌────────────┐
//!                                     │    CLI     │
//!                                     │ (scripture)│
//!                                     └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! scripture init                     # create the store
//! scripture import --list            # see what the source offers
//! scripture import -t KJV -t YLT     # import two translations
//! scripture import-local             # import configured local books
//! scripture search "living water" -t KJV
//! scripture stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`source`] | Remote source adapter |
//! | [`retry`] | Retry policy for network calls |
//! | [`normalize`] | Verse markup stripping |
//! | [`annotated`] | Bracket-annotated local file parser |
//! | [`resolve`] | Book metadata reconciliation |
//! | [`ingest`] | Remote import state machine |
//! | [`local`] | Local book import |
//! | [`search_index`] | FTS5 projection maintenance |
//! | [`search`] | Verse search |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation and evolution |

pub mod annotated;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod local;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod resolve;
pub mod retry;
pub mod search;
pub mod search_index;
pub mod source;
pub mod sources;
pub mod stats;

pub use error::{Error, Result};
