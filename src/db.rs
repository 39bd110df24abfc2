//! SQLite connection management.
//!
//! The database path is always passed in explicitly; nothing here reads a
//! global location. WAL journaling and foreign key enforcement are enabled
//! on every connection.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::sqlite::SqliteSynchronous;
use std::path::Path;

use crate::error::{Error, Result};

/// Open (creating if needed) the database at `db_path`.
///
/// Parent directories are created. The pool is capped at a handful of
/// connections; the import engine only ever writes from one task.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    pool_for(db_path, true).await
}

/// Open a store that must already exist.
///
/// Used by commands that only read or rebuild derived data; a missing file
/// is [`Error::StoreMissing`] and nothing is created.
pub async fn open_existing(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.is_file() {
        return Err(Error::StoreMissing {
            path: db_path.to_path_buf(),
        });
    }
    pool_for(db_path, false).await
}

async fn pool_for(db_path: &Path, create: bool) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(create)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
