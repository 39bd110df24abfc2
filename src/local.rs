//! Import of locally sourced, bracket-annotated books.
//!
//! All local books live under one configured translation. Each book is
//! replaced wholesale in a single transaction, so re-running an import with
//! the same files leaves the store unchanged.

use anyhow::Context;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;

use crate::annotated::parse_annotated_file;
use crate::config::{Config, LocalBook};
use crate::error::Result;
use crate::ingest::{insert_verses, upsert_book, upsert_translation};
use crate::migrate;
use crate::models::{Book, Translation, Verse};
use crate::progress::format_number;
use crate::search_index;
use crate::sources;

/// What [`import_local_book`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalBookReport {
    pub book_id: i64,
    pub name: String,
    pub chapters: i64,
    pub verses: u64,
}

/// A configured book that was not imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBook {
    pub book_id: i64,
    pub name: String,
    pub reason: String,
}

/// Outcome of a local import run.
#[derive(Debug, Clone, Default)]
pub struct LocalImportSummary {
    pub translation: String,
    pub imported: Vec<LocalBookReport>,
    pub skipped: Vec<SkippedBook>,
    /// Requested ids with no configured book.
    pub unknown_ids: Vec<i64>,
    pub search_entries: u64,
}

impl LocalImportSummary {
    pub fn total_verses(&self) -> u64 {
        self.imported.iter().map(|b| b.verses).sum()
    }

    pub fn print(&self) {
        println!("import-local {}", self.translation);
        for b in &self.imported {
            println!(
                "  {:>3} {:<24} {} chapters, {} verses",
                b.book_id,
                b.name,
                b.chapters,
                format_number(b.verses)
            );
        }
        println!("  books: {}", self.imported.len());
        println!("  verses: {}", format_number(self.total_verses()));
        println!("  search entries: {}", format_number(self.search_entries));
        if !self.unknown_ids.is_empty() {
            let ids: Vec<String> = self.unknown_ids.iter().map(|id| id.to_string()).collect();
            println!("  not configured: {}", ids.join(", "));
        }
        if self.skipped.is_empty() {
            println!("ok");
        } else {
            println!("  skipped: {}", self.skipped.len());
            for s in &self.skipped {
                println!("    {} {}: {}", s.book_id, s.name, s.reason);
            }
        }
    }
}

/// Parse `path` and replace `book` of `translation` with its contents.
///
/// The book row and all its verses are deleted and rewritten in one
/// transaction. The chapter count is the highest chapter parsed. A file
/// that can't be parsed fails with [`crate::Error::Parse`] before anything
/// is written.
pub async fn import_local_book(
    pool: &SqlitePool,
    translation: &Translation,
    book: &LocalBook,
    path: &Path,
    batch_size: usize,
) -> Result<LocalBookReport> {
    let parsed = parse_annotated_file(path)?;
    let chapters = parsed.iter().map(|v| v.chapter).max().unwrap_or(0);
    let code = translation.short_name.as_str();

    let verses: Vec<Verse> = parsed
        .into_iter()
        .map(|v| Verse {
            translation: code.to_string(),
            book_id: book.book_id,
            chapter: v.chapter,
            verse: v.verse,
            text: v.text,
        })
        .collect();

    upsert_translation(pool, translation).await?;

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM verses WHERE translation = ? AND book_id = ?")
        .bind(code)
        .bind(book.book_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM books WHERE translation = ? AND book_id = ?")
        .bind(code)
        .bind(book.book_id)
        .execute(&mut *tx)
        .await?;

    upsert_book(
        &mut tx,
        &Book {
            translation: code.to_string(),
            book_id: book.book_id,
            name: book.name.clone(),
            chapters,
            chron_order: book.chron_order(),
            testament: book.testament,
        },
    )
    .await?;

    let mut written = 0;
    for batch in verses.chunks(batch_size.max(1)) {
        written += insert_verses(&mut tx, batch).await?;
    }
    tx.commit().await?;

    tracing::info!(
        translation = code,
        book_id = book.book_id,
        chapters,
        verses = written,
        "local book imported"
    );
    Ok(LocalBookReport {
        book_id: book.book_id,
        name: book.name.clone(),
        chapters,
        verses: written,
    })
}

/// Options for [`run_local_import`].
#[derive(Debug, Clone, Default)]
pub struct LocalImportOptions {
    /// Book ids to import; empty means every configured book.
    pub books: Vec<i64>,
    /// Print configured books and stop.
    pub list: bool,
}

/// `scripture import-local`.
///
/// Returns `None` in list mode. A missing or unparseable file skips that
/// book; only opening the store fails the run.
pub async fn run_local_import(
    config: &Config,
    options: &LocalImportOptions,
) -> anyhow::Result<Option<LocalImportSummary>> {
    let local = &config.local;
    let wanted: HashSet<i64> = options.books.iter().copied().collect();
    let selected: Vec<&LocalBook> = local
        .books
        .iter()
        .filter(|b| wanted.is_empty() || wanted.contains(&b.book_id))
        .collect();

    if options.list {
        sources::print_local_books(config, &selected);
        return Ok(None);
    }

    let mut summary = LocalImportSummary {
        translation: local.translation.short_name.clone(),
        ..Default::default()
    };
    let configured: HashSet<i64> = local.books.iter().map(|b| b.book_id).collect();
    summary.unknown_ids = options
        .books
        .iter()
        .copied()
        .filter(|id| !configured.contains(id))
        .collect();
    if !summary.unknown_ids.is_empty() {
        tracing::warn!(ids = ?summary.unknown_ids, "requested books are not configured");
    }

    let pool = migrate::open_store(&config.db.path, false)
        .await
        .with_context(|| format!("Failed to open store at {}", config.db.path.display()))?;
    upsert_translation(&pool, &local.translation).await?;

    for book in selected {
        let path = local.data_dir.join(&book.file);
        if !path.exists() {
            tracing::warn!(book_id = book.book_id, path = %path.display(), "file not found, skipping");
            summary.skipped.push(SkippedBook {
                book_id: book.book_id,
                name: book.name.clone(),
                reason: format!("file not found: {}", path.display()),
            });
            continue;
        }

        match import_local_book(
            &pool,
            &local.translation,
            book,
            &path,
            config.import.batch_size,
        )
        .await
        {
            Ok(report) => summary.imported.push(report),
            Err(err) => {
                tracing::warn!(book_id = book.book_id, error = %err, "skipping book");
                summary.skipped.push(SkippedBook {
                    book_id: book.book_id,
                    name: book.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    summary.search_entries =
        search_index::refresh_scope(&pool, &local.translation.short_name).await?;
    migrate::optimize(&pool).await?;
    pool.close().await;

    summary.print();
    Ok(Some(summary))
}
