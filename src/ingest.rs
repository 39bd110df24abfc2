//! Remote import orchestration.
//!
//! Each translation moves through
//! `PENDING → BOOKS_LOADED → VERSES_LOADED → COMMITTED`, or to `FAILED`
//! from any state. Commit boundaries:
//!
//! 1. the translation row, on its own, before any fetch;
//! 2. the book rows, once metadata is loaded (`BOOKS_LOADED`);
//! 3. synthesized books plus every verse row, closing the translation
//!    (`COMMITTED`).
//!
//! Boundary 2 stays durable when the verse download later fails. A rerun
//! for a code missing from the bulk map reuses those rows instead of
//! calling the per-code endpoint again. A failed
//! translation never touches rows committed for any other translation.

use anyhow::Context;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::Instrument;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::migrate;
use crate::models::{Book, Testament, Translation, Verse};
use crate::normalize::strip_markup;
use crate::progress::{format_number, ImportProgressEvent, ImportProgressReporter};
use crate::resolve::reconcile;
use crate::search_index;
use crate::source::{flatten_translations, BollsSource, BookMetadata, RemoteVerse, ScriptureSource};
use crate::sources;
use crate::stats::format_bytes;

/// Per-translation import state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Pending,
    BooksLoaded,
    VersesLoaded,
    Committed,
    Failed,
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImportState::Pending => "PENDING",
            ImportState::BooksLoaded => "BOOKS_LOADED",
            ImportState::VersesLoaded => "VERSES_LOADED",
            ImportState::Committed => "COMMITTED",
            ImportState::Failed => "FAILED",
        })
    }
}

/// What one committed translation wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationReport {
    pub code: String,
    pub state: ImportState,
    /// Reference books written at `BOOKS_LOADED`.
    pub books: u64,
    /// Ids of books created from verse data.
    pub synthesized: Vec<i64>,
    pub verses: u64,
    /// Verses whose text was empty after normalization.
    pub dropped_empty: u64,
}

impl TranslationReport {
    fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            state: ImportState::Pending,
            books: 0,
            synthesized: Vec::new(),
            verses: 0,
            dropped_empty: 0,
        }
    }
}

/// A translation that reached `FAILED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedImport {
    pub code: String,
    /// Always [`ImportState::Failed`].
    pub state: ImportState,
    /// Last state reached before the failure.
    pub reached: ImportState,
    pub reason: String,
}

/// Outcome of a multi-translation run.
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub committed: Vec<TranslationReport>,
    pub failed: Vec<FailedImport>,
    /// Requested codes the source does not list.
    pub unknown_codes: Vec<String>,
    pub search_entries: u64,
}

impl ImportSummary {
    fn record_failure(&mut self, code: &str, err: Error) {
        let failure = match err {
            Error::PartialImport {
                code,
                state,
                source,
            } => FailedImport {
                code,
                state: ImportState::Failed,
                reached: state,
                reason: source.to_string(),
            },
            other => FailedImport {
                code: code.to_string(),
                state: ImportState::Failed,
                reached: ImportState::Pending,
                reason: other.to_string(),
            },
        };
        self.failed.push(failure);
    }

    pub fn failed_codes(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.code.as_str()).collect()
    }

    pub fn total_books(&self) -> u64 {
        self.committed
            .iter()
            .map(|r| r.books + r.synthesized.len() as u64)
            .sum()
    }

    pub fn total_synthesized(&self) -> u64 {
        self.committed.iter().map(|r| r.synthesized.len() as u64).sum()
    }

    pub fn total_verses(&self) -> u64 {
        self.committed.iter().map(|r| r.verses).sum()
    }

    pub fn total_dropped(&self) -> u64 {
        self.committed.iter().map(|r| r.dropped_empty).sum()
    }

    pub fn print(&self, db_path: &std::path::Path) {
        let size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

        println!("import");
        println!("  database: {}", db_path.display());
        println!("  size: {}", format_bytes(size));
        println!("  translations: {}", self.committed.len());
        println!("  books: {}", format_number(self.total_books()));
        println!("  auto-created books: {}", self.total_synthesized());
        println!("  verses: {}", format_number(self.total_verses()));
        println!("  empty verses dropped: {}", self.total_dropped());
        println!("  search entries: {}", format_number(self.search_entries));
        if !self.unknown_codes.is_empty() {
            println!("  not found: {}", self.unknown_codes.join(", "));
        }
        if self.failed.is_empty() {
            println!("ok");
        } else {
            println!("  failed: {}", self.failed_codes().join(", "));
            for f in &self.failed {
                println!("    {} ({} after {}): {}", f.code, f.state, f.reached, f.reason);
            }
        }
    }
}

/// Drives translations from a [`ScriptureSource`] into the store.
pub struct Importer<'a> {
    pub pool: &'a SqlitePool,
    pub source: &'a dyn ScriptureSource,
    pub batch_size: usize,
    pub courtesy_delay: Duration,
    pub progress: &'a dyn ImportProgressReporter,
}

impl<'a> Importer<'a> {
    /// Import `translations` one after another.
    ///
    /// Failures are recorded in the summary and never stop the run. The
    /// search projection is not touched here.
    pub async fn import_all(&self, translations: &[Translation], bulk: &BookMetadata) -> ImportSummary {
        let mut summary = ImportSummary::default();
        let total = translations.len() as u64;

        for (i, translation) in translations.iter().enumerate() {
            let code = translation.short_name.as_str();
            self.progress.report(ImportProgressEvent::Starting {
                code: code.to_string(),
                n: i as u64 + 1,
                total,
            });

            let span = tracing::info_span!("translation", code);
            match self.import_translation(translation, bulk).instrument(span).await {
                Ok(report) => summary.committed.push(report),
                Err(err) => {
                    tracing::warn!(code, error = %err, "skipping translation");
                    self.progress.report(ImportProgressEvent::Failed {
                        code: code.to_string(),
                        reason: err.to_string(),
                    });
                    summary.record_failure(code, err);
                }
            }

            if i + 1 < translations.len() && !self.courtesy_delay.is_zero() {
                tokio::time::sleep(self.courtesy_delay).await;
            }
        }

        summary
    }

    /// Import one translation. Errors are always [`Error::PartialImport`].
    pub async fn import_translation(
        &self,
        translation: &Translation,
        bulk: &BookMetadata,
    ) -> Result<TranslationReport> {
        let code = translation.short_name.as_str();
        let mut report = TranslationReport::new(code);
        let fail = |state: ImportState, err: Error| Error::partial(code, state, err);

        upsert_translation(self.pool, translation)
            .await
            .map_err(|e| fail(report.state, e))?;

        let books = self
            .load_books(code, bulk)
            .await
            .map_err(|e| fail(report.state, e))?;
        write_books(self.pool, &books)
            .await
            .map_err(|e| fail(report.state, e))?;
        report.state = ImportState::BooksLoaded;
        report.books = books.len() as u64;
        self.progress.report(ImportProgressEvent::BooksLoaded {
            code: code.to_string(),
            books: report.books,
        });

        let payload = self
            .source
            .fetch_verses(code)
            .await
            .map_err(|e| fail(report.state, e))?;
        report.state = ImportState::VersesLoaded;
        self.progress.report(ImportProgressEvent::VersesLoaded {
            code: code.to_string(),
            verses: payload.len() as u64,
        });

        let reconciled = reconcile(code, &books, &payload);
        if !reconciled.synthesized.is_empty() {
            tracing::info!(ids = ?reconciled.synthesized, "auto-creating books missing from metadata");
        }
        let (verses, dropped) = normalize_verses(code, &payload);

        let synthesized: Vec<&Book> = reconciled.synthesized_books().collect();
        let written = self
            .commit_verses(code, &synthesized, &verses)
            .await
            .map_err(|e| fail(report.state, e))?;

        report.state = ImportState::Committed;
        report.synthesized = reconciled.synthesized;
        report.verses = written;
        report.dropped_empty = dropped;
        self.progress.report(ImportProgressEvent::Committed {
            code: code.to_string(),
            verses: written,
            synthesized: report.synthesized.len() as u64,
        });
        Ok(report)
    }

    /// Book list from the bulk map, then rows already committed for `code`,
    /// then the per-code endpoint.
    async fn load_books(&self, code: &str, bulk: &BookMetadata) -> Result<Vec<Book>> {
        if let Some(books) = bulk.get(code).filter(|b| !b.is_empty()) {
            return Ok(books.iter().cloned().map(|b| b.into_book(code)).collect());
        }

        let committed = committed_books(self.pool, code).await?;
        if !committed.is_empty() {
            tracing::info!(books = committed.len(), "not in bulk book map, reusing stored books");
            return Ok(committed);
        }

        tracing::info!("not in bulk book map, fetching individually");
        let remote = self.source.fetch_books_for(code).await?;
        Ok(remote.into_iter().map(|b| b.into_book(code)).collect())
    }

    /// Replace every verse of `code` and add synthesized books, in one transaction.
    async fn commit_verses(&self, code: &str, synthesized: &[&Book], verses: &[Verse]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        for book in synthesized {
            upsert_book(&mut tx, book).await?;
        }

        sqlx::query("DELETE FROM verses WHERE translation = ?")
            .bind(code)
            .execute(&mut *tx)
            .await?;

        let mut written = 0;
        for batch in verses.chunks(self.batch_size.max(1)) {
            written += insert_verses(&mut tx, batch).await?;
        }

        tx.commit().await?;
        Ok(written)
    }
}

/// Normalize verse markup, dropping verses that end up empty.
///
/// Returns the surviving verses and how many were dropped.
pub fn normalize_verses(code: &str, payload: &[RemoteVerse]) -> (Vec<Verse>, u64) {
    let mut dropped = 0;
    let verses = payload
        .iter()
        .filter_map(|v| {
            let text = strip_markup(v.text.as_deref());
            if text.is_empty() {
                dropped += 1;
                return None;
            }
            Some(Verse {
                translation: code.to_string(),
                book_id: v.book,
                chapter: v.chapter,
                verse: v.verse,
                text,
            })
        })
        .collect();
    (verses, dropped)
}

pub(crate) async fn upsert_translation(pool: &SqlitePool, t: &Translation) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO translations (short_name, full_name, language, direction)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(short_name) DO UPDATE SET
            full_name = excluded.full_name,
            language = excluded.language,
            direction = excluded.direction
        "#,
    )
    .bind(&t.short_name)
    .bind(&t.full_name)
    .bind(&t.language)
    .bind(t.direction.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// Book rows already stored for `code`, in id order.
async fn committed_books(pool: &SqlitePool, code: &str) -> Result<Vec<Book>> {
    let rows = sqlx::query(
        r#"
        SELECT book_id, name, chapters, chron_order, testament
        FROM books
        WHERE translation = ?
        ORDER BY book_id
        "#,
    )
    .bind(code)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let book_id: i64 = row.get("book_id");
            let testament: String = row.get("testament");
            Book {
                translation: code.to_string(),
                book_id,
                name: row.get("name"),
                chapters: row.get("chapters"),
                chron_order: row.get("chron_order"),
                testament: testament
                    .parse()
                    .unwrap_or_else(|_| Testament::from_book_id(book_id)),
            }
        })
        .collect())
}

async fn write_books(pool: &SqlitePool, books: &[Book]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for book in books {
        upsert_book(&mut tx, book).await?;
    }
    tx.commit().await?;
    Ok(())
}

pub(crate) async fn upsert_book(conn: &mut SqliteConnection, book: &Book) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO books (translation, book_id, name, chapters, chron_order, testament)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(translation, book_id) DO UPDATE SET
            name = excluded.name,
            chapters = excluded.chapters,
            chron_order = excluded.chron_order,
            testament = excluded.testament
        "#,
    )
    .bind(&book.translation)
    .bind(book.book_id)
    .bind(&book.name)
    .bind(book.chapters)
    .bind(book.chron_order)
    .bind(book.testament.as_str())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Multi-row insert of one batch. Repeated keys keep the last text.
pub(crate) async fn insert_verses(conn: &mut SqliteConnection, verses: &[Verse]) -> Result<u64> {
    if verses.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO verses (translation, book_id, chapter, verse, text) ");
    qb.push_values(verses, |mut row, v| {
        row.push_bind(v.translation.as_str())
            .push_bind(v.book_id)
            .push_bind(v.chapter)
            .push_bind(v.verse)
            .push_bind(v.text.as_str());
    });
    qb.push(
        " ON CONFLICT(translation, book_id, chapter, verse) DO UPDATE SET text = excluded.text",
    );

    qb.build().execute(&mut *conn).await?;
    Ok(verses.len() as u64)
}

/// Options for [`run_import`].
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Codes to import; empty means every listed translation.
    pub translations: Vec<String>,
    /// Print available translations and stop.
    pub list: bool,
    /// Recreate the store from scratch before importing.
    pub fresh: bool,
}

/// Split the requested codes into listed translations and unknown codes.
///
/// Codes are matched upper-cased. The result keeps the source's order.
pub fn select_translations(
    available: &[Translation],
    requested: &[String],
) -> (Vec<Translation>, Vec<String>) {
    if requested.is_empty() {
        return (available.to_vec(), Vec::new());
    }

    let wanted: HashSet<String> = requested.iter().map(|c| c.trim().to_uppercase()).collect();
    let selected: Vec<Translation> = available
        .iter()
        .filter(|t| wanted.contains(&t.short_name))
        .cloned()
        .collect();

    let found: HashSet<&str> = selected.iter().map(|t| t.short_name.as_str()).collect();
    let mut unknown: Vec<String> = wanted
        .iter()
        .filter(|c| !found.contains(c.as_str()))
        .cloned()
        .collect();
    unknown.sort();

    (selected, unknown)
}

/// `scripture import` against the configured remote source.
pub async fn run_import(
    config: &Config,
    options: &ImportOptions,
    progress: &dyn ImportProgressReporter,
) -> anyhow::Result<Option<ImportSummary>> {
    let source = BollsSource::new(&config.source)?;
    run_import_with_source(config, &source, options, progress).await
}

/// [`run_import`] with an explicit source.
///
/// Returns `None` in list mode. Only listing the translations, opening
/// the store, or the closing index rebuild can fail the whole run; the
/// summary is printed before a rebuild error is returned.
pub async fn run_import_with_source(
    config: &Config,
    source: &dyn ScriptureSource,
    options: &ImportOptions,
    progress: &dyn ImportProgressReporter,
) -> anyhow::Result<Option<ImportSummary>> {
    let groups = source
        .list_translations()
        .await
        .with_context(|| format!("Failed to list translations from {}", source.name()))?;
    let available = flatten_translations(&groups);

    if options.list {
        sources::print_translations(&available);
        return Ok(None);
    }

    let (selected, unknown) = select_translations(&available, &options.translations);
    if !unknown.is_empty() {
        tracing::warn!(codes = ?unknown, "requested translations not found");
    }
    if selected.is_empty() {
        println!("No valid translations selected. Use --list to see available codes.");
        let summary = ImportSummary {
            unknown_codes: unknown,
            ..Default::default()
        };
        summary.print(&config.db.path);
        return Ok(Some(summary));
    }
    tracing::info!(count = selected.len(), "importing translations");

    let bulk = match source.fetch_book_metadata().await {
        Ok(map) => map,
        Err(err) => {
            tracing::warn!(error = %err, "bulk book metadata unavailable, falling back per translation");
            BookMetadata::new()
        }
    };

    let pool = migrate::open_store(&config.db.path, options.fresh)
        .await
        .with_context(|| format!("Failed to open store at {}", config.db.path.display()))?;

    let importer = Importer {
        pool: &pool,
        source,
        batch_size: config.import.batch_size,
        courtesy_delay: config.source.courtesy_delay(),
        progress,
    };
    let mut summary = importer.import_all(&selected, &bulk).await;
    summary.unknown_codes = unknown;

    let finished = finish_store(&pool).await;
    pool.close().await;
    if let Ok(entries) = &finished {
        summary.search_entries = *entries;
    }

    summary.print(&config.db.path);
    finished.context("Failed to rebuild the search index")?;
    Ok(Some(summary))
}

/// Rebuild the search projection and refresh planner statistics.
async fn finish_store(pool: &SqlitePool) -> Result<u64> {
    let entries = search_index::rebuild_full(pool).await?;
    migrate::optimize(pool).await?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextDirection;

    fn t(code: &str) -> Translation {
        Translation {
            short_name: code.into(),
            full_name: format!("{} full", code),
            language: "English".into(),
            direction: TextDirection::Ltr,
        }
    }

    #[test]
    fn select_all_when_empty() {
        let available = vec![t("KJV"), t("YLT")];
        let (selected, unknown) = select_translations(&available, &[]);
        assert_eq!(selected.len(), 2);
        assert!(unknown.is_empty());
    }

    #[test]
    fn select_is_case_insensitive_and_reports_unknown() {
        let available = vec![t("KJV"), t("YLT"), t("WEB")];
        let requested = vec!["web".to_string(), "kjv".to_string(), "nope".to_string()];
        let (selected, unknown) = select_translations(&available, &requested);
        let codes: Vec<&str> = selected.iter().map(|t| t.short_name.as_str()).collect();
        assert_eq!(codes, vec!["KJV", "WEB"]);
        assert_eq!(unknown, vec!["NOPE".to_string()]);
    }

    #[test]
    fn normalize_drops_empty_text() {
        let payload = vec![
            RemoteVerse {
                book: 1,
                chapter: 1,
                verse: 1,
                text: Some("In the <i>beginning</i>".into()),
            },
            RemoteVerse {
                book: 1,
                chapter: 1,
                verse: 2,
                text: Some("<sup>a</sup>".into()),
            },
            RemoteVerse {
                book: 1,
                chapter: 1,
                verse: 3,
                text: None,
            },
        ];
        let (verses, dropped) = normalize_verses("KJV", &payload);
        assert_eq!(dropped, 2);
        assert_eq!(verses.len(), 1);
        assert_eq!(verses[0].text, "In the beginning");
        assert_eq!(verses[0].translation, "KJV");
    }

    #[test]
    fn unscoped_error_fails_from_pending() {
        let mut summary = ImportSummary::default();
        summary.record_failure("KJV", Error::NotFound { code: "KJV".into() });
        assert_eq!(summary.failed[0].state, ImportState::Failed);
        assert_eq!(summary.failed[0].reached, ImportState::Pending);
    }

    #[test]
    fn state_names() {
        assert_eq!(ImportState::Pending.to_string(), "PENDING");
        assert_eq!(ImportState::VersesLoaded.to_string(), "VERSES_LOADED");
        assert_eq!(ImportState::Failed.to_string(), "FAILED");
    }

    #[test]
    fn failure_keeps_state_reached() {
        let mut summary = ImportSummary::default();
        summary.record_failure(
            "XYZ",
            Error::partial(
                "XYZ",
                ImportState::BooksLoaded,
                Error::NotFound { code: "XYZ".into() },
            ),
        );
        assert_eq!(summary.failed_codes(), vec!["XYZ"]);
        assert_eq!(summary.failed[0].state, ImportState::Failed);
        assert_eq!(summary.failed[0].reached, ImportState::BooksLoaded);
        assert!(summary.failed[0].reason.contains("no data"));
    }
}
