//! Store statistics.
//!
//! A quick summary of what is stored: translation, book and verse counts,
//! search projection coverage, per-translation breakdowns, and the testament
//! categories the live schema accepts. Used by `scripture stats` to confirm
//! that imports did what they claimed.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::models::Testament;
use crate::progress::format_number;

/// Per-translation row counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationStats {
    pub code: String,
    pub language: String,
    pub books: i64,
    pub verses: i64,
    /// Books whose name is the `Book N` placeholder.
    pub synthesized: i64,
}

/// Whole-store counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub translations: i64,
    pub books: i64,
    pub verses: i64,
    pub search_entries: i64,
    pub permitted: Vec<Testament>,
    pub by_translation: Vec<TranslationStats>,
}

/// Count everything in the store.
pub async fn collect_stats(pool: &SqlitePool) -> crate::error::Result<StoreStats> {
    let translations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM translations")
        .fetch_one(pool)
        .await?;
    let books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(pool)
        .await?;
    let verses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verses")
        .fetch_one(pool)
        .await?;
    let search_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM verses_fts")
        .fetch_one(pool)
        .await?;
    let permitted = migrate::permitted_testaments(pool).await?.unwrap_or_default();

    let rows = sqlx::query(
        r#"
        SELECT
            t.short_name AS code,
            t.language AS language,
            (SELECT COUNT(*) FROM books b WHERE b.translation = t.short_name) AS books,
            (SELECT COUNT(*) FROM verses v WHERE v.translation = t.short_name) AS verses,
            (SELECT COUNT(*) FROM books b
                WHERE b.translation = t.short_name
                  AND b.name = 'Book ' || b.book_id) AS synthesized
        FROM translations t
        ORDER BY t.short_name
        "#,
    )
    .fetch_all(pool)
    .await?;

    let by_translation = rows
        .iter()
        .map(|row| TranslationStats {
            code: row.get("code"),
            language: row.get("language"),
            books: row.get("books"),
            verses: row.get("verses"),
            synthesized: row.get("synthesized"),
        })
        .collect();

    Ok(StoreStats {
        translations,
        books,
        verses,
        search_entries,
        permitted,
        by_translation,
    })
}

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::open_existing(&config.db.path).await?;
    let stats = collect_stats(&pool).await?;

    let metadata = std::fs::metadata(&config.db.path).ok();
    let db_size = metadata.as_ref().map(|m| m.len()).unwrap_or(0);
    let modified = metadata
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64);

    let permitted = stats
        .permitted
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    println!("Scripture Harness — Store Stats");
    println!("===============================");
    println!();
    println!("  Database:      {}", config.db.path.display());
    println!("  Size:          {}", format_bytes(db_size));
    if let Some(ts) = modified {
        println!("  Last write:    {}", format_ts_relative(ts));
    }
    println!("  Testaments:    {}", permitted);
    println!();
    println!("  Translations:  {}", stats.translations);
    println!("  Books:         {}", format_number(stats.books as u64));
    println!("  Verses:        {}", format_number(stats.verses as u64));
    println!(
        "  Searchable:    {} / {}",
        format_number(stats.search_entries as u64),
        format_number(stats.verses as u64)
    );

    if !stats.by_translation.is_empty() {
        println!();
        println!("  By translation:");
        println!(
            "  {:<12} {:<20} {:>6} {:>10} {:>6}",
            "CODE", "LANGUAGE", "BOOKS", "VERSES", "AUTO"
        );
        println!("  {}", "-".repeat(58));

        for t in &stats.by_translation {
            println!(
                "  {:<12} {:<20} {:>6} {:>10} {:>6}",
                t.code,
                truncate(&t.language, 20),
                t.books,
                format_number(t.verses as u64),
                t.synthesized
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max - 1).collect();
        out.push('…');
        out
    }
}

/// Format a byte count as a human-readable string.
pub(crate) fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
