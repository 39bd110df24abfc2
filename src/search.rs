//! Keyword search over the `verses_fts` projection.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

pub const DEFAULT_LIMIT: i64 = 50;

/// One matching verse.
#[derive(Debug, Clone, PartialEq)]
pub struct VerseHit {
    pub translation: String,
    pub book_id: i64,
    /// `None` when the book row is missing.
    pub book_name: Option<String>,
    pub chapter: i64,
    pub verse: i64,
    /// Verse text with matches wrapped in `[` `]`.
    pub highlighted: String,
    pub rank: f64,
}

/// Turn free text into an FTS5 query of quoted terms.
///
/// Each whitespace-separated word becomes a phrase, so punctuation in user
/// input can't be read as query syntax. Terms are implicitly ANDed.
fn to_match_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|term| format!("\"{}\"", term.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Search verse text, best matches first.
pub async fn search_verses(
    pool: &SqlitePool,
    query: &str,
    translation: Option<&str>,
    limit: i64,
) -> crate::error::Result<Vec<VerseHit>> {
    let match_query = to_match_query(query);
    if match_query.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT verses_fts.translation AS translation,
               verses_fts.book_id AS book_id,
               verses_fts.chapter AS chapter,
               verses_fts.verse AS verse,
               books.name AS book_name,
               highlight(verses_fts, 0, '[', ']') AS highlighted,
               verses_fts.rank AS rank
        FROM verses_fts
        LEFT JOIN books
               ON books.translation = verses_fts.translation
              AND books.book_id = verses_fts.book_id
        WHERE verses_fts MATCH ?
          AND (? IS NULL OR verses_fts.translation = ?)
        ORDER BY verses_fts.rank
        LIMIT ?
        "#,
    )
    .bind(&match_query)
    .bind(translation)
    .bind(translation)
    .bind(limit.max(1))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| VerseHit {
            translation: row.get("translation"),
            book_id: row.get("book_id"),
            book_name: row.get("book_name"),
            chapter: row.get("chapter"),
            verse: row.get("verse"),
            highlighted: row.get("highlighted"),
            rank: row.get("rank"),
        })
        .collect())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    translation: Option<String>,
    limit: Option<i64>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = db::open_existing(&config.db.path).await?;
    let translation = translation.map(|t| t.to_uppercase());
    let hits = search_verses(
        &pool,
        query,
        translation.as_deref(),
        limit.unwrap_or(DEFAULT_LIMIT),
    )
    .await?;

    if hits.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let book = hit
            .book_name
            .clone()
            .unwrap_or_else(|| format!("#{}", hit.book_id));
        println!(
            "{}. {} {} {}:{}",
            i + 1,
            hit.translation,
            book,
            hit.chapter,
            hit.verse
        );
        println!("    {}", hit.highlighted.replace('\n', " ").trim());
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_each_term() {
        assert_eq!(to_match_query("light  darkness"), "\"light\" \"darkness\"");
    }

    #[test]
    fn escapes_embedded_quotes() {
        assert_eq!(to_match_query("say \"hi\""), "\"say\" \"\"\"hi\"\"\"");
    }

    #[test]
    fn blank_query_is_empty() {
        assert_eq!(to_match_query("   "), "");
    }
}
