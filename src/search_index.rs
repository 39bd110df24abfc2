//! The `verses_fts` search projection.
//!
//! Search entries mirror verse rows one to one: the verse text is tokenized,
//! the identity columns are stored but not indexed. The projection is
//! derived data and is always rebuilt from `verses`, never written directly
//! by the import paths.

use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::error::Result;

pub(crate) const CREATE_VERSES_FTS: &str = r#"
    CREATE VIRTUAL TABLE verses_fts USING fts5(
        text,
        translation UNINDEXED,
        book_id UNINDEXED,
        chapter UNINDEXED,
        verse UNINDEXED,
        tokenize='unicode61'
    )
"#;

/// Drop and recreate the whole projection from current verse rows.
///
/// Returns the number of search entries written.
pub async fn rebuild_full(pool: &SqlitePool) -> Result<u64> {
    let mut tx = pool.begin().await?;

    sqlx::query("DROP TABLE IF EXISTS verses_fts")
        .execute(&mut *tx)
        .await?;
    sqlx::query(CREATE_VERSES_FTS).execute(&mut *tx).await?;
    let written = sqlx::query(
        r#"
        INSERT INTO verses_fts (text, translation, book_id, chapter, verse)
        SELECT text, translation, book_id, chapter, verse FROM verses
        "#,
    )
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    tracing::info!(entries = written, "search index rebuilt");
    Ok(written)
}

/// Replace the search entries of one translation, leaving others untouched.
///
/// Returns the number of search entries written for `translation`.
pub async fn refresh_scope(pool: &SqlitePool, translation: &str) -> Result<u64> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM verses_fts WHERE translation = ?")
        .bind(translation)
        .execute(&mut *tx)
        .await?;
    let written = sqlx::query(
        r#"
        INSERT INTO verses_fts (text, translation, book_id, chapter, verse)
        SELECT text, translation, book_id, chapter, verse
        FROM verses WHERE translation = ?
        "#,
    )
    .bind(translation)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    tx.commit().await?;
    tracing::info!(translation, entries = written, "search index refreshed");
    Ok(written)
}

/// `scripture index rebuild`.
pub async fn run_rebuild(config: &Config) -> anyhow::Result<()> {
    let pool = db::open_existing(&config.db.path).await?;
    let written = rebuild_full(&pool).await?;
    pool.close().await;
    println!("Search index rebuilt: {} entries.", written);
    Ok(())
}

/// `scripture index refresh <CODE>`.
pub async fn run_refresh(config: &Config, translation: &str) -> anyhow::Result<()> {
    let pool = db::open_existing(&config.db.path).await?;
    let code = translation.to_uppercase();
    let written = refresh_scope(&pool, &code).await?;
    pool.close().await;
    println!("Search index refreshed for {}: {} entries.", code, written);
    Ok(())
}
