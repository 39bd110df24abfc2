//! Schema creation and evolution.
//!
//! Three entry points with different guarantees:
//!
//! - [`initialize`] deletes the store and builds the full schema from
//!   scratch. It is a rebuild, never a migration.
//! - [`ensure_schema`] creates whatever is missing and leaves existing
//!   tables alone.
//! - [`evolve_testament_categories`] widens the `books.testament` CHECK
//!   constraint in place through a shadow table. It decides whether to act
//!   by reading the live constraint text, so it can run on every startup.

use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::db;
use crate::error::{Error, Result};
use crate::models::Testament;

static CHECK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CHECK\s*\(\s*testament\s+IN\s*\(([^)]*)\)").unwrap());
static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'([^']*)'").unwrap());

const SHADOW_TABLE: &str = "books_new";

/// Outcome of [`evolve_testament_categories`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evolution {
    /// The live constraint already permits every required category.
    AlreadyPermitted,
    /// The books table was rebuilt with a wider constraint.
    Widened {
        permitted: Vec<Testament>,
        rows_copied: i64,
    },
}

fn books_ddl(table: &str, permitted: &[Testament]) -> String {
    let allowed = permitted
        .iter()
        .map(|t| format!("'{}'", t.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            translation TEXT    NOT NULL,
            book_id     INTEGER NOT NULL,
            name        TEXT    NOT NULL,
            chapters    INTEGER NOT NULL,
            chron_order INTEGER NOT NULL,
            testament   TEXT    NOT NULL CHECK(testament IN ({allowed})),
            PRIMARY KEY (translation, book_id),
            FOREIGN KEY (translation) REFERENCES translations(short_name)
        )
        "#
    )
}

/// Delete the store at `db_path` and create the full schema.
pub async fn initialize(db_path: &Path) -> Result<SqlitePool> {
    for path in store_files(db_path) {
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
    }

    let pool = db::connect(db_path).await?;
    create_schema(&pool).await?;
    tracing::info!(path = %db_path.display(), "initialized store");
    Ok(pool)
}

fn store_files(db_path: &Path) -> Vec<PathBuf> {
    ["", "-wal", "-shm"]
        .iter()
        .map(|suffix| {
            let mut os = db_path.as_os_str().to_owned();
            os.push(suffix);
            PathBuf::from(os)
        })
        .collect()
}

/// Create any missing relation or index. Returns `true` when the store was
/// empty beforehand.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<bool> {
    let fresh = !table_exists(pool, "books").await?;
    create_schema(pool).await?;
    Ok(fresh)
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS translations (
            short_name TEXT PRIMARY KEY,
            full_name  TEXT NOT NULL,
            language   TEXT NOT NULL,
            direction  TEXT NOT NULL DEFAULT 'ltr'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(&books_ddl("books", &Testament::ALL))
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS verses (
            translation TEXT    NOT NULL,
            book_id     INTEGER NOT NULL,
            chapter     INTEGER NOT NULL,
            verse       INTEGER NOT NULL,
            text        TEXT    NOT NULL,
            PRIMARY KEY (translation, book_id, chapter, verse),
            FOREIGN KEY (translation, book_id) REFERENCES books(translation, book_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // FTS5 CREATE is not idempotent natively, so we check first
    if !table_exists(pool, "verses_fts").await? {
        sqlx::query(crate::search_index::CREATE_VERSES_FTS)
            .execute(pool)
            .await?;
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_verses_chapter ON verses(translation, book_id, chapter)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_translation ON books(translation)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn table_exists(pool: &SqlitePool, name: &str) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?")
            .bind(name)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

/// Testament categories the live `books` constraint accepts.
///
/// `None` when the books table does not exist. A table without a testament
/// CHECK accepts everything.
pub async fn permitted_testaments(pool: &SqlitePool) -> Result<Option<Vec<Testament>>> {
    let sql: Option<String> =
        sqlx::query_scalar("SELECT sql FROM sqlite_master WHERE type='table' AND name='books'")
            .fetch_optional(pool)
            .await?;

    Ok(sql.map(|sql| parse_permitted(&sql)))
}

fn parse_permitted(table_sql: &str) -> Vec<Testament> {
    let Some(caps) = CHECK_RE.captures(table_sql) else {
        return Testament::ALL.to_vec();
    };

    let mut permitted: Vec<Testament> = QUOTED_RE
        .captures_iter(&caps[1])
        .filter_map(|c| c[1].parse().ok())
        .collect();
    permitted.sort();
    permitted.dedup();
    permitted
}

/// Make sure the books constraint permits every category in `required`.
///
/// No-op when it already does. Otherwise the table is rebuilt as a shadow
/// with the union of the live and required sets, rows are copied in rowid
/// order, the original is dropped and the shadow renamed into place. The
/// rewrite is one transaction on one connection with foreign keys off; a
/// row-count mismatch or a dangling reference afterwards aborts it with
/// [`Error::ConstraintViolation`].
pub async fn evolve_testament_categories(
    pool: &SqlitePool,
    required: &[Testament],
) -> Result<Evolution> {
    let current = permitted_testaments(pool)
        .await?
        .ok_or_else(|| Error::ConstraintViolation {
            table: "books".to_string(),
            detail: "table does not exist; initialize the store first".to_string(),
        })?;

    if required.iter().all(|t| current.contains(t)) {
        tracing::debug!(?current, "testament constraint already permits required set");
        return Ok(Evolution::AlreadyPermitted);
    }

    let mut widened: Vec<Testament> = current.iter().chain(required).copied().collect();
    widened.sort();
    widened.dedup();

    tracing::info!(from = ?current, to = ?widened, "widening books.testament constraint");

    let mut conn = pool.acquire().await?;
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&mut *conn)
        .await?;
    let rewritten = rewrite_books(&mut conn, &widened).await;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;
    let rows_copied = rewritten?;

    tracing::info!(rows_copied, "books table migrated");
    Ok(Evolution::Widened {
        permitted: widened,
        rows_copied,
    })
}

async fn rewrite_books(conn: &mut SqliteConnection, permitted: &[Testament]) -> Result<i64> {
    let mut tx = sqlx::Connection::begin(&mut *conn).await?;

    // Leftover from an interrupted attempt
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", SHADOW_TABLE))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&books_ddl(SHADOW_TABLE, permitted))
        .execute(&mut *tx)
        .await?;

    let before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query(&format!(
        r#"
        INSERT INTO {} (translation, book_id, name, chapters, chron_order, testament)
        SELECT translation, book_id, name, chapters, chron_order, testament
        FROM books ORDER BY rowid
        "#,
        SHADOW_TABLE
    ))
    .execute(&mut *tx)
    .await?;

    sqlx::query("DROP TABLE books").execute(&mut *tx).await?;
    sqlx::query(&format!("ALTER TABLE {} RENAME TO books", SHADOW_TABLE))
        .execute(&mut *tx)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_translation ON books(translation)")
        .execute(&mut *tx)
        .await?;

    let after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(&mut *tx)
        .await?;
    if after != before {
        return Err(Error::ConstraintViolation {
            table: "books".to_string(),
            detail: format!("copied {} of {} rows", after, before),
        });
    }

    let dangling = sqlx::query("PRAGMA foreign_key_check(books)")
        .fetch_all(&mut *tx)
        .await?;
    if let Some(row) = dangling.first() {
        let parent: String = row.try_get("parent").unwrap_or_default();
        return Err(Error::ConstraintViolation {
            table: "books".to_string(),
            detail: format!("{} row(s) reference missing {} rows", dangling.len(), parent),
        });
    }

    tx.commit().await?;
    Ok(after)
}

/// Open the store for writing.
///
/// With `fresh`, or when no store exists yet, the store is initialized.
/// Otherwise missing tables are created and the testament constraint is
/// widened to every category; existing rows are kept.
pub async fn open_store(db_path: &Path, fresh: bool) -> Result<SqlitePool> {
    if fresh || !db_path.exists() {
        return initialize(db_path).await;
    }

    let pool = db::connect(db_path).await?;
    if ensure_schema(&pool).await? {
        tracing::info!(path = %db_path.display(), "created schema in empty store");
    }
    evolve_testament_categories(&pool, &Testament::ALL).await?;
    Ok(pool)
}

/// Refresh planner statistics after a bulk load.
pub async fn optimize(pool: &SqlitePool) -> Result<()> {
    sqlx::query("ANALYZE").execute(pool).await?;
    sqlx::query("PRAGMA optimize").execute(pool).await?;
    Ok(())
}

/// `scripture init`: recreate the store from scratch.
pub async fn run_init(config: &Config) -> anyhow::Result<()> {
    let pool = initialize(&config.db.path).await?;
    pool.close().await;
    println!("Store initialized at {}", config.db.path.display());
    Ok(())
}

/// `scripture migrate`: create missing tables and widen the testament
/// constraint to `required`.
pub async fn run_migrate(config: &Config, required: &[Testament]) -> anyhow::Result<()> {
    let pool = db::connect(&config.db.path).await?;
    ensure_schema(&pool).await?;

    match evolve_testament_categories(&pool, required).await? {
        Evolution::AlreadyPermitted => println!("books.testament already permits all required categories."),
        Evolution::Widened {
            permitted,
            rows_copied,
        } => {
            let names: Vec<&str> = permitted.iter().map(|t| t.as_str()).collect();
            println!(
                "books.testament widened to {} ({} rows copied).",
                names.join(", "),
                rows_copied
            );
        }
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_live_constraint() {
        let sql = books_ddl("books", &[Testament::Old, Testament::New, Testament::Deuterocanonical]);
        assert_eq!(
            parse_permitted(&sql),
            vec![Testament::Old, Testament::New, Testament::Deuterocanonical]
        );
    }

    #[test]
    fn parses_compact_constraint() {
        let sql = "CREATE TABLE books (testament TEXT CHECK(testament IN ('NT','OT')))";
        assert_eq!(parse_permitted(sql), vec![Testament::Old, Testament::New]);
    }

    #[test]
    fn unconstrained_table_permits_all() {
        let sql = "CREATE TABLE books (testament TEXT NOT NULL)";
        assert_eq!(parse_permitted(sql), Testament::ALL.to_vec());
    }

    #[test]
    fn store_files_include_wal_siblings() {
        let files = store_files(Path::new("/tmp/bible.db"));
        assert_eq!(
            files,
            vec![
                PathBuf::from("/tmp/bible.db"),
                PathBuf::from("/tmp/bible.db-wal"),
                PathBuf::from("/tmp/bible.db-shm"),
            ]
        );
    }
}
