//! HTTP source adapter against a local axum server.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use scripture_harness::config::{Config, SourceConfig};
use scripture_harness::error::Error;
use scripture_harness::ingest::{run_import_with_source, ImportOptions};
use scripture_harness::progress::NoProgress;
use scripture_harness::retry::RetryPolicy;
use scripture_harness::source::{BollsSource, ScriptureSource};
use scripture_harness::{db, search};

#[derive(Clone, Default)]
struct Hits {
    verses: Arc<AtomicUsize>,
    books: Arc<AtomicUsize>,
    /// Verse requests that answer 503 before the payload is served.
    verse_failures: usize,
}

async fn languages() -> Json<serde_json::Value> {
    Json(json!([
        {
            "language": "English",
            "translations": [
                {"short_name": "KJV", "full_name": "King James Version", "dir": "ltr"},
                {"short_name": "ABC", "full_name": "Missing Everywhere"}
            ]
        },
        {
            "language": "Hebrew",
            "translations": [
                {"short_name": "WLC", "full_name": "Westminster Leningrad Codex", "dir": "rtl"}
            ]
        }
    ]))
}

async fn all_books() -> Json<serde_json::Value> {
    Json(json!({
        "KJV": [
            {"bookid": 1, "name": "Genesis", "chapters": 50, "chronorder": 1},
            {"bookid": 43, "name": "John", "chapters": 21}
        ]
    }))
}

async fn books_for(State(hits): State<Hits>, Path(code): Path<String>) -> Response {
    hits.books.fetch_add(1, Ordering::SeqCst);
    match code.as_str() {
        "NUL" => Json(serde_json::Value::Null).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn verses(State(hits): State<Hits>, Path(file): Path<String>) -> Response {
    let n = hits.verses.fetch_add(1, Ordering::SeqCst);
    if n < hits.verse_failures {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    match file.trim_end_matches(".json") {
        "KJV" => Json(json!([
            {"pk": 1, "book": 1, "chapter": 1, "verse": 1, "text": "In the beginning God created the heaven and the earth."},
            {"pk": 2, "book": 43, "chapter": 4, "verse": 14, "text": "a well of water springing up into <i>everlasting</i> life.<S>2222</S>"}
        ]))
        .into_response(),
        "BAD" => "not json".into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve(hits: Hits) -> String {
    let app = Router::new()
        .route("/static/bolls/app/views/languages.json", get(languages))
        .route("/static/bolls/app/views/translations_books.json", get(all_books))
        .route("/get-books/{code}/", get(books_for))
        .route("/static/translations/{file}", get(verses))
        .with_state(hits);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn source_for(base_url: &str, attempts: u32) -> BollsSource {
    let config = SourceConfig {
        base_url: base_url.to_string(),
        timeout_secs: 5,
        ..Default::default()
    };
    BollsSource::new(&config)
        .unwrap()
        .with_retry(RetryPolicy::immediate(attempts))
}

#[tokio::test]
async fn lists_translations_grouped_by_language() {
    let base = serve(Hits::default()).await;
    let source = source_for(&base, 3);

    let groups = source.list_translations().await.unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].translations.len(), 2);
    assert_eq!(groups[1].translations[0].dir.as_deref(), Some("rtl"));

    let books = source.fetch_book_metadata().await.unwrap();
    assert_eq!(books["KJV"].len(), 2);
    assert_eq!(books["KJV"][1].chron_order, None);
}

#[tokio::test]
async fn missing_books_are_not_found_without_retry() {
    let hits = Hits::default();
    let base = serve(hits.clone()).await;
    let source = source_for(&base, 3);

    let err = source.fetch_books_for("ABC").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { ref code } if code == "ABC"));
    assert_eq!(hits.books.load(Ordering::SeqCst), 1);

    let err = source.fetch_books_for("NUL").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn transient_failure_is_retried() {
    let hits = Hits {
        verse_failures: 1,
        ..Default::default()
    };
    let base = serve(hits.clone()).await;
    let source = source_for(&base, 3);

    let payload = source.fetch_verses("KJV").await.unwrap();
    assert_eq!(payload.len(), 2);
    assert_eq!(payload[1].book, 43);
    assert_eq!(hits.verses.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retry_budget_is_exhausted_on_persistent_failure() {
    let hits = Hits {
        verse_failures: usize::MAX,
        ..Default::default()
    };
    let base = serve(hits.clone()).await;
    let source = source_for(&base, 3);

    let err = source.fetch_verses("KJV").await.unwrap_err();
    match err {
        Error::Fetch { code, source } => {
            assert_eq!(code, "KJV");
            assert!(matches!(*source, Error::Network { attempts: 3, .. }));
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
    assert_eq!(hits.verses.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn malformed_payload_is_a_fetch_error() {
    let hits = Hits::default();
    let base = serve(hits.clone()).await;
    let source = source_for(&base, 2);

    let err = source.fetch_verses("BAD").await.unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }));
    assert_eq!(hits.verses.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn import_over_http() {
    let hits = Hits {
        verse_failures: 1,
        ..Default::default()
    };
    let base = serve(hits).await;
    let source = source_for(&base, 3);

    let tmp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.db.path = tmp.path().join("bible.db");
    config.source.courtesy_delay_ms = 0;

    let options = ImportOptions {
        translations: vec!["kjv".into(), "abc".into()],
        ..Default::default()
    };
    let summary = run_import_with_source(&config, &source, &options, &NoProgress)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.committed.len(), 1);
    assert_eq!(summary.total_verses(), 2);
    assert_eq!(summary.failed_codes(), vec!["ABC"]);

    let pool = db::connect(&config.db.path).await.unwrap();
    let hits = search::search_verses(&pool, "everlasting", None, 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].book_name.as_deref(), Some("John"));
    assert_eq!(
        hits[0].highlighted,
        "a well of water springing up into [everlasting] life."
    );
}
