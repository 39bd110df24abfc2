//! Remote scripture source.
//!
//! [`ScriptureSource`] is the seam between the ingestion engine and the
//! network. [`BollsSource`] implements it over HTTP against the bolls.life
//! static endpoints; tests substitute in-memory sources.
//!
//! # Endpoints
//!
//! | Operation | Path |
//! |-----------|------|
//! | [`list_translations`](ScriptureSource::list_translations) | `/static/bolls/app/views/languages.json` |
//! | [`fetch_book_metadata`](ScriptureSource::fetch_book_metadata) | `/static/bolls/app/views/translations_books.json` |
//! | [`fetch_books_for`](ScriptureSource::fetch_books_for) | `/get-books/{code}/` |
//! | [`fetch_verses`](ScriptureSource::fetch_verses) | `/static/translations/{code}.json` |

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::SourceConfig;
use crate::error::{Error, Result, TransportError};
use crate::models::{Book, Testament, TextDirection, Translation};
use crate::retry::RetryPolicy;

/// Translations sharing a language, as listed by the remote source.
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageGroup {
    #[serde(default = "unknown_language")]
    pub language: String,
    #[serde(default)]
    pub translations: Vec<RemoteTranslation>,
}

fn unknown_language() -> String {
    "Unknown".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteTranslation {
    pub short_name: String,
    pub full_name: String,
    #[serde(default)]
    pub dir: Option<String>,
}

/// Book metadata entry, shared by the bulk map and the per-code endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteBook {
    #[serde(rename = "bookid")]
    pub book_id: i64,
    pub name: String,
    pub chapters: i64,
    #[serde(default, rename = "chronorder")]
    pub chron_order: Option<i64>,
}

impl RemoteBook {
    pub fn into_book(self, translation: &str) -> Book {
        Book {
            translation: translation.to_string(),
            book_id: self.book_id,
            name: self.name,
            chapters: self.chapters,
            chron_order: self.chron_order.unwrap_or(self.book_id),
            testament: Testament::from_book_id(self.book_id),
        }
    }
}

/// One element of a bulk verse payload. `text` is raw markup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteVerse {
    pub book: i64,
    pub chapter: i64,
    pub verse: i64,
    #[serde(default)]
    pub text: Option<String>,
}

/// Translation code → book list. Codes may be missing.
pub type BookMetadata = HashMap<String, Vec<RemoteBook>>;

/// Flatten language groups into translation records.
pub fn flatten_translations(groups: &[LanguageGroup]) -> Vec<Translation> {
    groups
        .iter()
        .flat_map(|group| {
            group.translations.iter().map(move |t| Translation {
                short_name: t.short_name.clone(),
                full_name: t.full_name.clone(),
                language: group.language.clone(),
                direction: t
                    .dir
                    .as_deref()
                    .map(TextDirection::parse_lenient)
                    .unwrap_or_default(),
            })
        })
        .collect()
}

/// A read-only source of translations, book metadata and verses.
#[async_trait]
pub trait ScriptureSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// All translations, grouped by language.
    async fn list_translations(&self) -> Result<Vec<LanguageGroup>>;

    /// Bulk book metadata for every translation the source knows about.
    async fn fetch_book_metadata(&self) -> Result<BookMetadata>;

    /// Book metadata for one code. [`Error::NotFound`] when the source has none.
    async fn fetch_books_for(&self, code: &str) -> Result<Vec<RemoteBook>>;

    /// Every verse of one translation. Failures surface as [`Error::Fetch`].
    async fn fetch_verses(&self, code: &str) -> Result<Vec<RemoteVerse>>;
}

/// HTTP source backed by the bolls.life static API.
pub struct BollsSource {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl BollsSource {
    pub fn new(config: &SourceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("scripture-harness/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: config.retry_policy(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let client = &self.client;
        let url = &url;

        self.retry
            .run(what, move || async move {
                let resp = client.get(url).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(TransportError::Status {
                        url: url.clone(),
                        status: status.as_u16(),
                    });
                }
                let body = resp.bytes().await?;
                serde_json::from_slice(&body).map_err(|source| TransportError::Decode {
                    url: url.clone(),
                    source,
                })
            })
            .await
    }
}

#[async_trait]
impl ScriptureSource for BollsSource {
    fn name(&self) -> &str {
        "bolls"
    }

    async fn list_translations(&self) -> Result<Vec<LanguageGroup>> {
        self.get_json("/static/bolls/app/views/languages.json", "translations list")
            .await
    }

    async fn fetch_book_metadata(&self) -> Result<BookMetadata> {
        self.get_json("/static/bolls/app/views/translations_books.json", "all books")
            .await
    }

    async fn fetch_books_for(&self, code: &str) -> Result<Vec<RemoteBook>> {
        let what = format!("books for {}", code);
        let books: Option<Vec<RemoteBook>> =
            match self.get_json(&format!("/get-books/{}/", code), &what).await {
                Ok(books) => books,
                Err(Error::Network { ref source, .. }) if source.status() == Some(404) => None,
                Err(e) => return Err(e),
            };

        match books {
            Some(books) if !books.is_empty() => Ok(books),
            _ => Err(Error::NotFound {
                code: code.to_string(),
            }),
        }
    }

    async fn fetch_verses(&self, code: &str) -> Result<Vec<RemoteVerse>> {
        let what = format!("verses for {}", code);
        self.get_json(&format!("/static/translations/{}.json", code), &what)
            .await
            .map_err(|e| Error::fetch(code, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shapes_deserialize() {
        let groups: Vec<LanguageGroup> = serde_json::from_str(
            r#"[
                {"language": "English", "translations": [
                    {"short_name": "KJV", "full_name": "King James Version", "dir": "ltr"},
                    {"short_name": "YLT", "full_name": "Young's Literal"}
                ]},
                {"language": "Hebrew", "translations": [
                    {"short_name": "WLC", "full_name": "Westminster Leningrad", "dir": "rtl"}
                ]},
                {"translations": [{"short_name": "ZZZ", "full_name": "Mystery"}]}
            ]"#,
        )
        .unwrap();

        let flat = flatten_translations(&groups);
        assert_eq!(flat.len(), 4);
        assert_eq!(flat[0].language, "English");
        assert_eq!(flat[1].direction, TextDirection::Ltr);
        assert_eq!(flat[2].direction, TextDirection::Rtl);
        assert_eq!(flat[3].language, "Unknown");
    }

    #[test]
    fn remote_book_defaults_chron_order() {
        let books: Vec<RemoteBook> = serde_json::from_str(
            r#"[{"bookid": 1, "name": "Genesis", "chapters": 50, "chronorder": 3},
                {"bookid": 70, "name": "Judith", "chapters": 16}]"#,
        )
        .unwrap();

        let genesis = books[0].clone().into_book("KJV");
        assert_eq!(genesis.chron_order, 3);
        assert_eq!(genesis.testament, Testament::Old);

        let judith = books[1].clone().into_book("KJV");
        assert_eq!(judith.chron_order, 70);
        assert_eq!(judith.testament, Testament::Deuterocanonical);
    }

    #[test]
    fn verse_text_may_be_missing() {
        let verses: Vec<RemoteVerse> = serde_json::from_str(
            r#"[{"pk": 1, "book": 1, "chapter": 1, "verse": 1, "text": "x"},
                {"book": 1, "chapter": 1, "verse": 2, "text": null},
                {"book": 1, "chapter": 1, "verse": 3}]"#,
        )
        .unwrap();
        assert_eq!(verses[0].text.as_deref(), Some("x"));
        assert_eq!(verses[1].text, None);
        assert_eq!(verses[2].text, None);
    }
}
