//! Error types for the ingestion pipeline.
//!
//! Errors scoped to a single translation or local book are caught by the
//! ingestion engine and recorded in the run summary. Only setup failures
//! (the top-level translation listing, opening the store) reach `main`.

use std::path::PathBuf;
use thiserror::Error;

use crate::ingest::ImportState;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A single failed attempt against the remote source.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection, timeout, or body read failure.
    #[error(transparent)]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Body was received but is not the expected JSON shape.
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TransportError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Rate limiting and server errors are transient, other 4xx statuses
    /// are not. A decode failure is retried since large payloads are
    /// occasionally truncated mid-transfer.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Request(e) => !e.is_builder(),
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Decode { .. } => true,
        }
    }

    /// HTTP status, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Request(e) => e.status().map(|s| s.as_u16()),
            TransportError::Decode { .. } => None,
        }
    }
}

/// Errors produced by the source adapter, schema manager, and ingestion engine.
#[derive(Error, Debug)]
pub enum Error {
    /// The retry budget for a network call was exhausted.
    #[error("network error fetching {what} after {attempts} attempt(s): {source}")]
    Network {
        what: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// The remote source confirmed it has no data for a translation code.
    #[error("no data available for translation {code}")]
    NotFound { code: String },

    /// Downloading the verse payload for a translation failed.
    #[error("could not fetch verses for {code}: {source}")]
    Fetch {
        code: String,
        #[source]
        source: Box<Error>,
    },

    /// A local annotated file could not be parsed.
    #[error("cannot parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// The testament constraint rewrite left the books table inconsistent.
    #[error("constraint violation on {table}: {detail}")]
    ConstraintViolation { table: String, detail: String },

    /// A translation stopped short of being committed.
    #[error("import of {code} failed at {state}: {source}")]
    PartialImport {
        code: String,
        state: ImportState,
        #[source]
        source: Box<Error>,
    },

    /// A command that needs an existing store was pointed at a missing file.
    #[error("no store at {}; run `scripture init` or `scripture import` first", path.display())]
    StoreMissing { path: PathBuf },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a verse download failure for `code`.
    pub fn fetch(code: &str, source: Error) -> Self {
        Error::Fetch {
            code: code.to_string(),
            source: Box::new(source),
        }
    }

    /// Record that `code` stopped at `state` because of `source`.
    pub fn partial(code: &str, state: ImportState, source: Error) -> Self {
        Error::PartialImport {
            code: code.to_string(),
            state,
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transience() {
        let status = |status| TransportError::Status {
            url: "http://x".into(),
            status,
        };
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(400).is_transient());
    }

    #[test]
    fn partial_import_message_names_state() {
        let err = Error::partial(
            "XYZ",
            ImportState::BooksLoaded,
            Error::NotFound { code: "XYZ".into() },
        );
        let msg = err.to_string();
        assert!(msg.contains("XYZ"));
        assert!(msg.contains("BOOKS_LOADED"));
    }
}
