//! Import progress reporting.
//!
//! Reports per-translation progress during `scripture import` so users see
//! which translation is in flight and how far along the run is. Progress is
//! emitted on **stderr** so stdout stays parseable for scripts.

use std::io::Write;

/// A single progress event for an import run.
#[derive(Clone, Debug)]
pub enum ImportProgressEvent {
    /// Translation `n` of `total` is starting.
    Starting { code: String, n: u64, total: u64 },
    /// Translation and book rows are committed.
    BooksLoaded { code: String, books: u64 },
    /// The verse payload arrived.
    VersesLoaded { code: String, verses: u64 },
    /// Verses are committed.
    Committed {
        code: String,
        verses: u64,
        synthesized: u64,
    },
    /// The translation stopped short of being committed.
    Failed { code: String, reason: String },
}

/// Reports import progress. Implementations write to stderr (human or JSON).
pub trait ImportProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the ingestion engine.
    fn report(&self, event: ImportProgressEvent);
}

/// Human-friendly progress on stderr: "[3/12] KJV  committed  31,102 verses".
pub struct StderrProgress;

impl ImportProgressReporter for StderrProgress {
    fn report(&self, event: ImportProgressEvent) {
        let line = match &event {
            ImportProgressEvent::Starting { code, n, total } => {
                format!("[{}/{}] {}  starting\n", n, total, code)
            }
            ImportProgressEvent::BooksLoaded { code, books } => {
                format!("  {}  {} books\n", code, format_number(*books))
            }
            ImportProgressEvent::VersesLoaded { code, verses } => {
                format!("  {}  downloaded {} verses\n", code, format_number(*verses))
            }
            ImportProgressEvent::Committed {
                code,
                verses,
                synthesized,
            } => {
                if *synthesized > 0 {
                    format!(
                        "  {}  committed  {} verses ({} books auto-created)\n",
                        code,
                        format_number(*verses),
                        synthesized
                    )
                } else {
                    format!("  {}  committed  {} verses\n", code, format_number(*verses))
                }
            }
            ImportProgressEvent::Failed { code, reason } => {
                format!("  {}  SKIPPED: {}\n", code, reason)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ImportProgressReporter for JsonProgress {
    fn report(&self, event: ImportProgressEvent) {
        let obj = match &event {
            ImportProgressEvent::Starting { code, n, total } => serde_json::json!({
                "event": "progress",
                "translation": code,
                "phase": "starting",
                "n": n,
                "total": total
            }),
            ImportProgressEvent::BooksLoaded { code, books } => serde_json::json!({
                "event": "progress",
                "translation": code,
                "phase": "books_loaded",
                "books": books
            }),
            ImportProgressEvent::VersesLoaded { code, verses } => serde_json::json!({
                "event": "progress",
                "translation": code,
                "phase": "verses_loaded",
                "verses": verses
            }),
            ImportProgressEvent::Committed {
                code,
                verses,
                synthesized,
            } => serde_json::json!({
                "event": "progress",
                "translation": code,
                "phase": "committed",
                "verses": verses,
                "synthesized_books": synthesized
            }),
            ImportProgressEvent::Failed { code, reason } => serde_json::json!({
                "event": "progress",
                "translation": code,
                "phase": "failed",
                "reason": reason
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ImportProgressReporter for NoProgress {
    fn report(&self, _event: ImportProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn ImportProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(31_102), "31,102");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
