//! Parser for locally annotated book files.
//!
//! A file is UTF-8 text made of `[chapter:verse] text` segments. A segment
//! runs from the end of its marker to the start of the next marker (or end
//! of file). Some source texts split one verse across several markers;
//! repeated keys are merged in file order, joined by a single space.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::normalize::clean_annotation;

static MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(\d+):(\d+)\]").unwrap());

/// One verse recovered from an annotated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVerse {
    pub chapter: i64,
    pub verse: i64,
    pub text: String,
}

/// Ordered accumulation of fragments keyed by `(chapter, verse)`.
#[derive(Debug, Default)]
struct VerseAccumulator {
    verses: Vec<ParsedVerse>,
    index: HashMap<(i64, i64), usize>,
}

impl VerseAccumulator {
    fn push(&mut self, chapter: i64, verse: i64, fragment: String) {
        match self.index.get(&(chapter, verse)) {
            Some(&pos) => {
                let existing = &mut self.verses[pos].text;
                existing.push(' ');
                existing.push_str(&fragment);
            }
            None => {
                self.index.insert((chapter, verse), self.verses.len());
                self.verses.push(ParsedVerse {
                    chapter,
                    verse,
                    text: fragment,
                });
            }
        }
    }

    fn into_verses(self) -> Vec<ParsedVerse> {
        self.verses
    }
}

/// Parse annotated text already in memory.
///
/// Verses come back in order of first appearance. Fragments that are empty
/// after cleaning are ignored. A marker whose numbers do not fit in an
/// `i64` is reported as the `Err` string.
pub fn parse_annotated_text(text: &str) -> std::result::Result<Vec<ParsedVerse>, String> {
    let markers: Vec<_> = MARKER_RE.captures_iter(text).collect();
    let mut acc = VerseAccumulator::default();

    for (i, caps) in markers.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let chapter = parse_number(&caps[1], whole.as_str())?;
        let verse = parse_number(&caps[2], whole.as_str())?;

        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());

        let fragment = clean_annotation(&text[whole.end()..end]);
        if fragment.is_empty() {
            continue;
        }
        acc.push(chapter, verse, fragment);
    }

    Ok(acc.into_verses())
}

fn parse_number(digits: &str, marker: &str) -> std::result::Result<i64, String> {
    digits
        .parse::<i64>()
        .map_err(|_| format!("marker {} is out of range", marker))
}

/// Read and parse an annotated file.
///
/// Fails with [`Error::Parse`] when the file cannot be read as UTF-8, holds
/// an out-of-range marker, or yields no verses at all.
pub fn parse_annotated_file(path: &Path) -> Result<Vec<ParsedVerse>> {
    let parse_err = |reason: String| Error::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let text = std::fs::read_to_string(path).map_err(|e| parse_err(e.to_string()))?;
    let verses = parse_annotated_text(&text).map_err(parse_err)?;

    if verses.is_empty() {
        return Err(parse_err("no [chapter:verse] segments found".to_string()));
    }

    Ok(verses)
}
