//! Verse text normalization shared by the remote and local import paths.
//!
//! Remote verse text carries HTML: Strong's numbers (`<S>1234</S>`),
//! footnotes (`<sup>...</sup>`), line breaks and inline styling. Local
//! annotated files instead carry editorial bracket glyphs (`⌈ ⌉`) and
//! critical-apparatus marks (`⸀ ⸁ ...`) and arbitrary line wrapping.

use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;

static STRONGS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<S>\d+</S>").unwrap());
static BREAK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static FOOTNOTE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<sup>.*?</sup>").unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static SPACES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Editorial glyphs dropped from annotated text.
const EDITORIAL_GLYPHS: &[char] = &[
    '⌈', '⌉', '⸀', '⸁', '⸂', '⸃', '⸄', '⸅', '⸆', '⸇', '⸈', '⸉',
];

/// Reduce remote verse markup to plain text.
///
/// Line breaks survive as `\n`; runs of spaces collapse to one. `None` and
/// markup-only input both yield an empty string.
pub fn strip_markup(raw: Option<&str>) -> String {
    let text = match raw {
        Some(t) if !t.is_empty() => t,
        _ => return String::new(),
    };

    let text = STRONGS_RE.replace_all(text, "");
    let text = BREAK_RE.replace_all(&text, "\n");
    let text = FOOTNOTE_RE.replace_all(&text, "");
    let text = TAG_RE.replace_all(&text, "");
    let text = decode_html_entities(&text);
    let text = SPACES_RE.replace_all(&text, " ");
    text.trim().to_string()
}

/// Clean a fragment of a locally annotated file.
///
/// Removes editorial glyphs and collapses every whitespace run, newlines
/// included, to a single space.
pub fn clean_annotation(raw: &str) -> String {
    let without_glyphs: String = raw.chars().filter(|c| !EDITORIAL_GLYPHS.contains(c)).collect();
    WHITESPACE_RE
        .replace_all(&without_glyphs, " ")
        .trim()
        .to_string()
}
