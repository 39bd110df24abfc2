//! Canonical records stored in SQLite.
//!
//! Remote payloads and local files are both normalized into these types
//! before anything is written.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest book id in the Old Testament range.
pub const OT_MAX: i64 = 39;
/// Highest book id in the New Testament range.
pub const NT_MAX: i64 = 66;
/// Highest book id in the deuterocanonical range.
pub const DC_MAX: i64 = 89;

/// Testament category of a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Testament {
    #[serde(rename = "OT")]
    Old,
    #[serde(rename = "NT")]
    New,
    #[serde(rename = "DC")]
    Deuterocanonical,
    #[serde(rename = "NC")]
    NonCanonical,
}

impl Testament {
    /// All categories in canonical order.
    pub const ALL: [Testament; 4] = [
        Testament::Old,
        Testament::New,
        Testament::Deuterocanonical,
        Testament::NonCanonical,
    ];

    /// Default category for a book id: 1–39 OT, 40–66 NT, 67–89 DC, otherwise NC.
    pub fn from_book_id(book_id: i64) -> Self {
        match book_id {
            1..=OT_MAX => Testament::Old,
            40..=NT_MAX => Testament::New,
            67..=DC_MAX => Testament::Deuterocanonical,
            _ => Testament::NonCanonical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Testament::Old => "OT",
            Testament::New => "NT",
            Testament::Deuterocanonical => "DC",
            Testament::NonCanonical => "NC",
        }
    }
}

impl fmt::Display for Testament {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Testament {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OT" => Ok(Testament::Old),
            "NT" => Ok(Testament::New),
            "DC" => Ok(Testament::Deuterocanonical),
            "NC" => Ok(Testament::NonCanonical),
            other => Err(format!(
                "unknown testament category '{}'. Must be OT, NT, DC, or NC.",
                other
            )),
        }
    }
}

/// Reading direction of a translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    #[default]
    Ltr,
    Rtl,
}

impl TextDirection {
    /// Parse a remote `dir` value. Anything other than `rtl` reads left to right.
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("rtl") {
            TextDirection::Rtl
        } else {
            TextDirection::Ltr
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextDirection::Ltr => "ltr",
            TextDirection::Rtl => "rtl",
        }
    }
}

/// A translation, keyed by its short code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Translation {
    pub short_name: String,
    pub full_name: String,
    pub language: String,
    #[serde(default)]
    pub direction: TextDirection,
}

/// A book within one translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub translation: String,
    pub book_id: i64,
    pub name: String,
    pub chapters: i64,
    pub chron_order: i64,
    pub testament: Testament,
}

/// A verse with normalized, non-empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verse {
    pub translation: String,
    pub book_id: i64,
    pub chapter: i64,
    pub verse: i64,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testament_ranges() {
        for id in 1..=39 {
            assert_eq!(Testament::from_book_id(id), Testament::Old, "id {}", id);
        }
        for id in 40..=66 {
            assert_eq!(Testament::from_book_id(id), Testament::New, "id {}", id);
        }
        for id in 67..=89 {
            assert_eq!(
                Testament::from_book_id(id),
                Testament::Deuterocanonical,
                "id {}",
                id
            );
        }
        for id in [-1, 0, 90, 91, 150, 1000] {
            assert_eq!(Testament::from_book_id(id), Testament::NonCanonical, "id {}", id);
        }
    }

    #[test]
    fn testament_parse() {
        assert_eq!("nc".parse::<Testament>().unwrap(), Testament::NonCanonical);
        assert_eq!(" DC ".parse::<Testament>().unwrap(), Testament::Deuterocanonical);
        assert!("XX".parse::<Testament>().is_err());
    }

    #[test]
    fn direction_is_lenient() {
        assert_eq!(TextDirection::parse_lenient("RTL"), TextDirection::Rtl);
        assert_eq!(TextDirection::parse_lenient("ltr"), TextDirection::Ltr);
        assert_eq!(TextDirection::parse_lenient(""), TextDirection::Ltr);
    }
}
