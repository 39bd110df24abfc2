//! Reconcile reference book metadata against actual verse data.
//!
//! Remote book lists are sometimes incomplete: a verse payload can reference
//! books the metadata never mentions. Rather than drop those verses, a
//! minimal book is synthesized for each missing id so every verse has a
//! parent row.

use std::collections::{BTreeMap, HashSet};

use crate::models::{Book, Testament};
use crate::source::RemoteVerse;

/// Reference books merged with synthesized ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Reference books first, then synthesized books by ascending id.
    pub books: Vec<Book>,
    /// Ids of the synthesized books, ascending.
    pub synthesized: Vec<i64>,
}

impl Reconciled {
    /// The synthesized books only.
    pub fn synthesized_books(&self) -> impl Iterator<Item = &Book> {
        self.books
            .iter()
            .filter(move |b| self.synthesized.contains(&b.book_id))
    }
}

/// Placeholder name for a book known only from verse data.
pub fn placeholder_name(book_id: i64) -> String {
    format!("Book {}", book_id)
}

/// Synthesize a book for every id in `verses` that `reference` lacks.
///
/// A synthesized book takes the highest chapter seen for its id as its
/// chapter count, its id as chronological rank, and the default testament
/// for its id range.
pub fn reconcile(translation: &str, reference: &[Book], verses: &[RemoteVerse]) -> Reconciled {
    let known: HashSet<i64> = reference.iter().map(|b| b.book_id).collect();

    let mut max_chapter: BTreeMap<i64, i64> = BTreeMap::new();
    for v in verses.iter().filter(|v| !known.contains(&v.book)) {
        let entry = max_chapter.entry(v.book).or_insert(v.chapter);
        if v.chapter > *entry {
            *entry = v.chapter;
        }
    }

    let mut books = reference.to_vec();
    let mut synthesized = Vec::with_capacity(max_chapter.len());
    for (book_id, chapters) in max_chapter {
        books.push(Book {
            translation: translation.to_string(),
            book_id,
            name: placeholder_name(book_id),
            chapters,
            chron_order: book_id,
            testament: Testament::from_book_id(book_id),
        });
        synthesized.push(book_id);
    }

    Reconciled { books, synthesized }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: i64) -> Book {
        Book {
            translation: "KJV".into(),
            book_id: id,
            name: format!("Real {}", id),
            chapters: 10,
            chron_order: id,
            testament: Testament::from_book_id(id),
        }
    }

    fn verse(book: i64, chapter: i64, verse: i64) -> RemoteVerse {
        RemoteVerse {
            book,
            chapter,
            verse,
            text: Some("x".into()),
        }
    }

    #[test]
    fn nothing_missing() {
        let result = reconcile("KJV", &[book(1)], &[verse(1, 1, 1), verse(1, 2, 1)]);
        assert!(result.synthesized.is_empty());
        assert_eq!(result.books, vec![book(1)]);
    }

    #[test]
    fn synthesizes_missing_book_with_max_chapter() {
        let verses = vec![
            verse(1, 1, 1),
            verse(77, 2, 1),
            verse(77, 5, 3),
            verse(77, 4, 9),
        ];
        let result = reconcile("KJV", &[book(1)], &verses);

        assert_eq!(result.synthesized, vec![77]);
        let synthetic = result.synthesized_books().next().unwrap();
        assert_eq!(synthetic.name, "Book 77");
        assert_eq!(synthetic.chapters, 5);
        assert_eq!(synthetic.chron_order, 77);
        assert_eq!(synthetic.testament, Testament::Deuterocanonical);
        assert_eq!(synthetic.translation, "KJV");
    }

    #[test]
    fn synthesized_ids_ascending_after_reference() {
        let verses = vec![verse(95, 1, 1), verse(2, 1, 1), verse(41, 3, 1)];
        let result = reconcile("X", &[book(1)], &verses);
        assert_eq!(result.synthesized, vec![2, 41, 95]);
        let ids: Vec<i64> = result.books.iter().map(|b| b.book_id).collect();
        assert_eq!(ids, vec![1, 2, 41, 95]);
        assert_eq!(result.books[3].testament, Testament::NonCanonical);
    }

    #[test]
    fn no_reference_books_at_all() {
        let result = reconcile("X", &[], &[verse(40, 28, 20)]);
        assert_eq!(result.synthesized, vec![40]);
        assert_eq!(result.books[0].testament, Testament::New);
        assert_eq!(result.books[0].chapters, 28);
    }
}
