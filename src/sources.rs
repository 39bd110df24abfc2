use std::collections::BTreeMap;

use crate::config::{Config, LocalBook};
use crate::models::{TextDirection, Translation};

/// Translations keyed by language, each list sorted by code.
pub fn group_by_language(translations: &[Translation]) -> BTreeMap<&str, Vec<&Translation>> {
    let mut groups: BTreeMap<&str, Vec<&Translation>> = BTreeMap::new();
    for t in translations {
        groups.entry(t.language.as_str()).or_default().push(t);
    }
    for list in groups.values_mut() {
        list.sort_by(|a, b| a.short_name.cmp(&b.short_name));
    }
    groups
}

pub fn print_translations(translations: &[Translation]) {
    println!("Available translations ({}):", translations.len());
    for (language, list) in group_by_language(translations) {
        println!();
        println!("  {}", language);
        for t in list {
            let rtl = if t.direction == TextDirection::Rtl {
                " (RTL)"
            } else {
                ""
            };
            println!("    {:<12} {}{}", t.short_name, t.full_name, rtl);
        }
    }
}

pub fn print_local_books(config: &Config, books: &[&LocalBook]) {
    let local = &config.local;
    println!(
        "Local translation {} ({}), data dir {}",
        local.translation.short_name,
        local.translation.full_name,
        local.data_dir.display()
    );
    println!();
    println!("{:<6} {:<28} {:<6} {:<8} FILE", "ID", "NAME", "TEST", "STATUS");
    for book in books {
        let path = local.data_dir.join(&book.file);
        let status = if path.exists() { "OK" } else { "MISSING" };
        println!(
            "{:<6} {:<28} {:<6} {:<8} {}",
            book.book_id,
            book.name,
            book.testament.as_str(),
            status,
            book.file.display()
        );
    }
}
