//! TOML configuration.
//!
//! Every section has defaults, so an absent config file is equivalent to an
//! empty one. The database path lives here and is passed explicitly to every
//! operation that touches the store.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::{Testament, TextDirection, Translation};
use crate::retry::RetryPolicy;

/// SQLite allows 32766 bound parameters per statement; a verse row binds five.
pub const MAX_BATCH_SIZE: usize = 6000;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub local: LocalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/bible.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_courtesy_delay_ms")]
    pub courtesy_delay_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            courtesy_delay_ms: default_courtesy_delay_ms(),
        }
    }
}

impl SourceConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(self.max_attempts, Duration::from_millis(self.backoff_base_ms))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn courtesy_delay(&self) -> Duration {
        Duration::from_millis(self.courtesy_delay_ms)
    }
}

fn default_base_url() -> String {
    "https://bolls.life".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    1000
}
fn default_courtesy_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImportConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    5000
}

/// Locally sourced books, imported under one synthetic translation.
#[derive(Debug, Deserialize, Clone)]
pub struct LocalConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_local_translation")]
    pub translation: Translation,
    #[serde(default = "default_local_books")]
    pub books: Vec<LocalBook>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            translation: default_local_translation(),
            books: default_local_books(),
        }
    }
}

/// One locally sourced book and the file it is parsed from.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LocalBook {
    pub book_id: i64,
    pub name: String,
    pub file: PathBuf,
    #[serde(default = "default_local_testament")]
    pub testament: Testament,
    #[serde(default)]
    pub chron_order: Option<i64>,
}

impl LocalBook {
    pub fn chron_order(&self) -> i64 {
        self.chron_order.unwrap_or(self.book_id)
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_local_testament() -> Testament {
    Testament::NonCanonical
}

fn default_local_translation() -> Translation {
    Translation {
        short_name: "ENC".to_string(),
        full_name: "R.H. Charles Translation (Non-Canonical)".to_string(),
        language: "English".to_string(),
        direction: TextDirection::Ltr,
    }
}

fn default_local_books() -> Vec<LocalBook> {
    let book = |book_id, name: &str, file: &str| LocalBook {
        book_id,
        name: name.to_string(),
        file: PathBuf::from(file),
        testament: Testament::NonCanonical,
        chron_order: Some(book_id),
    };
    vec![
        book(90, "1 Enoch", "1-enoch.txt"),
        book(91, "Jubilees", "jubilees.txt"),
        book(92, "Psalm 151", "psalm-151.txt"),
    ]
}

/// Load and validate a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.source.max_attempts == 0 {
        anyhow::bail!("source.max_attempts must be >= 1");
    }

    if config.source.timeout_secs == 0 {
        anyhow::bail!("source.timeout_secs must be > 0");
    }

    if !(1..=MAX_BATCH_SIZE).contains(&config.import.batch_size) {
        anyhow::bail!("import.batch_size must be in [1, {}]", MAX_BATCH_SIZE);
    }

    if config.local.translation.short_name.trim().is_empty() {
        anyhow::bail!("local.translation.short_name must not be empty");
    }

    let mut seen = std::collections::HashSet::new();
    for book in &config.local.books {
        if !seen.insert(book.book_id) {
            anyhow::bail!("local.books: duplicate book_id {}", book.book_id);
        }
    }

    Ok(())
}
