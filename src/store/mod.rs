//! The persistence layer (spec §4.5): a pooled SQLite database holding the
//! `Text`/`TextNGram`/`TextHasNGram` tables, with parallel ingestion and a
//! query engine producing canonical result rows.
//!
//! Grounded on the teacher's `Database` (connection pooling, WAL pragmas,
//! schema setup on open) generalised from a single `items` table to the
//! three-table n-gram schema this spec needs.

mod ingest;
mod query;
mod schema;

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use thiserror::Error;

pub use query::{write_counts_rows, CountsRow, COUNTS_FIELDS};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error(transparent)]
    Corpus(#[from] crate::corpus::CorpusError),
    #[error(transparent)]
    Catalogue(#[from] crate::catalogue::CatalogueError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("n-gram size range [{min}, {max}] is invalid: size must be at least 1 and max must be >= min")]
    BadSizeRange { min: usize, max: usize },
    #[error("corpus does not match DataStore contents for witness {work}/{siglum}")]
    CorpusValidation { work: String, siglum: String },
}

/// A pooled handle to the n-gram database.
pub struct DataStore {
    pool: Pool<SqliteConnectionManager>,
}

impl DataStore {
    /// Opens (creating if absent) the database file at `path`, setting up
    /// the schema if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA foreign_keys=ON;",
            )?;
            Ok(())
        });
        let pool = Pool::builder().max_size(8).build(manager)?;
        let store = Self { pool };
        store.setup_schema()?;
        Ok(store)
    }

    /// Opens a private in-memory database, for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys=ON;")?;
            Ok(())
        });
        let pool = Pool::builder().max_size(1).build(manager)?;
        let store = Self { pool };
        store.setup_schema()?;
        Ok(store)
    }

    fn setup_schema(&self) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(schema::CREATE_TEXT_SQL, [])?;
        conn.execute(schema::CREATE_TEXTNGRAM_SQL, [])?;
        conn.execute(schema::CREATE_TEXTHASNGRAM_SQL, [])?;
        conn.execute(schema::CREATE_INDEX_TEXTNGRAM_NGRAM_SQL, [])?;
        conn.execute(schema::CREATE_INDEX_TEXTNGRAM_TEXT_SQL, [])?;
        Ok(())
    }

    /// Drops the `TextNGram` indices, for fast bulk insertion, and hands
    /// back a guard that recreates them (and runs `ANALYZE`) on drop.
    fn drop_indices_for_bulk_insert(&self) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(schema::DROP_INDEX_TEXTNGRAM_NGRAM_SQL, [])?;
        conn.execute(schema::DROP_INDEX_TEXTNGRAM_TEXT_SQL, [])?;
        Ok(())
    }

    fn restore_indices_after_bulk_insert(&self) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(schema::CREATE_INDEX_TEXTNGRAM_NGRAM_SQL, [])?;
        conn.execute(schema::CREATE_INDEX_TEXTNGRAM_TEXT_SQL, [])?;
        conn.execute(schema::ANALYSE_SQL, [])?;
        Ok(())
    }
}
