//! Parallel n-gram generation (spec §4.5 `add_ngrams`) and checksum
//! validation (`validate`). Tokenizing and counting each witness is
//! CPU-bound and independent, so it runs across a rayon thread pool; all
//! writes funnel through a single connection so SQLite never sees
//! concurrent writers.

use log::{debug, info};
use md5::{Digest, Md5};
use rayon::prelude::*;

use crate::catalogue::Catalogue;
use crate::corpus::Corpus;
use crate::ngram;
use crate::tokenizer::Tokenizer;

use super::{schema, DataStore, StoreError};

struct WitnessNGrams {
    work: String,
    siglum: String,
    checksum: String,
    token_count: usize,
    by_size: std::collections::BTreeMap<usize, ngram::NgramCounts>,
}

fn checksum_hex(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

impl DataStore {
    /// Generates and stores n-grams of every size in `[min_size, max_size]`
    /// for every witness in `corpus`, or, when `catalogue` is given, only
    /// for witnesses whose work it lists (spec §4.5 `add_ngrams`).
    /// Re-ingesting a witness whose checksum is unchanged only regenerates
    /// sizes it does not already have; content that has changed replaces
    /// all of that witness's n-grams.
    pub fn add_ngrams(
        &self,
        corpus: &Corpus,
        tokenizer: &Tokenizer,
        min_size: usize,
        max_size: usize,
        catalogue: Option<&Catalogue>,
    ) -> Result<(), StoreError> {
        if min_size < 1 || max_size < min_size {
            return Err(StoreError::BadSizeRange { min: min_size, max: max_size });
        }
        let mut witnesses = corpus.get_texts()?;
        if let Some(catalogue) = catalogue {
            witnesses.retain(|witness| catalogue.label_for(&witness.work).is_some());
        }

        let generated: Vec<Result<WitnessNGrams, StoreError>> = witnesses
            .par_iter()
            .map(|witness| {
                info!(
                    "generating size {}-{} n-grams for {}/{}",
                    min_size, max_size, witness.work, witness.siglum
                );
                let bytes = witness.bytes()?;
                let checksum = checksum_hex(&bytes);
                let content = witness.content()?;
                let tokens = tokenizer.tokenize(&content);
                let by_size = ngram::generate(tokenizer, &tokens, min_size, max_size);
                Ok(WitnessNGrams {
                    work: witness.work.clone(),
                    siglum: witness.siglum.clone(),
                    checksum,
                    token_count: tokens.len(),
                    by_size,
                })
            })
            .collect();

        self.drop_indices_for_bulk_insert()?;
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        for result in generated {
            let witness = result?;
            let existing: Option<(i64, String)> = tx
                .query_row(schema::SELECT_TEXT_SQL, rusqlite::params![witness.work, witness.siglum], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .ok();

            let (text_id, sizes_to_generate): (i64, Vec<usize>) = match existing {
                None => {
                    tx.execute(
                        schema::INSERT_TEXT_SQL,
                        rusqlite::params![witness.work, witness.siglum, witness.checksum, witness.token_count as i64],
                    )?;
                    (tx.last_insert_rowid(), witness.by_size.keys().copied().collect())
                }
                Some((text_id, existing_checksum)) if existing_checksum == witness.checksum => {
                    let mut sizes = Vec::new();
                    for &size in witness.by_size.keys() {
                        let has: Option<i64> = tx
                            .query_row(schema::SELECT_HAS_NGRAMS_SQL, rusqlite::params![text_id, size as i64], |row| row.get(0))
                            .ok();
                        if has.is_none() {
                            sizes.push(size);
                        } else {
                            debug!(
                                "{}/{} already has size-{} n-grams, skipping",
                                witness.work, witness.siglum, size
                            );
                        }
                    }
                    (text_id, sizes)
                }
                Some((text_id, _)) => {
                    tx.execute(schema::DELETE_TEXT_NGRAMS_SQL, rusqlite::params![text_id])?;
                    tx.execute(schema::DELETE_TEXT_HAS_NGRAMS_SQL, rusqlite::params![text_id])?;
                    tx.execute(
                        schema::UPDATE_TEXT_SQL,
                        rusqlite::params![witness.checksum, witness.token_count as i64, text_id],
                    )?;
                    (text_id, witness.by_size.keys().copied().collect())
                }
            };

            for size in sizes_to_generate {
                let counts = &witness.by_size[&size];
                info!(
                    "storing {} size-{} n-grams for {}/{}",
                    counts.len(),
                    size,
                    witness.work,
                    witness.siglum
                );
                tx.execute(
                    schema::INSERT_TEXT_HAS_NGRAM_SQL,
                    rusqlite::params![text_id, size as i64, counts.len() as i64],
                )?;
                for (ngram, count) in counts {
                    tx.execute(
                        schema::INSERT_NGRAM_SQL,
                        rusqlite::params![text_id, ngram, size as i64, *count as i64],
                    )?;
                }
            }
        }
        tx.commit()?;
        drop(conn);
        self.restore_indices_after_bulk_insert()?;
        Ok(())
    }

    /// Returns `true` iff every witness on disk belonging to a work in
    /// `catalogue` matches the checksum recorded for it (spec §4.5
    /// `validate(corpus, catalogue)`, restricted to `catalogue.works()`).
    pub fn validate(&self, corpus: &Corpus, catalogue: &Catalogue) -> Result<bool, StoreError> {
        Ok(self.first_mismatched_witness(corpus, catalogue)?.is_none())
    }

    /// Queries call this before running so that a stale corpus raises
    /// `CorpusValidation` instead of silently returning wrong rows (spec §4.5
    /// error conditions: "queries must not be run until resolved").
    pub(super) fn ensure_corpus_matches(&self, corpus: &Corpus, catalogue: &Catalogue) -> Result<(), StoreError> {
        if let Some((work, siglum)) = self.first_mismatched_witness(corpus, catalogue)? {
            return Err(StoreError::CorpusValidation { work, siglum });
        }
        Ok(())
    }

    /// Mirrors `labelled_rows`'s own iteration pattern: only witnesses whose
    /// work is in `catalogue` are in scope, so a corpus directory holding
    /// witnesses the catalogue has deliberately dropped (an empty-label
    /// removal, `Catalogue::load`) never spuriously fails validation.
    fn first_mismatched_witness(&self, corpus: &Corpus, catalogue: &Catalogue) -> Result<Option<(String, String)>, StoreError> {
        let conn = self.pool.get()?;
        let witnesses = corpus.get_texts()?;
        for witness in witnesses.iter().filter(|witness| catalogue.label_for(&witness.work).is_some()) {
            let bytes = witness.bytes()?;
            let checksum = checksum_hex(&bytes);
            let stored: Option<String> = conn
                .query_row(
                    "SELECT checksum FROM Text WHERE work = ?1 AND siglum = ?2",
                    rusqlite::params![witness.work, witness.siglum],
                    |row| row.get(0),
                )
                .ok();
            match stored {
                Some(stored_checksum) if stored_checksum == checksum => {}
                _ => return Ok(Some((witness.work.clone(), witness.siglum.clone()))),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_witness(dir: &std::path::Path, work: &str, siglum: &str, content: &str) {
        let work_dir = dir.join(work);
        fs::create_dir_all(&work_dir).unwrap();
        fs::write(work_dir.join(format!("{siglum}.txt")), content).unwrap();
    }

    fn catalogue(dir: &std::path::Path, entries: &[(&str, &str)]) -> Catalogue {
        let path = dir.join("catalogue.txt");
        let text: String = entries.iter().map(|(work, label)| format!("{work} {label}\n")).collect();
        fs::write(&path, text).unwrap();
        Catalogue::load(&path).unwrap()
    }

    #[test]
    fn add_ngrams_is_idempotent_for_unchanged_content() {
        let dir = tempfile::tempdir().unwrap();
        write_witness(dir.path(), "t1", "base", "ABABC");
        let corpus = Corpus::new(dir.path());
        let store = DataStore::open_in_memory().unwrap();
        let tokenizer = Tokenizer::cbeta();
        store.add_ngrams(&corpus, &tokenizer, 1, 2, None).unwrap();
        store.add_ngrams(&corpus, &tokenizer, 1, 2, None).unwrap();

        let conn = store.pool.get().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM TextNGram", [], |row| row.get(0)).unwrap();
        // 5 unigrams + 4 bigrams = 9 distinct-row insertions; re-ingesting
        // unchanged content must not duplicate them.
        assert_eq!(count, 9);
    }

    #[test]
    fn add_ngrams_restricts_to_catalogue_works() {
        let dir = tempfile::tempdir().unwrap();
        write_witness(dir.path(), "t1", "base", "ABABC");
        write_witness(dir.path(), "t2", "base", "XYZXY");
        let corpus = Corpus::new(dir.path());
        let store = DataStore::open_in_memory().unwrap();
        let tokenizer = Tokenizer::cbeta();
        let catalogue = catalogue(dir.path(), &[("t1", "L")]);
        store.add_ngrams(&corpus, &tokenizer, 1, 1, Some(&catalogue)).unwrap();

        let conn = store.pool.get().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM Text", [], |row| row.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn validate_detects_checksum_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        write_witness(dir.path(), "t1", "base", "ABABC");
        let corpus = Corpus::new(dir.path());
        let store = DataStore::open_in_memory().unwrap();
        let tokenizer = Tokenizer::cbeta();
        let catalogue = catalogue(dir.path(), &[("t1", "L")]);
        store.add_ngrams(&corpus, &tokenizer, 1, 2, None).unwrap();
        assert!(store.validate(&corpus, &catalogue).unwrap());

        write_witness(dir.path(), "t1", "base", "XYZXY");
        assert!(!store.validate(&corpus, &catalogue).unwrap());
    }

    #[test]
    fn validate_ignores_witnesses_outside_the_catalogue() {
        let dir = tempfile::tempdir().unwrap();
        write_witness(dir.path(), "t1", "base", "ABABC");
        let corpus = Corpus::new(dir.path());
        let store = DataStore::open_in_memory().unwrap();
        let tokenizer = Tokenizer::cbeta();
        store.add_ngrams(&corpus, &tokenizer, 1, 2, None).unwrap();

        write_witness(dir.path(), "t2", "base", "UNCHECKSUMMED");
        let catalogue = catalogue(dir.path(), &[("t1", "L")]);
        assert!(store.validate(&corpus, &catalogue).unwrap());
    }

    #[test]
    fn add_ngrams_replaces_rows_on_content_change() {
        let dir = tempfile::tempdir().unwrap();
        write_witness(dir.path(), "t1", "base", "AAAA");
        let corpus = Corpus::new(dir.path());
        let store = DataStore::open_in_memory().unwrap();
        let tokenizer = Tokenizer::cbeta();
        store.add_ngrams(&corpus, &tokenizer, 1, 1, None).unwrap();

        write_witness(dir.path(), "t1", "base", "BBBB");
        store.add_ngrams(&corpus, &tokenizer, 1, 1, None).unwrap();

        let conn = store.pool.get().unwrap();
        let ngram: String = conn
            .query_row("SELECT ngram FROM TextNGram", [], |row| row.get(0))
            .unwrap();
        assert_eq!(ngram, "B");
    }
}
