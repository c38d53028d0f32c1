//! The query engine (spec §4.6): turns a catalogue's label assignment and
//! an operator (diff / diff_asymmetric / intersection / counts / search)
//! into canonical result rows.
//!
//! Labels are never stored in the database (spec §9 open question 2): each
//! query builds a `work -> label` view from the `Catalogue` argument it is
//! given, assigns it to the raw per-witness counts pulled from SQLite, and
//! discards it once the rows are produced.

use std::collections::{HashMap, HashSet};
use std::io;

use crate::catalogue::Catalogue;
use crate::corpus::Corpus;
use crate::results::ResultRow;
use crate::tokenizer::Tokenizer;

use super::{DataStore, StoreError};

/// One row of the Counts schema (spec §4.5 item 3): unlike every other
/// query, `counts` reports per-witness/per-size aggregates rather than
/// per-n-gram occurrence rows, so it does not fit `ResultRow`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountsRow {
    pub work: String,
    pub siglum: String,
    pub label: String,
    pub size: u32,
    pub unique_ngrams: u32,
    pub total_ngrams: u32,
    pub token_count: u32,
}

pub const COUNTS_FIELDS: [&str; 7] =
    ["work", "siglum", "label", "size", "unique_ngrams", "total_ngrams", "token_count"];

/// Writes `rows` as a Counts-schema CSV (spec §4.5 item 3).
pub fn write_counts_rows(writer: impl io::Write, rows: &[CountsRow]) -> Result<(), StoreError> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    csv_writer.write_record(COUNTS_FIELDS)?;
    for row in rows {
        csv_writer.write_record([
            row.work.as_str(),
            row.siglum.as_str(),
            row.label.as_str(),
            &row.size.to_string(),
            &row.unique_ngrams.to_string(),
            &row.total_ngrams.to_string(),
            &row.token_count.to_string(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

impl DataStore {
    /// Every `(work, siglum, ngram, size, count)` row for witnesses whose
    /// work is in `catalogue`, labelled via the catalogue's `work -> label`
    /// mapping. Count-0 rows are never produced here — `Results::zero_fill`
    /// is what materialises explicit absence (spec I3).
    fn labelled_rows(&self, catalogue: &Catalogue) -> Result<Vec<ResultRow>, StoreError> {
        let conn = self.pool.get()?;
        let mut rows = Vec::new();
        for work in catalogue.works() {
            let label = catalogue.label_for(work).expect("work came from catalogue.works()").to_string();
            let mut stmt = conn.prepare(super::schema::SELECT_TEXT_NGRAM_COUNTS_SQL)?;
            let mut query_rows = stmt.query(rusqlite::params![work])?;
            while let Some(row) = query_rows.next()? {
                let work: String = row.get(0)?;
                let siglum: String = row.get(1)?;
                let ngram: String = row.get(2)?;
                let size: i64 = row.get(3)?;
                let count: i64 = row.get(4)?;
                rows.push(ResultRow {
                    ngram,
                    size: size as u32,
                    work,
                    siglum,
                    count: count as u32,
                    label: label.clone(),
                });
            }
        }
        Ok(rows)
    }

    /// Per-witness, per-size aggregates for `catalogue`'s works (spec §4.6
    /// `counts`) — the one query with its own CSV schema rather than the
    /// canonical result row shape.
    pub fn counts(&self, corpus: &Corpus, catalogue: &Catalogue) -> Result<Vec<CountsRow>, StoreError> {
        self.ensure_corpus_matches(corpus, catalogue)?;
        let conn = self.pool.get()?;
        let mut rows = Vec::new();
        for work in catalogue.works() {
            let label = catalogue.label_for(work).expect("work came from catalogue.works()").to_string();
            let mut stmt = conn.prepare(super::schema::SELECT_COUNTS_SQL)?;
            let mut query_rows = stmt.query(rusqlite::params![work])?;
            while let Some(row) = query_rows.next()? {
                let work: String = row.get(0)?;
                let siglum: String = row.get(1)?;
                let size: i64 = row.get(2)?;
                let unique_ngrams: i64 = row.get(3)?;
                let total_ngrams: i64 = row.get(4)?;
                let token_count: i64 = row.get(5)?;
                rows.push(CountsRow {
                    work,
                    siglum,
                    label: label.clone(),
                    size: size as u32,
                    unique_ngrams: unique_ngrams as u32,
                    total_ngrams: total_ngrams as u32,
                    token_count: token_count as u32,
                });
            }
        }
        Ok(rows)
    }

    /// Rows for n-grams occurring under exactly one label in `catalogue`
    /// (spec §4.6 `diff`).
    pub fn diff(&self, corpus: &Corpus, catalogue: &Catalogue) -> Result<Vec<ResultRow>, StoreError> {
        self.ensure_corpus_matches(corpus, catalogue)?;
        let rows = self.labelled_rows(catalogue)?;
        let labels_by_ngram = labels_per_ngram(&rows);
        Ok(rows
            .into_iter()
            .filter(|row| labels_by_ngram[&(row.ngram.clone(), row.size)].len() == 1)
            .collect())
    }

    /// Rows, restricted to `prime_label`'s witnesses, for n-grams that do
    /// not occur under any other label in `catalogue` (spec §4.6
    /// `diff_asymmetric`).
    pub fn diff_asymmetric(
        &self,
        corpus: &Corpus,
        catalogue: &Catalogue,
        prime_label: &str,
    ) -> Result<Vec<ResultRow>, StoreError> {
        self.ensure_corpus_matches(corpus, catalogue)?;
        let rows = self.labelled_rows(catalogue)?;
        let labels_by_ngram = labels_per_ngram(&rows);
        Ok(rows
            .into_iter()
            .filter(|row| row.label == prime_label)
            .filter(|row| {
                let labels = &labels_by_ngram[&(row.ngram.clone(), row.size)];
                labels.len() == 1 && labels.contains(prime_label)
            })
            .collect())
    }

    /// Rows for n-grams occurring under every label in `catalogue` (spec
    /// §4.6 `intersection`).
    pub fn intersection(&self, corpus: &Corpus, catalogue: &Catalogue) -> Result<Vec<ResultRow>, StoreError> {
        self.ensure_corpus_matches(corpus, catalogue)?;
        let rows = self.labelled_rows(catalogue)?;
        let all_labels: HashSet<String> = catalogue.ordered_labels().into_iter().collect();
        let labels_by_ngram = labels_per_ngram(&rows);
        Ok(rows
            .into_iter()
            .filter(|row| labels_by_ngram[&(row.ngram.clone(), row.size)] == all_labels)
            .collect())
    }

    /// For each n-gram in `ngrams` and each witness in `catalogue`, emits a
    /// row — with count 0 when that witness has no occurrence of it (spec
    /// §4.5 item 3 `search`). `size` for an absent n-gram is derived by
    /// tokenizing the n-gram string itself.
    pub fn search(
        &self,
        corpus: &Corpus,
        catalogue: &Catalogue,
        tokenizer: &Tokenizer,
        ngrams: &HashSet<String>,
    ) -> Result<Vec<ResultRow>, StoreError> {
        self.ensure_corpus_matches(corpus, catalogue)?;
        let found = self.labelled_rows(catalogue)?;
        let found: Vec<ResultRow> = found.into_iter().filter(|row| ngrams.contains(&row.ngram)).collect();

        let mut present: HashSet<(String, u32, String, String)> = HashSet::new();
        for row in &found {
            present.insert((row.ngram.clone(), row.size, row.work.clone(), row.siglum.clone()));
        }

        let witnesses = corpus.get_texts()?;
        let mut rows = found;
        let mut ngrams: Vec<&String> = ngrams.iter().collect();
        ngrams.sort();
        for ngram in ngrams {
            let size = tokenizer.tokenize(ngram).len() as u32;
            for witness in &witnesses {
                let Some(label) = catalogue.label_for(&witness.work) else { continue };
                let key = (ngram.clone(), size, witness.work.clone(), witness.siglum.clone());
                if present.contains(&key) {
                    continue;
                }
                rows.push(ResultRow {
                    ngram: ngram.clone(),
                    size,
                    work: witness.work.clone(),
                    siglum: witness.siglum.clone(),
                    count: 0,
                    label: label.to_string(),
                });
            }
        }
        Ok(rows)
    }

    /// Like `diff`, but folds `supplied`'s rows in as additional witnesses
    /// carrying the labels named in `labels`, so the single-label test runs
    /// against the effective label list = catalogue labels ∪ `labels`
    /// (spec §4.6 `diff_supplied`, the `sdiff` subcommand). Only rows drawn
    /// from the corpus are returned — `supplied` is context, not output.
    pub fn diff_supplied(
        &self,
        corpus: &Corpus,
        catalogue: &Catalogue,
        supplied: &[ResultRow],
        labels: &[String],
    ) -> Result<Vec<ResultRow>, StoreError> {
        self.ensure_corpus_matches(corpus, catalogue)?;
        let catalogue_rows = self.labelled_rows(catalogue)?;
        let effective_labels = effective_labels(catalogue, labels);
        let mut combined = catalogue_rows.clone();
        combined.extend(supplied.iter().cloned());
        let labels_by_ngram = labels_per_ngram(&combined);
        Ok(catalogue_rows
            .into_iter()
            .filter(|row| {
                let row_labels = &labels_by_ngram[&(row.ngram.clone(), row.size)];
                row_labels.intersection(&effective_labels).count() == 1
            })
            .collect())
    }

    /// Like `intersection`, but folds `supplied`'s rows in as additional
    /// witnesses carrying the labels named in `labels`, so the
    /// every-label test runs against the effective label list = catalogue
    /// labels ∪ `labels` (spec §4.6 `intersection_supplied`, the
    /// `sintersect` subcommand). Only rows drawn from the corpus are
    /// returned — `supplied` is context, not output.
    pub fn intersection_supplied(
        &self,
        corpus: &Corpus,
        catalogue: &Catalogue,
        supplied: &[ResultRow],
        labels: &[String],
    ) -> Result<Vec<ResultRow>, StoreError> {
        self.ensure_corpus_matches(corpus, catalogue)?;
        let catalogue_rows = self.labelled_rows(catalogue)?;
        let effective_labels = effective_labels(catalogue, labels);
        let mut combined = catalogue_rows.clone();
        combined.extend(supplied.iter().cloned());
        let labels_by_ngram = labels_per_ngram(&combined);
        Ok(catalogue_rows
            .into_iter()
            .filter(|row| labels_by_ngram[&(row.ngram.clone(), row.size)].is_superset(&effective_labels))
            .collect())
    }
}

/// Catalogue labels unioned with the explicit `labels` a supplied results
/// set is tagged with (spec §4.6: "effective label list = catalogue labels
/// ∪ supplied labels").
fn effective_labels(catalogue: &Catalogue, labels: &[String]) -> HashSet<String> {
    catalogue.ordered_labels().into_iter().chain(labels.iter().cloned()).collect()
}

fn labels_per_ngram(rows: &[ResultRow]) -> HashMap<(String, u32), HashSet<String>> {
    let mut labels: HashMap<(String, u32), HashSet<String>> = HashMap::new();
    for row in rows {
        labels.entry((row.ngram.clone(), row.size)).or_default().insert(row.label.clone());
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;
    use crate::tokenizer::Tokenizer;
    use std::fs;

    fn write_witness(dir: &std::path::Path, work: &str, siglum: &str, content: &str) {
        let work_dir = dir.join(work);
        fs::create_dir_all(&work_dir).unwrap();
        fs::write(work_dir.join(format!("{siglum}.txt")), content).unwrap();
    }

    fn setup() -> (tempfile::TempDir, Corpus, DataStore) {
        let dir = tempfile::tempdir().unwrap();
        write_witness(dir.path(), "t1", "base", "ABC");
        write_witness(dir.path(), "t2", "base", "ABD");
        let corpus = Corpus::new(dir.path());
        let store = DataStore::open_in_memory().unwrap();
        store.add_ngrams(&corpus, &Tokenizer::cbeta(), 1, 2, None).unwrap();
        (dir, corpus, store)
    }

    fn catalogue() -> Catalogue {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.txt");
        fs::write(&path, "t1 L1\nt2 L2\n").unwrap();
        Catalogue::load(&path).unwrap()
    }

    #[test]
    fn diff_keeps_only_single_label_ngrams() {
        let (_dir, corpus, store) = setup();
        let rows = store.diff(&corpus, &catalogue()).unwrap();
        assert!(rows.iter().all(|r| r.ngram != "AB"));
        assert!(rows.iter().any(|r| r.ngram == "BC" && r.label == "L1"));
        assert!(rows.iter().any(|r| r.ngram == "BD" && r.label == "L2"));
    }

    #[test]
    fn intersection_keeps_shared_ngrams() {
        let (_dir, corpus, store) = setup();
        let rows = store.intersection(&corpus, &catalogue()).unwrap();
        assert!(rows.iter().all(|r| r.ngram == "AB" || r.ngram == "A" || r.ngram == "B"));
        assert!(rows.iter().any(|r| r.ngram == "AB"));
    }

    #[test]
    fn search_restricts_to_given_ngrams() {
        let (_dir, corpus, store) = setup();
        let mut ngrams = HashSet::new();
        ngrams.insert("AB".to_string());
        let rows = store.search(&corpus, &catalogue(), &Tokenizer::cbeta(), &ngrams).unwrap();
        assert!(rows.iter().all(|r| r.ngram == "AB"));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn search_emits_zero_row_for_absent_ngram() {
        let (_dir, corpus, store) = setup();
        let mut ngrams = HashSet::new();
        ngrams.insert("XY".to_string());
        let rows = store.search(&corpus, &catalogue(), &Tokenizer::cbeta(), &ngrams).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.ngram == "XY" && r.size == 2 && r.count == 0));
    }

    #[test]
    fn diff_errors_when_corpus_drifts_from_store() {
        let (dir, corpus, store) = setup();
        write_witness(dir.path(), "t1", "base", "CHANGED");
        assert!(matches!(
            store.diff(&corpus, &catalogue()),
            Err(StoreError::CorpusValidation { .. })
        ));
    }

    #[test]
    fn counts_reports_per_witness_aggregates() {
        let (_dir, corpus, store) = setup();
        let rows = store.counts(&corpus, &catalogue()).unwrap();
        let t1_size1 = rows
            .iter()
            .find(|r| r.work == "t1" && r.size == 1)
            .expect("t1 size-1 counts row");
        // "ABC" has 3 distinct unigrams (A, B, C), 3 occurrences total.
        assert_eq!(t1_size1.unique_ngrams, 3);
        assert_eq!(t1_size1.total_ngrams, 3);
        assert_eq!(t1_size1.token_count, 3);
        assert_eq!(t1_size1.label, "L1");
    }
}
