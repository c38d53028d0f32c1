//! The three format-changing transforms (spec §4.7): `group_by_ngram`,
//! `group_by_witness`, `collapse_witnesses`. Each consumes a `Results` and
//! produces a differently-shaped table, so — per SPEC_FULL.md §4.7 — at
//! most one of the three may be requested in a single `results` invocation.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use super::row::SIGLUM_JOINER;
use super::{Results, ResultsError};

/// One row of the n-gram-pivoted table: a distinct `(ngram, size)` plus,
/// per label (in the caller-supplied order), the distinct works it occurs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgramGroupRow {
    pub ngram: String,
    pub size: u32,
    pub label_works: IndexMap<String, Vec<String>>,
}

/// One row of the witness-pivoted table: a `(work, siglum, label)` triple
/// plus the sorted, distinct n-grams that witness contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessGroupRow {
    pub work: String,
    pub siglum: String,
    pub label: String,
    pub ngrams: Vec<String>,
}

/// Whichever shape a `results` pipeline ends in: the default row table, or
/// one of the two pivoted tables.
pub enum OutputTable {
    Rows(Results),
    NgramGroups(Vec<NgramGroupRow>),
    WitnessGroups(Vec<WitnessGroupRow>),
}

impl OutputTable {
    pub fn write_csv(&self, writer: impl std::io::Write) -> Result<(), ResultsError> {
        match self {
            OutputTable::Rows(results) => results.write_csv(writer),
            OutputTable::NgramGroups(rows) => write_ngram_groups(writer, rows),
            OutputTable::WitnessGroups(rows) => write_witness_groups(writer, rows),
        }
    }
}

/// Pivots rows so each distinct `(ngram, size)` becomes one row, with a
/// column per label (in `ordered_labels`) listing the distinct works the
/// n-gram occurs in under that label (spec §4.7 `group_by_ngram`).
pub fn group_by_ngram(results: Results, ordered_labels: &[String]) -> Vec<NgramGroupRow> {
    let mut groups: IndexMap<(String, u32), IndexMap<String, BTreeSet<String>>> = IndexMap::new();
    for row in results.into_rows() {
        if row.count == 0 {
            continue;
        }
        let label_works = groups.entry((row.ngram.clone(), row.size)).or_insert_with(IndexMap::new);
        label_works.entry(row.label.clone()).or_default().insert(row.work.clone());
    }

    groups
        .into_iter()
        .map(|((ngram, size), mut label_works)| {
            let mut ordered = IndexMap::new();
            for label in ordered_labels {
                let works = label_works.remove(label).unwrap_or_default();
                ordered.insert(label.clone(), works.into_iter().collect());
            }
            NgramGroupRow {
                ngram,
                size,
                label_works: ordered,
            }
        })
        .collect()
}

/// Pivots rows so each distinct `(work, siglum, label)` becomes one row,
/// listing the distinct n-grams contributed by that witness (spec §4.7
/// `group_by_witness`).
pub fn group_by_witness(results: Results) -> Vec<WitnessGroupRow> {
    let mut groups: IndexMap<(String, String, String), BTreeSet<String>> = IndexMap::new();
    for row in results.into_rows() {
        if row.count == 0 {
            continue;
        }
        groups
            .entry((row.work.clone(), row.siglum.clone(), row.label.clone()))
            .or_default()
            .insert(row.ngram.clone());
    }
    groups
        .into_iter()
        .map(|((work, siglum, label), ngrams)| WitnessGroupRow {
            work,
            siglum,
            label,
            ngrams: ngrams.into_iter().collect(),
        })
        .collect()
}

/// Merges rows sharing `(ngram, size, work, count, label)` into one row,
/// joining their sigla with [`SIGLUM_JOINER`] (spec §4.7 `collapse_witnesses`).
pub fn collapse_witnesses(results: Results) -> Results {
    let tokenizer = results.tokenizer.clone();
    let mut groups: IndexMap<(String, u32, String, u32, String), BTreeSet<String>> = IndexMap::new();
    for row in results.into_rows() {
        groups
            .entry((row.ngram, row.size, row.work, row.count, row.label))
            .or_default()
            .insert(row.siglum);
    }
    let rows = groups
        .into_iter()
        .map(|((ngram, size, work, count, label), sigla)| super::ResultRow {
            ngram,
            size,
            work,
            siglum: sigla.into_iter().collect::<Vec<_>>().join(SIGLUM_JOINER),
            count,
            label,
        })
        .collect();
    Results::from_rows(rows, tokenizer)
}

fn write_ngram_groups(writer: impl std::io::Write, rows: &[NgramGroupRow]) -> Result<(), ResultsError> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    let labels: Vec<String> = rows
        .first()
        .map(|row| row.label_works.keys().cloned().collect())
        .unwrap_or_default();

    let mut header = vec!["ngram".to_string(), "size".to_string()];
    header.extend(labels.iter().cloned());
    csv_writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![row.ngram.clone(), row.size.to_string()];
        for label in &labels {
            let works = row.label_works.get(label).cloned().unwrap_or_default();
            record.push(works.join(", "));
        }
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn write_witness_groups(writer: impl std::io::Write, rows: &[WitnessGroupRow]) -> Result<(), ResultsError> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    csv_writer.write_record(["work", "siglum", "label", "ngrams"])?;
    for row in rows {
        csv_writer.write_record([
            row.work.as_str(),
            row.siglum.as_str(),
            row.label.as_str(),
            &row.ngrams.join(", "),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ResultRow;
    use crate::tokenizer::Tokenizer;

    fn row(ngram: &str, size: u32, work: &str, siglum: &str, count: u32, label: &str) -> ResultRow {
        ResultRow {
            ngram: ngram.to_string(),
            size,
            work: work.to_string(),
            siglum: siglum.to_string(),
            count,
            label: label.to_string(),
        }
    }

    #[test]
    fn group_by_ngram_pivots_works_per_label() {
        let results = Results::from_rows(
            vec![
                row("AB", 2, "t1", "a", 1, "L1"),
                row("AB", 2, "t2", "a", 1, "L2"),
            ],
            Tokenizer::cbeta(),
        );
        let groups = group_by_ngram(results, &["L1".to_string(), "L2".to_string()]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label_works["L1"], vec!["t1".to_string()]);
        assert_eq!(groups[0].label_works["L2"], vec!["t2".to_string()]);
    }

    #[test]
    fn group_by_witness_lists_distinct_ngrams() {
        let results = Results::from_rows(
            vec![row("AB", 2, "t1", "a", 1, "L"), row("CD", 2, "t1", "a", 1, "L")],
            Tokenizer::cbeta(),
        );
        let groups = group_by_witness(results);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].ngrams, vec!["AB".to_string(), "CD".to_string()]);
    }

    #[test]
    fn collapse_witnesses_joins_sigla() {
        let results = Results::from_rows(
            vec![row("AB", 2, "t1", "a", 1, "L"), row("AB", 2, "t1", "b", 1, "L")],
            Tokenizer::cbeta(),
        );
        let collapsed = collapse_witnesses(results);
        assert_eq!(collapsed.rows().len(), 1);
        assert_eq!(collapsed.rows()[0].siglum, "a/b");
    }
}
