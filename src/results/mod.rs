//! In-memory tabular algebra over the canonical result row schema (spec §4.7).
//!
//! Rows are held as a plain `Vec<ResultRow>` rather than the column-indexed
//! DataFrame the original tool used — see DESIGN.md open question 1. A
//! `Vec` has no separate index to desynchronise, so the "duplicate index"
//! bug class the design notes warn about does not exist in this
//! representation.

mod group;
mod row;
mod transforms;

pub use group::{collapse_witnesses, group_by_ngram, group_by_witness, NgramGroupRow, OutputTable, WitnessGroupRow};
pub use row::{
    load_rows, write_rows, ResultRow, ResultsError, COUNT_FIELD, LABEL_FIELD, NGRAM_FIELD, SIGLUM_FIELD,
    SIGLUM_JOINER, SIZE_FIELD, WORK_FIELD,
};

use std::io;

use crate::tokenizer::Tokenizer;

/// An in-memory results table plus the optional extension columns that
/// `add_label_count`/`add_label_work_count` append.
pub struct Results {
    pub(crate) tokenizer: Tokenizer,
    pub(crate) rows: Vec<ResultRow>,
    pub(crate) label_count: Option<Vec<u64>>,
    pub(crate) label_work_count: Option<Vec<u64>>,
}

impl Results {
    /// Loads a results CSV, validating the required columns.
    pub fn load(reader: impl io::Read, tokenizer: Tokenizer) -> Result<Self, ResultsError> {
        let rows = row::load_rows(reader)?;
        Ok(Self {
            tokenizer,
            rows,
            label_count: None,
            label_work_count: None,
        })
    }

    pub fn from_rows(rows: Vec<ResultRow>, tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer,
            rows,
            label_count: None,
            label_work_count: None,
        }
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct labels among the current rows, in order of first appearance.
    pub fn ordered_labels(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for row in &self.rows {
            if !seen.contains(&row.label) {
                seen.push(row.label.clone());
            }
        }
        seen
    }

    /// Writes the table as CSV, including `label count`/`label work count`
    /// columns if `add_label_count`/`add_label_work_count` were applied.
    pub fn write_csv(&self, writer: impl io::Write) -> Result<(), ResultsError> {
        let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
        let mut header = vec![NGRAM_FIELD, SIZE_FIELD, WORK_FIELD, SIGLUM_FIELD, COUNT_FIELD, LABEL_FIELD];
        if self.label_count.is_some() {
            header.push("label count");
        }
        if self.label_work_count.is_some() {
            header.push("label work count");
        }
        csv_writer.write_record(&header)?;

        for (i, row) in self.rows.iter().enumerate() {
            let mut record = vec![
                row.ngram.clone(),
                row.size.to_string(),
                row.work.clone(),
                row.siglum.clone(),
                row.count.to_string(),
                row.label.clone(),
            ];
            if let Some(counts) = &self.label_count {
                record.push(counts[i].to_string());
            }
            if let Some(counts) = &self.label_work_count {
                record.push(counts[i].to_string());
            }
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

/// Rejects flag combinations where a later format-changing transform would
/// receive a row shape it cannot consume (spec §9 open question 2,
/// generalised in SPEC_FULL.md §4.7).
pub fn validate_format_flags(
    group_by_ngram: bool,
    group_by_witness: bool,
    collapse_witnesses: bool,
) -> Result<(), ResultsError> {
    let set = [group_by_ngram, group_by_witness, collapse_witnesses]
        .iter()
        .filter(|flag| **flag)
        .count();
    if set > 1 {
        return Err(ResultsError::Configuration(
            "group-by-ngram, group-by-witness, and collapse-witnesses are mutually exclusive"
                .to_string(),
        ));
    }
    Ok(())
}
