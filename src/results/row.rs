//! The canonical result row schema (spec §3) and CSV load/save.

use std::io;

use thiserror::Error;

use crate::corpus::CorpusError;

pub const NGRAM_FIELD: &str = "ngram";
pub const SIZE_FIELD: &str = "size";
pub const WORK_FIELD: &str = "work";
pub const SIGLUM_FIELD: &str = "siglum";
pub const COUNT_FIELD: &str = "count";
pub const LABEL_FIELD: &str = "label";

pub const REQUIRED_FIELDS: [&str; 6] = [
    NGRAM_FIELD,
    SIZE_FIELD,
    WORK_FIELD,
    SIGLUM_FIELD,
    COUNT_FIELD,
    LABEL_FIELD,
];

/// Canonical separator used by `collapse_witnesses` to join multiple sigla
/// into one cell.
pub const SIGLUM_JOINER: &str = "/";

#[derive(Error, Debug)]
pub enum ResultsError {
    #[error("results are missing required column {0:?}")]
    MalformedResults(String),
    #[error("value {value:?} in column {column:?} is not a valid integer")]
    NotAnInteger { column: String, value: String },
    #[error("{0}")]
    Configuration(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),
}

/// One row of the canonical schema: `ngram, size, work, siglum, count, label`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub ngram: String,
    pub size: u32,
    pub work: String,
    pub siglum: String,
    pub count: u32,
    pub label: String,
}

pub(super) fn parse_u32(column: &str, value: &str) -> Result<u32, ResultsError> {
    value.parse().map_err(|_| ResultsError::NotAnInteger {
        column: column.to_string(),
        value: value.to_string(),
    })
}

/// Reads a results CSV from `reader`, validating the required header.
pub fn load_rows(reader: impl io::Read) -> Result<Vec<ResultRow>, ResultsError> {
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    for required in REQUIRED_FIELDS {
        if !headers.iter().any(|h| h == required) {
            return Err(ResultsError::MalformedResults(required.to_string()));
        }
    }
    let index_of = |name: &str| headers.iter().position(|h| h == name).unwrap();
    let (ngram_i, size_i, work_i, siglum_i, count_i, label_i) = (
        index_of(NGRAM_FIELD),
        index_of(SIZE_FIELD),
        index_of(WORK_FIELD),
        index_of(SIGLUM_FIELD),
        index_of(COUNT_FIELD),
        index_of(LABEL_FIELD),
    );

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let size = parse_u32(SIZE_FIELD, &record[size_i])?;
        let count = parse_u32(COUNT_FIELD, &record[count_i])?;
        rows.push(ResultRow {
            ngram: record[ngram_i].to_string(),
            size,
            work: record[work_i].to_string(),
            siglum: record[siglum_i].to_string(),
            count,
            label: record[label_i].to_string(),
        });
    }
    Ok(rows)
}

/// Writes `rows` as a results CSV to `writer` with the canonical header.
pub fn write_rows(writer: impl io::Write, rows: &[ResultRow]) -> Result<(), ResultsError> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    csv_writer.write_record(REQUIRED_FIELDS)?;
    for row in rows {
        csv_writer.write_record([
            row.ngram.as_str(),
            &row.size.to_string(),
            row.work.as_str(),
            row.siglum.as_str(),
            &row.count.to_string(),
            row.label.as_str(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_row_multiset() {
        let rows = vec![
            ResultRow {
                ngram: "AB".into(),
                size: 2,
                work: "t1".into(),
                siglum: "base".into(),
                count: 2,
                label: "L".into(),
            },
            ResultRow {
                ngram: "BC".into(),
                size: 2,
                work: "t1".into(),
                siglum: "base".into(),
                count: 1,
                label: "L".into(),
            },
        ];
        let mut buffer = Vec::new();
        write_rows(&mut buffer, &rows).unwrap();
        let loaded = load_rows(&buffer[..]).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn missing_column_is_malformed() {
        let csv = "ngram,size,work,siglum,count\nAB,2,t1,base,2\n";
        let err = load_rows(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ResultsError::MalformedResults(col) if col == LABEL_FIELD));
    }

    #[test]
    fn non_integer_count_errors() {
        let csv = "ngram,size,work,siglum,count,label\nAB,2,t1,base,notanumber,L\n";
        let err = load_rows(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ResultsError::NotAnInteger { column, .. } if column == COUNT_FIELD));
    }
}
