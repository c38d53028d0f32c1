//! Enumerates witnesses on disk under `<corpus>/<work>/<siglum>.txt` and
//! yields `(work, siglum, content)` triples (spec §4.2).

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("could not read corpus directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not read witness file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("witness file {path} is not valid UTF-8: {source}")]
    NotUtf8 {
        path: PathBuf,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("no witnesses found for work {0:?}")]
    WorkNotFound(String),
}

/// A single witness: a `(work, siglum)` pair backed by a file on disk.
/// Content is not read until `content()` is called.
#[derive(Debug, Clone)]
pub struct Witness {
    pub work: String,
    pub siglum: String,
    pub path: PathBuf,
}

impl Witness {
    /// Reads and returns the witness's raw bytes.
    pub fn bytes(&self) -> Result<Vec<u8>, CorpusError> {
        fs::read(&self.path).map_err(|source| CorpusError::ReadFile {
            path: self.path.clone(),
            source,
        })
    }

    /// Reads the witness's content as UTF-8 text.
    pub fn content(&self) -> Result<String, CorpusError> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes).map_err(|err| CorpusError::NotUtf8 {
            path: self.path.clone(),
            source: err.utf8_error(),
        })
    }
}

/// A directory-backed corpus: `<root>/<work>/<siglum>.txt` per witness.
#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
}

impl Corpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All witnesses in the corpus, sorted by (work asc, siglum asc).
    pub fn get_texts(&self) -> Result<Vec<Witness>, CorpusError> {
        let mut witnesses = Vec::new();
        let work_dirs = fs::read_dir(&self.root).map_err(|source| CorpusError::ReadDir {
            path: self.root.clone(),
            source,
        })?;
        let mut work_paths: Vec<PathBuf> = work_dirs
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        work_paths.sort();

        for work_path in work_paths {
            let work = work_path
                .file_name()
                .expect("directory entry has a name")
                .to_string_lossy()
                .into_owned();
            let siglum_entries = fs::read_dir(&work_path).map_err(|source| CorpusError::ReadDir {
                path: work_path.clone(),
                source,
            })?;
            let mut siglum_paths: Vec<PathBuf> = siglum_entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().map(|ext| ext == "txt").unwrap_or(false))
                .collect();
            siglum_paths.sort();

            for siglum_path in siglum_paths {
                let siglum = siglum_path
                    .file_stem()
                    .expect("txt file has a stem")
                    .to_string_lossy()
                    .into_owned();
                witnesses.push(Witness {
                    work: work.clone(),
                    siglum,
                    path: siglum_path,
                });
            }
        }

        Ok(witnesses)
    }

    /// Returns a single witness for `work` (historical single-siglum API);
    /// when multiple sigla exist, returns the first in sort order.
    pub fn get_text(&self, work: &str) -> Result<Witness, CorpusError> {
        self.get_texts()?
            .into_iter()
            .find(|witness| witness.work == work)
            .ok_or_else(|| CorpusError::WorkNotFound(work.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_witness(dir: &Path, work: &str, siglum: &str, content: &str) {
        let work_dir = dir.join(work);
        fs::create_dir_all(&work_dir).unwrap();
        fs::write(work_dir.join(format!("{siglum}.txt")), content).unwrap();
    }

    #[test]
    fn lists_witnesses_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        write_witness(dir.path(), "t2", "base", "content2");
        write_witness(dir.path(), "t1", "b", "content1b");
        write_witness(dir.path(), "t1", "a", "content1a");
        let corpus = Corpus::new(dir.path());
        let witnesses = corpus.get_texts().unwrap();
        let pairs: Vec<(&str, &str)> = witnesses
            .iter()
            .map(|w| (w.work.as_str(), w.siglum.as_str()))
            .collect();
        assert_eq!(pairs, vec![("t1", "a"), ("t1", "b"), ("t2", "base")]);
    }

    #[test]
    fn get_text_returns_first_siglum() {
        let dir = tempfile::tempdir().unwrap();
        write_witness(dir.path(), "t1", "b", "second");
        write_witness(dir.path(), "t1", "a", "first");
        let corpus = Corpus::new(dir.path());
        let witness = corpus.get_text("t1").unwrap();
        assert_eq!(witness.siglum, "a");
        assert_eq!(witness.content().unwrap(), "first");
    }

    #[test]
    fn get_text_missing_work_errors() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = Corpus::new(dir.path());
        fs::create_dir_all(dir.path()).unwrap();
        assert!(matches!(
            corpus.get_text("missing"),
            Err(CorpusError::WorkNotFound(_))
        ));
    }
}
