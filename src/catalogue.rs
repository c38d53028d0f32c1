//! Ordered `work -> label` mapping (spec §4.4).

use indexmap::IndexMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::corpus::Corpus;

#[derive(Error, Debug)]
pub enum CatalogueError {
    #[error("could not read catalogue file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write catalogue file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line} of catalogue {path} is malformed: {text:?}")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        text: String,
    },
    #[error("work {work:?} has conflicting labels {first:?} and {second:?}")]
    Conflict {
        work: String,
        first: String,
        second: String,
    },
    #[error(transparent)]
    Corpus(#[from] crate::corpus::CorpusError),
}

/// Ordered mapping from `work` to `label`. Preserves insertion order so
/// `ordered_labels` reflects first-appearance order (spec I-free invariant
/// from §4.4: "order of first appearance of labels is preserved").
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    works: IndexMap<String, String>,
}

impl Catalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists every work under `corpus_dir`, each paired with `default_label`,
    /// in directory sort order.
    pub fn generate(corpus_dir: impl AsRef<Path>, default_label: &str) -> Result<Self, CatalogueError> {
        let corpus = Corpus::new(corpus_dir.as_ref());
        let mut catalogue = Catalogue::new();
        let mut seen_works = Vec::new();
        for witness in corpus.get_texts()? {
            if !seen_works.contains(&witness.work) {
                seen_works.push(witness.work.clone());
            }
        }
        for work in seen_works {
            catalogue.works.insert(work, default_label.to_string());
        }
        Ok(catalogue)
    }

    /// Parses a whitespace-delimited two-column `work label` file.
    /// `#` starts a line comment; blank lines are ignored. A label
    /// containing whitespace must be double-quoted. An empty label removes
    /// the work from the catalogue.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogueError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CatalogueError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut catalogue = Catalogue::new();
        for (index, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (work, label) = split_catalogue_line(line).ok_or_else(|| CatalogueError::MalformedLine {
                path: path.to_path_buf(),
                line: index + 1,
                text: raw_line.to_string(),
            })?;
            if label.is_empty() {
                catalogue.works.shift_remove(&work);
                continue;
            }
            if let Some(existing) = catalogue.works.get(&work) {
                if existing != &label {
                    return Err(CatalogueError::Conflict {
                        work,
                        first: existing.clone(),
                        second: label,
                    });
                }
                continue;
            }
            catalogue.works.insert(work, label);
        }
        Ok(catalogue)
    }

    /// Writes the catalogue back out, one `work label` pair per line,
    /// preserving insertion order. Labels containing whitespace are quoted.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CatalogueError> {
        let path = path.as_ref();
        let mut file = fs::File::create(path).map_err(|source| CatalogueError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        for (work, label) in &self.works {
            let field = if label.chars().any(char::is_whitespace) {
                format!("\"{label}\"")
            } else {
                label.clone()
            };
            writeln!(file, "{work} {field}").map_err(|source| CatalogueError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// The label assigned to `work`, if any.
    pub fn label_for(&self, work: &str) -> Option<&str> {
        self.works.get(work).map(String::as_str)
    }

    /// All `(work, label)` pairs in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.works.iter().map(|(w, l)| (w.as_str(), l.as_str()))
    }

    pub fn works(&self) -> impl Iterator<Item = &str> {
        self.works.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.works.is_empty()
    }

    /// Distinct labels in the order of their first appearance.
    pub fn ordered_labels(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for label in self.works.values() {
            if !seen.contains(label) {
                seen.push(label.clone());
            }
        }
        seen
    }

    /// Works carrying `label`.
    pub fn works_for_label(&self, label: &str) -> Vec<&str> {
        self.works
            .iter()
            .filter(|(_, l)| l.as_str() == label)
            .map(|(w, _)| w.as_str())
            .collect()
    }
}

fn split_catalogue_line(line: &str) -> Option<(String, String)> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let work = parts.next()?.to_string();
    let remainder = parts.next().unwrap_or("").trim();
    if remainder.is_empty() {
        return None;
    }
    let label = if remainder.starts_with('"') && remainder.ends_with('"') && remainder.len() >= 2 {
        remainder[1..remainder.len() - 1].to_string()
    } else {
        remainder.to_string()
    };
    Some((work, label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_whitespace_delimited_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogue.txt");
        fs::write(&path, "t1 A\nt2 B\n# a comment\n\nt3 \"label with spaces\"\n").unwrap();
        let catalogue = Catalogue::load(&path).unwrap();
        assert_eq!(catalogue.label_for("t1"), Some("A"));
        assert_eq!(catalogue.label_for("t2"), Some("B"));
        assert_eq!(catalogue.label_for("t3"), Some("label with spaces"));
    }

    #[test]
    fn empty_label_removes_work() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogue.txt");
        fs::write(&path, "t1 A\nt1 \n").unwrap();
        let catalogue = Catalogue::load(&path).unwrap();
        assert_eq!(catalogue.label_for("t1"), None);
    }

    #[test]
    fn conflicting_labels_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogue.txt");
        fs::write(&path, "t1 A\nt1 B\n").unwrap();
        assert!(matches!(
            Catalogue::load(&path),
            Err(CatalogueError::Conflict { .. })
        ));
    }

    #[test]
    fn ordered_labels_reflects_first_appearance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogue.txt");
        fs::write(&path, "t1 B\nt2 A\nt3 B\n").unwrap();
        let catalogue = Catalogue::load(&path).unwrap();
        assert_eq!(catalogue.ordered_labels(), vec!["B", "A"]);
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogue.txt");
        fs::write(&path, "t1 A\nt2 \"two words\"\n").unwrap();
        let catalogue = Catalogue::load(&path).unwrap();
        let out_path = dir.path().join("out.txt");
        catalogue.save(&out_path).unwrap();
        let reloaded = Catalogue::load(&out_path).unwrap();
        assert_eq!(reloaded.label_for("t1"), Some("A"));
        assert_eq!(reloaded.label_for("t2"), Some("two words"));
    }
}
