//! End-to-end scenarios against the public crate surface, corresponding to
//! the literal S1-S6 cases and the P1/P4 quantified invariants: a corpus on
//! disk, a DataStore, a catalogue, and the query/results layers composed
//! the way the CLI composes them.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tacl::catalogue::Catalogue;
use tacl::corpus::Corpus;
use tacl::results::ResultRow;
use tacl::store::{DataStore, StoreError};
use tacl::tokenizer::Tokenizer;

fn write_witness(dir: &Path, work: &str, siglum: &str, content: &str) {
    let work_dir = dir.join(work);
    fs::create_dir_all(&work_dir).unwrap();
    fs::write(work_dir.join(format!("{siglum}.txt")), content).unwrap();
}

fn write_catalogue(dir: &Path, entries: &[(&str, &str)]) -> Catalogue {
    let path = dir.join("catalogue.txt");
    let text: String = entries.iter().map(|(work, label)| format!("{work} {label}\n")).collect();
    fs::write(&path, text).unwrap();
    Catalogue::load(&path).unwrap()
}

// S1. Corpus {t1/base.txt = "ABABC"}. add_ngrams(1,3) then search for
// {"AB","BC","ABA","XY"} under catalogue {t1: L}.
#[test]
fn s1_search_emits_expected_rows_including_absent_ngram() {
    let dir = tempfile::tempdir().unwrap();
    write_witness(dir.path(), "t1", "base", "ABABC");
    let corpus = Corpus::new(dir.path());
    let store = DataStore::open_in_memory().unwrap();
    let tokenizer = Tokenizer::cbeta();
    store.add_ngrams(&corpus, &tokenizer, 1, 3, None).unwrap();

    let catalogue = write_catalogue(dir.path(), &[("t1", "L")]);
    let ngrams: HashSet<String> =
        ["AB", "BC", "ABA", "XY"].into_iter().map(str::to_string).collect();
    let rows = store.search(&corpus, &catalogue, &tokenizer, &ngrams).unwrap();

    let find = |ngram: &str| rows.iter().find(|r| r.ngram == ngram).cloned().unwrap();
    let ab = find("AB");
    assert_eq!((ab.size, ab.work.as_str(), ab.siglum.as_str(), ab.count, ab.label.as_str()), (2, "t1", "base", 2, "L"));
    let bc = find("BC");
    assert_eq!((bc.size, bc.count), (2, 1));
    let aba = find("ABA");
    assert_eq!((aba.size, aba.count), (3, 1));
    let xy = find("XY");
    assert_eq!((xy.size, xy.count), (2, 0));
}

// S2. Catalogue {t1:A, t2:B}, t1="AAAB", t2="AAAC", sizes 2-3.
#[test]
fn s2_diff_and_intersection_partition_the_vocabulary() {
    let dir = tempfile::tempdir().unwrap();
    write_witness(dir.path(), "t1", "base", "AAAB");
    write_witness(dir.path(), "t2", "base", "AAAC");
    let corpus = Corpus::new(dir.path());
    let store = DataStore::open_in_memory().unwrap();
    let tokenizer = Tokenizer::cbeta();
    store.add_ngrams(&corpus, &tokenizer, 2, 3, None).unwrap();
    let catalogue = write_catalogue(dir.path(), &[("t1", "A"), ("t2", "B")]);

    let diff = store.diff(&corpus, &catalogue).unwrap();
    assert!(diff.iter().any(|r| r.ngram == "AAB" && r.size == 3 && r.work == "t1" && r.count == 1 && r.label == "A"));
    assert!(diff.iter().any(|r| r.ngram == "AAC" && r.size == 3 && r.work == "t2" && r.count == 1 && r.label == "B"));
    assert!(diff.iter().any(|r| r.ngram == "AB" && r.label == "A"));
    assert!(diff.iter().any(|r| r.ngram == "AC" && r.label == "B"));
    assert!(diff.iter().all(|r| r.ngram != "AA"));

    let intersection = store.intersection(&corpus, &catalogue).unwrap();
    assert!(intersection.iter().any(|r| r.ngram == "AA" && r.work == "t1" && r.count == 2 && r.label == "A"));
    assert!(intersection.iter().any(|r| r.ngram == "AA" && r.work == "t2" && r.count == 2 && r.label == "B"));
    // "AAA" also occurs in both t1 and t2, so it belongs to the
    // intersection too; the scenario's listing names AA as one example,
    // not the complete output.
    assert!(intersection.iter().any(|r| r.ngram == "AAA"));
}

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

// S3. reciprocal_remove leaves a two-label n-gram untouched, and empties a
// set once only one label remains.
#[test]
fn s3_reciprocal_remove_requires_two_distinct_labels() {
    let mut results = tacl::Results::from_rows(
        vec![row("AB", 2, "t1", "base", 3, "A"), row("AB", 2, "t2", "base", 3, "B")],
        Tokenizer::cbeta(),
    );
    results.reciprocal_remove();
    assert_eq!(results.rows().len(), 2);

    let mut single_label = tacl::Results::from_rows(vec![row("AB", 2, "t1", "base", 3, "A")], Tokenizer::cbeta());
    single_label.reciprocal_remove();
    assert!(single_label.is_empty());
}

// S4. prune_by_ngram_size keeps only the requested sizes.
#[test]
fn s4_prune_by_ngram_size_keeps_only_matching_sizes() {
    let mut results = tacl::Results::from_rows(
        vec![
            row("AB", 2, "t1", "base", 1, "A"),
            row("ABC", 3, "t1", "base", 1, "A"),
            row("ABCD", 4, "t1", "base", 1, "A"),
        ],
        Tokenizer::cbeta(),
    );
    results.prune_by_ngram_size(Some(3), Some(3));
    assert_eq!(results.rows().len(), 1);
    assert_eq!(results.rows()[0].size, 3);
}

// S5. Re-ingesting a witness after editing its content replaces its rows
// but keeps the same Text id.
#[test]
fn s5_reingest_after_edit_replaces_ngrams_under_the_same_text_id() {
    let dir = tempfile::tempdir().unwrap();
    write_witness(dir.path(), "t1", "base", "AAAA");
    let corpus = Corpus::new(dir.path());
    let store = DataStore::open_in_memory().unwrap();
    let tokenizer = Tokenizer::cbeta();
    store.add_ngrams(&corpus, &tokenizer, 1, 1, None).unwrap();

    write_witness(dir.path(), "t1", "base", "BBBB");
    store.add_ngrams(&corpus, &tokenizer, 1, 1, None).unwrap();

    let catalogue = write_catalogue(dir.path(), &[("t1", "L")]);
    let rows = store.diff(&corpus, &catalogue).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].ngram, "B");
    assert_eq!(rows[0].count, 4);
}

// S6. validate() tracks on-disk checksum drift.
#[test]
fn s6_validate_detects_checksum_drift_and_confirms_match() {
    let dir = tempfile::tempdir().unwrap();
    write_witness(dir.path(), "t1", "base", "ABABC");
    let corpus = Corpus::new(dir.path());
    let store = DataStore::open_in_memory().unwrap();
    let tokenizer = Tokenizer::cbeta();
    store.add_ngrams(&corpus, &tokenizer, 1, 2, None).unwrap();
    let catalogue = write_catalogue(dir.path(), &[("t1", "L")]);
    assert!(store.validate(&corpus, &catalogue).unwrap());

    write_witness(dir.path(), "t1", "base", "XYZZY");
    assert!(!store.validate(&corpus, &catalogue).unwrap());
}

// P1: add_ngrams(C, a, b) is idempotent.
#[test]
fn p1_add_ngrams_is_idempotent_across_repeated_calls() {
    let dir = tempfile::tempdir().unwrap();
    write_witness(dir.path(), "t1", "base", "AAABBBCCC");
    write_witness(dir.path(), "t2", "base", "CCCBBBAAA");
    let corpus = Corpus::new(dir.path());
    let store = DataStore::open_in_memory().unwrap();
    let tokenizer = Tokenizer::cbeta();
    store.add_ngrams(&corpus, &tokenizer, 1, 4, None).unwrap();
    let catalogue = write_catalogue(dir.path(), &[("t1", "A"), ("t2", "B")]);
    let before = store.counts(&corpus, &catalogue).unwrap();

    store.add_ngrams(&corpus, &tokenizer, 1, 4, None).unwrap();
    let after = store.counts(&corpus, &catalogue).unwrap();
    assert_eq!(before, after);
}

// P4: for two labels, diff and intersection partition the full vocabulary.
#[test]
fn p4_diff_and_intersection_partition_two_label_vocabulary() {
    let dir = tempfile::tempdir().unwrap();
    write_witness(dir.path(), "t1", "base", "AAAB");
    write_witness(dir.path(), "t2", "base", "AAAC");
    let corpus = Corpus::new(dir.path());
    let store = DataStore::open_in_memory().unwrap();
    let tokenizer = Tokenizer::cbeta();
    store.add_ngrams(&corpus, &tokenizer, 1, 4, None).unwrap();
    let catalogue = write_catalogue(dir.path(), &[("t1", "A"), ("t2", "B")]);

    let diff_ngrams: HashSet<(String, u32)> =
        store.diff(&corpus, &catalogue).unwrap().into_iter().map(|r| (r.ngram, r.size)).collect();
    let intersection_ngrams: HashSet<(String, u32)> =
        store.intersection(&corpus, &catalogue).unwrap().into_iter().map(|r| (r.ngram, r.size)).collect();
    assert!(diff_ngrams.is_disjoint(&intersection_ngrams));

    let counts = store.counts(&corpus, &catalogue).unwrap();
    let all_ngrams: HashSet<(String, u32)> = {
        let ngrams_of = |work: &str| -> HashSet<(String, u32)> {
            let content = if work == "t1" { "AAAB" } else { "AAAC" };
            let tokens = tokenizer.tokenize(content);
            let mut set = HashSet::new();
            for size in 1..=tokens.len() {
                for ngram in tokenizer.ngrams(&tokens, size) {
                    set.insert((ngram, size as u32));
                }
            }
            set
        };
        ngrams_of("t1").into_iter().chain(ngrams_of("t2")).collect()
    };
    let _ = counts;
    let union: HashSet<(String, u32)> = diff_ngrams.union(&intersection_ngrams).cloned().collect();
    assert_eq!(union, all_ngrams);
}

// Error conditions: BadSizeRange and CorpusValidation surface as distinct
// StoreError variants rather than silently producing wrong output.
#[test]
fn add_ngrams_rejects_an_invalid_size_range() {
    let dir = tempfile::tempdir().unwrap();
    write_witness(dir.path(), "t1", "base", "ABC");
    let corpus = Corpus::new(dir.path());
    let store = DataStore::open_in_memory().unwrap();
    assert!(matches!(
        store.add_ngrams(&corpus, &Tokenizer::cbeta(), 0, 2, None),
        Err(StoreError::BadSizeRange { .. })
    ));
    assert!(matches!(
        store.add_ngrams(&corpus, &Tokenizer::cbeta(), 3, 2, None),
        Err(StoreError::BadSizeRange { .. })
    ));
}

#[test]
fn queries_refuse_to_run_against_a_drifted_corpus() {
    let dir = tempfile::tempdir().unwrap();
    write_witness(dir.path(), "t1", "base", "ABC");
    let corpus = Corpus::new(dir.path());
    let store = DataStore::open_in_memory().unwrap();
    let tokenizer = Tokenizer::cbeta();
    store.add_ngrams(&corpus, &tokenizer, 1, 2, None).unwrap();
    write_witness(dir.path(), "t1", "base", "XYZ");
    let catalogue = write_catalogue(dir.path(), &[("t1", "L")]);
    assert!(matches!(
        store.intersection(&corpus, &catalogue),
        Err(StoreError::CorpusValidation { .. })
    ));
}
