//! From a token sequence and a size range, yields `(ngram, count)` tuples
//! per size (spec §4.3).

use indexmap::IndexMap;
use std::collections::BTreeMap;

use crate::tokenizer::Tokenizer;

/// `ngram -> occurrence count`, in first-seen order (stable iteration matters
/// for deterministic bulk-insert batching downstream).
pub type NgramCounts = IndexMap<String, u32>;

/// Generates, for every size in `[min_size, max_size]`, the multiset of
/// n-grams from `tokens` as exact occurrence counts (including overlapping
/// windows). Returned in ascending size order.
pub fn generate(
    tokenizer: &Tokenizer,
    tokens: &[String],
    min_size: usize,
    max_size: usize,
) -> BTreeMap<usize, NgramCounts> {
    let mut by_size = BTreeMap::new();
    for size in min_size..=max_size {
        let mut counts: NgramCounts = IndexMap::new();
        for ngram in tokenizer.ngrams(tokens, size) {
            *counts.entry(ngram).or_insert(0) += 1;
        }
        by_size.insert(size, counts);
    }
    by_size
}
