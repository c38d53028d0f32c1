//! Row-wise transforms on [`Results`], applied in the fixed order pinned by
//! spec §4.7: extend, bifurcated_extend, reduce, reciprocal_remove,
//! zero_fill, the five prune_* operations, remove_label, sort,
//! add_label_count, add_label_work_count.

use std::collections::{HashMap, HashSet};

use crate::corpus::Corpus;

use super::row::ResultRow;
use super::{Results, ResultsError};

/// Finds every start index in `tokens` at which the window of `size` tokens,
/// joined with `joiner`, equals `target`.
fn occurrence_positions(tokens: &[String], joiner: &str, size: usize, target: &str) -> Vec<usize> {
    if size == 0 || tokens.len() < size {
        return Vec::new();
    }
    (0..=tokens.len() - size)
        .filter(|&i| tokens[i..i + size].join(joiner) == target)
        .collect()
}

/// Grows occurrence `positions` of an n-gram of `size` one token at a time,
/// preferring right extension over left, stopping as soon as no direction
/// keeps every occurrence identical (this is what "maximal chain" means:
/// all occurrences must extend the same way). `accept` decides, given a
/// would-be extended ngram string and size, whether growth may continue.
fn grow_chain(
    tokens: &[String],
    joiner: &str,
    mut size: usize,
    mut positions: Vec<usize>,
    mut accept: impl FnMut(&str, usize) -> bool,
) -> (usize, Vec<usize>) {
    loop {
        if !positions.is_empty() && positions.iter().all(|&i| i + size < tokens.len()) {
            let candidate = tokens[positions[0]..positions[0] + size + 1].join(joiner);
            let all_match = positions
                .iter()
                .all(|&i| tokens[i..i + size + 1].join(joiner) == candidate);
            if all_match && accept(&candidate, size + 1) {
                size += 1;
                continue;
            }
        }
        if !positions.is_empty() && positions.iter().all(|&i| i >= 1) {
            let shifted: Vec<usize> = positions.iter().map(|&i| i - 1).collect();
            let candidate = tokens[shifted[0]..shifted[0] + size + 1].join(joiner);
            let all_match = shifted
                .iter()
                .all(|&i| tokens[i..i + size + 1].join(joiner) == candidate);
            if all_match && accept(&candidate, size + 1) {
                size += 1;
                positions = shifted;
                continue;
            }
        }
        break;
    }
    (size, positions)
}

impl Results {
    /// Grows each row's n-gram to the longest chain that still occurs with
    /// the same count in that witness (spec §4.7 `extend`). Operates across
    /// all labels; preserves counts per witness. Rows are processed in
    /// `(work, siglum)` order so the outcome does not depend on input order.
    pub fn extend(&mut self, corpus: &Corpus) -> Result<(), ResultsError> {
        let witnesses = corpus.get_texts()?;
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|&a, &b| {
            (&self.rows[a].work, &self.rows[a].siglum).cmp(&(&self.rows[b].work, &self.rows[b].siglum))
        });

        let mut tokens_cache: HashMap<(String, String), Vec<String>> = HashMap::new();
        for index in order {
            let work = self.rows[index].work.clone();
            let siglum = self.rows[index].siglum.clone();
            let tokens = match tokens_cache.get(&(work.clone(), siglum.clone())) {
                Some(tokens) => tokens.clone(),
                None => {
                    let Some(witness) = witnesses.iter().find(|w| w.work == work && w.siglum == siglum) else {
                        continue;
                    };
                    let content = witness.content()?;
                    let tokens = self.tokenizer.tokenize(&content);
                    tokens_cache.insert((work.clone(), siglum.clone()), tokens.clone());
                    tokens
                }
            };

            let row = &self.rows[index];
            let size = row.size as usize;
            let joiner = self.tokenizer.joiner().to_string();
            let positions = occurrence_positions(&tokens, &joiner, size, &row.ngram);
            let count = row.count;
            let (final_size, final_positions) = grow_chain(&tokens, &joiner, size, positions, |_, _| true);
            if final_size != size && !final_positions.is_empty() {
                let final_ngram = tokens[final_positions[0]..final_positions[0] + final_size].join(&joiner);
                let row = &mut self.rows[index];
                row.ngram = final_ngram;
                row.size = final_size as u32;
                row.count = count;
            }
        }
        Ok(())
    }

    /// Like `extend`, but the chain is grown while the candidate's total
    /// occurrence count across every witness already carrying the row's
    /// label stays at or above the baseline count of the original n-gram,
    /// and halts once `max_extend` is reached (spec §4.7 `bifurcated_extend`).
    pub fn bifurcated_extend(&mut self, corpus: &Corpus, max_extend: usize) -> Result<(), ResultsError> {
        let witnesses = corpus.get_texts()?;
        let joiner = self.tokenizer.joiner().to_string();

        let mut label_works: HashMap<String, HashSet<String>> = HashMap::new();
        for row in &self.rows {
            label_works.entry(row.label.clone()).or_default().insert(row.work.clone());
        }

        let mut tokens_by_witness: HashMap<(String, String), Vec<String>> = HashMap::new();
        for witness in &witnesses {
            let content = witness.content()?;
            let tokens = self.tokenizer.tokenize(&content);
            tokens_by_witness.insert((witness.work.clone(), witness.siglum.clone()), tokens);
        }

        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.sort_by(|&a, &b| {
            (&self.rows[a].work, &self.rows[a].siglum).cmp(&(&self.rows[b].work, &self.rows[b].siglum))
        });

        for index in order {
            let row = self.rows[index].clone();
            let Some(tokens) = tokens_by_witness.get(&(row.work.clone(), row.siglum.clone())).cloned() else {
                continue;
            };
            let size = row.size as usize;
            if size >= max_extend {
                continue;
            }
            let positions = occurrence_positions(&tokens, &joiner, size, &row.ngram);
            if positions.is_empty() {
                continue;
            }

            let label_witnesses: Vec<&(String, String)> = tokens_by_witness
                .keys()
                .filter(|(work, _)| label_works.get(&row.label).map(|set| set.contains(work)).unwrap_or(false))
                .collect();
            let baseline = label_occurrence_count(&tokens_by_witness, &label_witnesses, &joiner, size, &row.ngram);

            let (final_size, final_positions) = grow_chain(&tokens, &joiner, size, positions, |candidate, candidate_size| {
                if candidate_size > max_extend {
                    return false;
                }
                let total = label_occurrence_count(&tokens_by_witness, &label_witnesses, &joiner, candidate_size, candidate);
                total >= baseline
            });

            if final_size != size && !final_positions.is_empty() {
                let final_ngram = tokens[final_positions[0]..final_positions[0] + final_size].join(&joiner);
                let row_mut = &mut self.rows[index];
                row_mut.ngram = final_ngram;
                row_mut.size = final_size as u32;
            }
        }
        Ok(())
    }

    /// Drops any row whose n-gram is a shorter, identically-counted
    /// sub-sequence of another row's n-gram in the same witness and label
    /// (spec §4.7 `reduce`).
    pub fn reduce(&mut self) {
        let mut buckets: HashMap<(String, String, String), Vec<usize>> = HashMap::new();
        for (i, row) in self.rows.iter().enumerate() {
            buckets
                .entry((row.work.clone(), row.siglum.clone(), row.label.clone()))
                .or_default()
                .push(i);
        }

        let tokenizer = self.tokenizer.clone();
        let mut discard = vec![false; self.rows.len()];
        for indices in buckets.values() {
            for &i in indices {
                let a = &self.rows[i];
                let a_tokens = tokenizer.tokenize(&a.ngram);
                for &j in indices {
                    if i == j {
                        continue;
                    }
                    let b = &self.rows[j];
                    if b.size <= a.size || b.count != a.count {
                        continue;
                    }
                    let b_tokens = tokenizer.tokenize(&b.ngram);
                    if contains_subsequence(&b_tokens, &a_tokens) {
                        discard[i] = true;
                        break;
                    }
                }
            }
        }

        let mut kept = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.drain(..).enumerate() {
            if !discard[i] {
                kept.push(row);
            }
        }
        self.rows = kept;
    }

    /// Drops rows whose n-gram appears under only one label (spec §4.7
    /// `reciprocal_remove`).
    pub fn reciprocal_remove(&mut self) {
        let mut labels_by_ngram: HashMap<(String, u32), HashSet<String>> = HashMap::new();
        for row in &self.rows {
            labels_by_ngram
                .entry((row.ngram.clone(), row.size))
                .or_default()
                .insert(row.label.clone());
        }
        self.rows
            .retain(|row| labels_by_ngram[&(row.ngram.clone(), row.size)].len() >= 2);
    }

    /// For every `(ngram, size, label)` already present, materialises a
    /// count-0 row for every witness of every work carrying that label which
    /// does not already have one (spec §4.7 `zero_fill`). The witness list
    /// comes from `corpus`, not from re-tokenizing — absence, not content,
    /// is what is being recorded.
    pub fn zero_fill(&mut self, corpus: &Corpus) -> Result<(), ResultsError> {
        if self.rows.is_empty() {
            return Ok(());
        }
        let mut label_works: HashMap<String, Vec<String>> = HashMap::new();
        let mut label_ngrams: HashMap<String, Vec<(String, u32)>> = HashMap::new();
        let mut existing: HashSet<(String, u32, String, String, String)> = HashSet::new();
        for row in &self.rows {
            let works = label_works.entry(row.label.clone()).or_default();
            if !works.contains(&row.work) {
                works.push(row.work.clone());
            }
            let ngrams = label_ngrams.entry(row.label.clone()).or_default();
            let key = (row.ngram.clone(), row.size);
            if !ngrams.contains(&key) {
                ngrams.push(key);
            }
            existing.insert((row.ngram.clone(), row.size, row.work.clone(), row.siglum.clone(), row.label.clone()));
        }

        let all_witnesses = corpus.get_texts()?;
        let mut witnesses_by_work: HashMap<&str, Vec<&str>> = HashMap::new();
        for witness in &all_witnesses {
            witnesses_by_work.entry(witness.work.as_str()).or_default().push(witness.siglum.as_str());
        }

        let mut new_rows = Vec::new();
        for (label, works) in &label_works {
            let Some(ngrams) = label_ngrams.get(label) else { continue };
            for work in works {
                let Some(sigla) = witnesses_by_work.get(work.as_str()) else { continue };
                for siglum in sigla {
                    for (ngram, size) in ngrams {
                        let key = (ngram.clone(), *size, work.clone(), siglum.to_string(), label.clone());
                        if !existing.contains(&key) {
                            new_rows.push(ResultRow {
                                ngram: ngram.clone(),
                                size: *size,
                                work: work.clone(),
                                siglum: siglum.to_string(),
                                count: 0,
                                label: label.clone(),
                            });
                            existing.insert(key);
                        }
                    }
                }
            }
        }
        self.rows.extend(new_rows);
        Ok(())
    }

    /// Keeps only rows whose n-gram is in `ngrams` (spec §4.7 `prune_by_ngram`).
    pub fn prune_by_ngram(&mut self, ngrams: &HashSet<String>) {
        self.rows.retain(|row| ngrams.contains(&row.ngram));
    }

    /// Drops all rows for an n-gram unless the number of distinct works in
    /// which it occurs (count > 0) falls within `[min, max]` (spec §4.7
    /// `prune_by_work_count`).
    pub fn prune_by_work_count(&mut self, min: Option<u32>, max: Option<u32>) {
        let mut works_by_ngram: HashMap<(String, u32), HashSet<String>> = HashMap::new();
        for row in &self.rows {
            if row.count > 0 {
                works_by_ngram
                    .entry((row.ngram.clone(), row.size))
                    .or_default()
                    .insert(row.work.clone());
            }
        }
        self.rows.retain(|row| {
            let count = works_by_ngram
                .get(&(row.ngram.clone(), row.size))
                .map(|set| set.len())
                .unwrap_or(0) as u32;
            min.map(|m| count >= m).unwrap_or(true) && max.map(|m| count <= m).unwrap_or(true)
        });
    }

    /// Keeps only rows whose n-gram size falls within `[min, max]` (spec
    /// §4.7 `prune_by_ngram_size`).
    pub fn prune_by_ngram_size(&mut self, min: Option<u32>, max: Option<u32>) {
        self.rows.retain(|row| {
            min.map(|m| row.size >= m).unwrap_or(true) && max.map(|m| row.size <= m).unwrap_or(true)
        });
    }

    /// Keeps only rows whose per-witness count falls within `[min, max]`
    /// (spec §4.7 `prune_by_ngram_count`).
    pub fn prune_by_ngram_count(&mut self, min: Option<u32>, max: Option<u32>) {
        self.rows.retain(|row| {
            min.map(|m| row.count >= m).unwrap_or(true) && max.map(|m| row.count <= m).unwrap_or(true)
        });
    }

    /// Drops all rows for an `(ngram, work)` pair unless the count summed
    /// across that work's witnesses falls within `[min, max]` (spec §4.7
    /// `prune_by_ngram_count_per_work`).
    pub fn prune_by_ngram_count_per_work(&mut self, min: Option<u32>, max: Option<u32>) {
        let mut totals: HashMap<(String, u32, String), u32> = HashMap::new();
        for row in &self.rows {
            *totals.entry((row.ngram.clone(), row.size, row.work.clone())).or_insert(0) += row.count;
        }
        self.rows.retain(|row| {
            let total = totals[&(row.ngram.clone(), row.size, row.work.clone())];
            min.map(|m| total >= m).unwrap_or(true) && max.map(|m| total <= m).unwrap_or(true)
        });
    }

    /// Drops every row carrying `label` (spec §4.7 `remove_label`).
    pub fn remove_label(&mut self, label: &str) {
        self.rows.retain(|row| row.label != label);
    }

    /// Orders rows by `(size desc, total occurrence count desc, ngram asc,
    /// label asc, work asc, siglum asc)`, where "total occurrence count" is
    /// the sum of `count` across every row sharing that `(ngram, size)`
    /// (spec §4.7 `sort`).
    pub fn sort(&mut self) {
        let mut totals: HashMap<(String, u32), u64> = HashMap::new();
        for row in &self.rows {
            *totals.entry((row.ngram.clone(), row.size)).or_insert(0) += row.count as u64;
        }
        self.rows.sort_by(|a, b| {
            let total_a = totals[&(a.ngram.clone(), a.size)];
            let total_b = totals[&(b.ngram.clone(), b.size)];
            b.size
                .cmp(&a.size)
                .then(total_b.cmp(&total_a))
                .then(a.ngram.cmp(&b.ngram))
                .then(a.label.cmp(&b.label))
                .then(a.work.cmp(&b.work))
                .then(a.siglum.cmp(&b.siglum))
        });
    }

    /// Appends a `label count` column: the total count of each row's n-gram
    /// across all witnesses sharing its label (spec §4.7 `add_label_count`).
    pub fn add_label_count(&mut self) {
        let mut totals: HashMap<(String, u32, String), u64> = HashMap::new();
        for row in &self.rows {
            *totals
                .entry((row.ngram.clone(), row.size, row.label.clone()))
                .or_insert(0) += row.count as u64;
        }
        let counts = self
            .rows
            .iter()
            .map(|row| totals[&(row.ngram.clone(), row.size, row.label.clone())])
            .collect();
        self.label_count = Some(counts);
    }

    /// Appends a `label work count` column: the number of distinct works,
    /// under the row's label, in which its n-gram occurs at all (spec §4.7
    /// `add_label_work_count`).
    pub fn add_label_work_count(&mut self) {
        let mut works: HashMap<(String, u32, String), HashSet<&str>> = HashMap::new();
        for row in &self.rows {
            if row.count > 0 {
                works
                    .entry((row.ngram.clone(), row.size, row.label.clone()))
                    .or_default()
                    .insert(&row.work);
            }
        }
        let counts = self
            .rows
            .iter()
            .map(|row| {
                works
                    .get(&(row.ngram.clone(), row.size, row.label.clone()))
                    .map(|set| set.len())
                    .unwrap_or(0) as u64
            })
            .collect();
        self.label_work_count = Some(counts);
    }
}

fn contains_subsequence(haystack: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn label_occurrence_count(
    tokens_by_witness: &HashMap<(String, String), Vec<String>>,
    label_witnesses: &[&(String, String)],
    joiner: &str,
    size: usize,
    ngram: &str,
) -> u64 {
    label_witnesses
        .iter()
        .filter_map(|key| tokens_by_witness.get(*key))
        .map(|tokens| occurrence_positions(tokens, joiner, size, ngram).len() as u64)
        .sum()
}
