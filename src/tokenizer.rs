//! Splits decoded witness text into an ordered sequence of atomic tokens
//! under a configurable pattern and joiner (spec §4.1).

use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("invalid tokenizer pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// CJK preset: one ideographic character per token, joined with nothing.
pub const TOKENIZER_PATTERN_CBETA: &str = r"\S";
pub const TOKENIZER_JOINER_CBETA: &str = "";

/// Whitespace/syllabic preset (e.g. Tibetan transliteration): runs of
/// non-whitespace, joined with a single space.
pub const TOKENIZER_PATTERN_PAGEL: &str = r"\S+";
pub const TOKENIZER_JOINER_PAGEL: &str = " ";

/// Splits text into tokens and composes n-grams from windows of tokens.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    pattern: Regex,
    joiner: String,
}

impl Tokenizer {
    pub fn new(pattern: &str, joiner: impl Into<String>) -> Result<Self, TokenizerError> {
        let pattern = Regex::new(pattern).map_err(|source| TokenizerError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern,
            joiner: joiner.into(),
        })
    }

    /// One ideographic character per token, empty joiner — CJK witnesses.
    pub fn cbeta() -> Self {
        Self::new(TOKENIZER_PATTERN_CBETA, TOKENIZER_JOINER_CBETA)
            .expect("built-in cbeta pattern is valid")
    }

    /// Whitespace-delimited tokens, space joiner — Tibetan transliteration.
    pub fn pagel() -> Self {
        Self::new(TOKENIZER_PATTERN_PAGEL, TOKENIZER_JOINER_PAGEL)
            .expect("built-in pagel pattern is valid")
    }

    pub fn joiner(&self) -> &str {
        &self.joiner
    }

    /// Every maximal non-overlapping match of `pattern` in `text`, in order.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// All length-`n` windows of `tokens`, materialised via the joiner.
    /// Output length is `max(0, tokens.len() - n + 1)`.
    pub fn ngrams(&self, tokens: &[String], n: usize) -> Vec<String> {
        if n == 0 || tokens.len() < n {
            return Vec::new();
        }
        tokens
            .windows(n)
            .map(|window| window.join(&self.joiner))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cbeta_tokenizes_one_char_per_token() {
        let tokenizer = Tokenizer::cbeta();
        let tokens = tokenizer.tokenize("ABABC");
        assert_eq!(tokens, vec!["A", "B", "A", "B", "C"]);
    }

    #[test]
    fn cbeta_joiner_is_empty() {
        let tokenizer = Tokenizer::cbeta();
        let tokens = tokenizer.tokenize("ABC");
        let grams = tokenizer.ngrams(&tokens, 2);
        assert_eq!(grams, vec!["AB", "BC"]);
    }

    #[test]
    fn pagel_tokenizes_on_whitespace_runs() {
        let tokenizer = Tokenizer::pagel();
        let tokens = tokenizer.tokenize("bla bla yang dag");
        assert_eq!(tokens, vec!["bla", "bla", "yang", "dag"]);
        let grams = tokenizer.ngrams(&tokens, 2);
        assert_eq!(grams, vec!["bla bla", "bla yang", "yang dag"]);
    }

    #[test]
    fn ngram_window_count_matches_formula() {
        let tokenizer = Tokenizer::cbeta();
        let tokens = tokenizer.tokenize("ABABC");
        assert_eq!(tokenizer.ngrams(&tokens, 3).len(), tokens.len() - 3 + 1);
    }

    #[test]
    fn ngram_of_size_larger_than_sequence_is_empty() {
        let tokenizer = Tokenizer::cbeta();
        let tokens = tokenizer.tokenize("AB");
        assert!(tokenizer.ngrams(&tokens, 5).is_empty());
    }
}
