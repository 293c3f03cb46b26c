//! Text tokenizer for word-frequency counting
//!
//! Pipeline: lowercase → split on non-alphanumeric → drop empty tokens
//!           → (optional) drop short tokens → (optional) drop stop words
//!
//! Every character that is not alphanumeric is a separator, including
//! apostrophes and underscores, so `"Cat's"` yields `cat` and `s`.

use redditfreq_core::TokenizerConfig;
use std::collections::{HashMap, HashSet};

/// Baseline tokenization with no length or stop-word filtering.
///
/// ```
/// use analyzer::tokenizer::tokenize;
///
/// let tokens = tokenize("The Cat's hat!! The CAT.");
/// assert_eq!(tokens, vec!["the", "cat", "s", "hat", "the", "cat"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    min_word_length: usize,
    stop_words: HashSet<String>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            min_word_length: 1,
            stop_words: HashSet::new(),
        }
    }

    pub fn from_config(config: &TokenizerConfig) -> Self {
        Self::new()
            .with_min_word_length(config.min_word_length)
            .with_stop_words(config.stop_words.iter().map(String::as_str))
    }

    pub fn with_min_word_length(mut self, min_word_length: usize) -> Self {
        self.min_word_length = min_word_length.max(1);
        self
    }

    pub fn with_stop_words<'a, I>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.stop_words.extend(words.into_iter().flat_map(tokenize));
        self
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        tokenize(text)
            .into_iter()
            .filter(|token| self.keeps(token))
            .collect()
    }

    /// Occurrence count per token for one piece of text.
    pub fn count(&self, text: &str) -> HashMap<String, u64> {
        let mut counts = HashMap::new();
        for token in self.tokenize(text) {
            *counts.entry(token).or_insert(0) += 1;
        }
        counts
    }

    /// Maps a lookup key to the form the tokenizer stores words in.
    /// Keys that do not reduce to exactly one token have no stored form.
    pub fn normalize_word(&self, word: &str) -> Option<String> {
        let mut tokens = tokenize(word).into_iter();
        match (tokens.next(), tokens.next()) {
            (Some(token), None) => Some(token),
            _ => None,
        }
    }

    fn keeps(&self, token: &str) -> bool {
        token.chars().count() >= self.min_word_length && !self.stop_words.contains(token)
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}
