//! Read side over the aggregated counts.
//!
//! Rankings are always count descending, then word ascending, so equal
//! counts come back in the same order from every store.

use crate::analyzer::{AnalysisOutcome, WordFrequencyAnalyzer};
use crate::store::{FrequencyStore, PostSource};
use crate::tokenizer::Tokenizer;
use redditfreq_core::{AnalysisSummary, CoreError, Scope, WordDetails};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Count descending, word ascending.
pub fn ranking(a: &(String, u64), b: &(String, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

pub fn rank_words<I>(counts: I) -> Vec<(String, u64)>
where
    I: IntoIterator<Item = (String, u64)>,
{
    let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
    ranked.sort_by(ranking);
    ranked
}

/// The `n` highest ranked words. `n == 0` yields nothing.
pub fn top_n<I>(counts: I, n: usize) -> Vec<(String, u64)>
where
    I: IntoIterator<Item = (String, u64)>,
{
    if n == 0 {
        return Vec::new();
    }
    let mut ranked = rank_words(counts);
    ranked.truncate(n);
    ranked
}

/// Matcher for `search_words`.
///
/// A pattern containing `*` or `?` is a wildcard over the whole word (`*`
/// any run of characters, `?` exactly one). Anything else is a substring
/// match. Matching is on lowercased text, like the stored words.
#[derive(Debug, Clone)]
pub enum WordPattern {
    Substring(String),
    Wildcard(Regex),
}

impl WordPattern {
    pub fn parse(pattern: &str) -> Result<Self, CoreError> {
        let pattern = pattern.trim().to_lowercase();
        if !pattern.contains(['*', '?']) {
            return Ok(WordPattern::Substring(pattern));
        }

        let mut expression = String::from("^");
        for c in pattern.chars() {
            match c {
                '*' => expression.push_str(".*"),
                '?' => expression.push('.'),
                other => expression.push_str(&regex::escape(&other.to_string())),
            }
        }
        expression.push('$');

        let regex = Regex::new(&expression).map_err(|e| CoreError::InvalidInput {
            message: format!("invalid search pattern '{}': {}", pattern, e),
        })?;
        Ok(WordPattern::Wildcard(regex))
    }

    pub fn matches(&self, word: &str) -> bool {
        match self {
            WordPattern::Substring(needle) => !needle.is_empty() && word.contains(needle.as_str()),
            WordPattern::Wildcard(regex) => regex.is_match(word),
        }
    }
}

pub async fn top_words<F: FrequencyStore>(
    store: &F,
    n: usize,
    subreddit: Option<&str>,
) -> Result<Vec<(String, u64)>, CoreError> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let scope = Scope::from_filter(subreddit)?;
    Ok(top_n(store.word_counts(&scope).await?, n))
}

pub async fn search_words<F: FrequencyStore>(
    store: &F,
    pattern: &str,
    subreddit: Option<&str>,
) -> Result<Vec<(String, u64)>, CoreError> {
    let matcher = WordPattern::parse(pattern)?;
    let scope = Scope::from_filter(subreddit)?;
    let counts = store.word_counts(&scope).await?;
    Ok(rank_words(
        counts.into_iter().filter(|(word, _)| matcher.matches(word)),
    ))
}

/// `None` when the word was never counted.
pub async fn get_word_details<F: FrequencyStore>(
    store: &F,
    tokenizer: &Tokenizer,
    word: &str,
) -> Result<Option<WordDetails>, CoreError> {
    let Some(word) = tokenizer.normalize_word(word) else {
        return Ok(None);
    };

    let mut total_count = None;
    let mut per_subreddit = BTreeMap::new();
    for (scope, count) in store.word_breakdown(&word).await? {
        match scope {
            Scope::Global => total_count = Some(count),
            Scope::Subreddit(name) => {
                per_subreddit.insert(name, count);
            }
        }
    }

    let total_count = total_count.unwrap_or_else(|| per_subreddit.values().sum());
    if total_count == 0 {
        return Ok(None);
    }
    Ok(Some(WordDetails {
        word,
        total_count,
        per_subreddit,
    }))
}

pub async fn list_subreddits<F: FrequencyStore>(store: &F) -> Result<Vec<String>, CoreError> {
    let mut subreddits = store.list_subreddit_scopes().await?;
    subreddits.sort();
    subreddits.dedup();
    Ok(subreddits)
}

pub fn summarize(
    counts: &HashMap<String, u64>,
    posts_processed: usize,
    top: usize,
) -> AnalysisSummary {
    AnalysisSummary {
        total_unique_words: counts.len(),
        total_word_occurrences: counts.values().sum(),
        posts_processed,
        top_words: top_n(counts.iter().map(|(w, c)| (w.clone(), *c)), top),
        search_pattern: None,
        search_matches: None,
        word_details: None,
    }
}

impl<D, L, F> WordFrequencyAnalyzer<D, L, F>
where
    D: PostSource,
    L: PostSource,
    F: FrequencyStore,
{
    pub async fn top_words(
        &self,
        n: usize,
        subreddit: Option<&str>,
    ) -> Result<Vec<(String, u64)>, CoreError> {
        top_words(self.store(), n, subreddit).await
    }

    pub async fn search_words(
        &self,
        pattern: &str,
        subreddit: Option<&str>,
    ) -> Result<Vec<(String, u64)>, CoreError> {
        search_words(self.store(), pattern, subreddit).await
    }

    pub async fn get_word_details(&self, word: &str) -> Result<Option<WordDetails>, CoreError> {
        get_word_details(self.store(), self.tokenizer(), word).await
    }

    pub async fn list_subreddits(&self) -> Result<Vec<String>, CoreError> {
        list_subreddits(self.store()).await
    }

    /// Summary of a finished run, optionally with search matches and one
    /// word's details, searched within the run's scope.
    pub async fn summarize_run(
        &self,
        outcome: &AnalysisOutcome,
        top: usize,
        search: Option<&str>,
        word: Option<&str>,
    ) -> Result<AnalysisSummary, CoreError> {
        let mut summary = summarize(&outcome.counts, outcome.posts_processed, top);
        if let Some(pattern) = search {
            let matcher = WordPattern::parse(pattern)?;
            summary.search_pattern = Some(pattern.to_string());
            summary.search_matches = Some(rank_words(
                outcome
                    .counts
                    .iter()
                    .filter(|(w, _)| matcher.matches(w))
                    .map(|(w, c)| (w.clone(), *c)),
            ));
        }
        if let Some(word) = word {
            summary.word_details = self.get_word_details(word).await?;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryFrequencyStore;

    fn pairs(items: &[(&str, u64)]) -> Vec<(String, u64)> {
        items.iter().map(|(w, c)| (w.to_string(), *c)).collect()
    }

    #[test]
    fn test_top_n_tie_break() {
        let counts = pairs(&[("the", 10), ("a", 10), ("cat", 5)]);
        assert_eq!(top_n(counts, 3), pairs(&[("a", 10), ("the", 10), ("cat", 5)]));
    }

    #[test]
    fn test_top_n_bounds() {
        let counts = pairs(&[("x", 1), ("y", 2)]);
        assert!(top_n(counts.clone(), 0).is_empty());
        assert_eq!(top_n(counts.clone(), 1), pairs(&[("y", 2)]));
        assert_eq!(top_n(counts, 10).len(), 2);
    }

    #[test]
    fn test_word_pattern() {
        let substring = WordPattern::parse("RUS").unwrap();
        assert!(substring.matches("rust"));
        assert!(substring.matches("rustacean"));
        assert!(!substring.matches("go"));

        let wildcard = WordPattern::parse("r*t").unwrap();
        assert!(wildcard.matches("rust"));
        assert!(wildcard.matches("rt"));
        assert!(!wildcard.matches("rusty"));

        let single = WordPattern::parse("c?t").unwrap();
        assert!(single.matches("cat"));
        assert!(!single.matches("cart"));

        let dotted = WordPattern::parse("a.*").unwrap();
        assert!(dotted.matches("a.b"));
        assert!(!dotted.matches("ab"));

        assert!(!WordPattern::parse("").unwrap().matches("anything"));
    }

    #[tokio::test]
    async fn test_search_words_ranked() {
        let store = MemoryFrequencyStore::new();
        let mut counts = HashMap::new();
        counts.insert("rust".to_string(), 3);
        counts.insert("trust".to_string(), 3);
        counts.insert("rusty".to_string(), 5);
        counts.insert("go".to_string(), 9);
        store.merge_post("p1", "rust", &counts).await.unwrap();

        let matches = search_words(&store, "rust", None).await.unwrap();
        assert_eq!(matches, pairs(&[("rusty", 5), ("rust", 3), ("trust", 3)]));

        let scoped = search_words(&store, "go", Some("golang")).await.unwrap();
        assert!(scoped.is_empty());
    }

    #[tokio::test]
    async fn test_word_details() {
        let store = MemoryFrequencyStore::new();
        let tokenizer = Tokenizer::new();
        let mut counts = HashMap::new();
        counts.insert("borrow".to_string(), 2);
        store.merge_post("p1", "rust", &counts).await.unwrap();
        store.merge_post("p2", "learnrust", &counts).await.unwrap();

        let details = get_word_details(&store, &tokenizer, "Borrow!")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(details.word, "borrow");
        assert_eq!(details.total_count, 4);
        assert_eq!(details.per_subreddit.get("rust"), Some(&2));
        assert_eq!(details.per_subreddit.get("learnrust"), Some(&2));

        assert!(get_word_details(&store, &tokenizer, "zzznotaword")
            .await
            .unwrap()
            .is_none());
        assert!(get_word_details(&store, &tokenizer, "two words")
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_summarize() {
        let mut counts = HashMap::new();
        counts.insert("a".to_string(), 2);
        counts.insert("b".to_string(), 3);
        let summary = summarize(&counts, 4, 1);
        assert_eq!(summary.total_unique_words, 2);
        assert_eq!(summary.total_word_occurrences, 5);
        assert_eq!(summary.posts_processed, 4);
        assert_eq!(summary.top_words, pairs(&[("b", 3)]));
    }
}
