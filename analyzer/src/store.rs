//! Contracts between the analyzer and its storage collaborators.
//!
//! A [`PostSource`] hands out posts to analyze. A [`FrequencyStore`] holds the
//! per-scope word counts and the processed markers. Implementations live in
//! [`crate::memory`], [`crate::files`] and the `database` crate.

use redditfreq_core::{CoreError, RedditPost, Scope};
use std::collections::{BTreeMap, HashMap};

pub trait PostSource {
    /// Posts matching `subreddit` (a normalized name), in a stable order,
    /// truncated to `limit` when given.
    async fn get_posts_for_analysis(
        &self,
        limit: Option<usize>,
        subreddit: Option<&str>,
    ) -> Result<Vec<RedditPost>, CoreError>;

    /// Posts that have not contributed to the counts yet.
    ///
    /// Sources that cannot see processed markers may return already processed
    /// posts. The analyzer skips those, so this is a narrowing hint and never
    /// the only guard against double counting.
    async fn get_unprocessed_posts(
        &self,
        subreddit: Option<&str>,
    ) -> Result<Vec<RedditPost>, CoreError>;
}

pub trait FrequencyStore {
    /// Count of `word` in `scope`, zero when the word has no row.
    async fn get_word_count(&self, word: &str, scope: &Scope) -> Result<u64, CoreError>;

    /// Adds `delta` to a single `(word, scope)` row. Does not touch any other
    /// scope, so callers keeping the global aggregate in step must use
    /// [`FrequencyStore::merge_post`] instead.
    async fn increment_word_count(
        &self,
        word: &str,
        scope: &Scope,
        delta: u64,
    ) -> Result<(), CoreError>;

    /// Replaces every row of `scope` with `counts`. Zero counts are not stored.
    async fn overwrite_word_counts(
        &self,
        scope: &Scope,
        counts: &HashMap<String, u64>,
    ) -> Result<(), CoreError>;

    /// Records the processed marker. Returns `false` when it already existed.
    async fn mark_processed(&self, post_id: &str, subreddit: &str) -> Result<bool, CoreError>;

    async fn is_processed(&self, post_id: &str) -> Result<bool, CoreError>;

    /// Distinct subreddits with at least one processed post, sorted.
    async fn list_subreddit_scopes(&self) -> Result<Vec<String>, CoreError>;

    /// Atomic check-and-set merge of one post.
    ///
    /// Inserts the marker for `post_id` and adds `counts` to both the
    /// `subreddit` scope and the global scope as one step. When the marker
    /// already exists nothing changes and `false` is returned.
    async fn merge_post(
        &self,
        post_id: &str,
        subreddit: &str,
        counts: &HashMap<String, u64>,
    ) -> Result<bool, CoreError>;

    /// All `(word, count)` rows of `scope`.
    async fn word_counts(&self, scope: &Scope) -> Result<HashMap<String, u64>, CoreError>;

    /// Every scope that has a row for `word`, the global scope included.
    async fn word_breakdown(&self, word: &str) -> Result<Vec<(Scope, u64)>, CoreError>;

    /// Recomputes the global scope as the sum of all subreddit scopes.
    async fn rebuild_global_counts(&self) -> Result<(), CoreError>;

    /// Commits a full recount of `scope` as one step.
    ///
    /// Drops every count row and processed marker of `scope` (all subreddit
    /// scopes and all markers for [`Scope::Global`]), stores `counts` per
    /// subreddit, records `markers` as `(post_id, subreddit)` pairs and
    /// rebuilds the global scope. Either all of it is applied or none of it.
    async fn replace_counts(
        &self,
        scope: &Scope,
        counts: &BTreeMap<String, HashMap<String, u64>>,
        markers: &[(String, String)],
    ) -> Result<(), CoreError>;
}
