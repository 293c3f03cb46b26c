use crate::store::{FrequencyStore, PostSource};
use redditfreq_core::{normalize_subreddit, CoreError, RedditPost, Scope};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct FrequencyState {
    counts: HashMap<Scope, HashMap<String, u64>>,
    /// post id -> normalized subreddit
    processed: HashMap<String, String>,
}

impl FrequencyState {
    fn add(&mut self, word: &str, scope: &Scope, delta: u64) {
        if delta == 0 {
            return;
        }
        *self
            .counts
            .entry(scope.clone())
            .or_default()
            .entry(word.to_string())
            .or_insert(0) += delta;
    }

    fn rebuild_global(&mut self) {
        let mut global: HashMap<String, u64> = HashMap::new();
        for (scope, counts) in &self.counts {
            if scope.is_global() {
                continue;
            }
            for (word, count) in counts {
                *global.entry(word.clone()).or_insert(0) += count;
            }
        }

        if global.is_empty() {
            self.counts.remove(&Scope::Global);
        } else {
            self.counts.insert(Scope::Global, global);
        }
    }
}

/// In-process frequency store. Clones share the same state.
///
/// Every mutation holds the write lock for its whole duration, which is what
/// makes [`FrequencyStore::merge_post`] a single check-and-set step.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrequencyStore {
    state: Arc<RwLock<FrequencyState>>,
}

impl MemoryFrequencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every scope's counts, for comparing store states.
    pub async fn snapshot(&self) -> HashMap<Scope, HashMap<String, u64>> {
        self.state.read().await.counts.clone()
    }

    pub async fn processed_count(&self) -> usize {
        self.state.read().await.processed.len()
    }
}

impl FrequencyStore for MemoryFrequencyStore {
    async fn get_word_count(&self, word: &str, scope: &Scope) -> Result<u64, CoreError> {
        let state = self.state.read().await;
        Ok(state
            .counts
            .get(scope)
            .and_then(|counts| counts.get(word))
            .copied()
            .unwrap_or(0))
    }

    async fn increment_word_count(
        &self,
        word: &str,
        scope: &Scope,
        delta: u64,
    ) -> Result<(), CoreError> {
        self.state.write().await.add(word, scope, delta);
        Ok(())
    }

    async fn overwrite_word_counts(
        &self,
        scope: &Scope,
        counts: &HashMap<String, u64>,
    ) -> Result<(), CoreError> {
        let retained: HashMap<String, u64> = counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(word, count)| (word.clone(), *count))
            .collect();

        let mut state = self.state.write().await;
        if retained.is_empty() {
            state.counts.remove(scope);
        } else {
            state.counts.insert(scope.clone(), retained);
        }
        Ok(())
    }

    async fn mark_processed(&self, post_id: &str, subreddit: &str) -> Result<bool, CoreError> {
        let mut state = self.state.write().await;
        if state.processed.contains_key(post_id) {
            return Ok(false);
        }
        state
            .processed
            .insert(post_id.to_string(), subreddit.to_string());
        Ok(true)
    }

    async fn is_processed(&self, post_id: &str) -> Result<bool, CoreError> {
        Ok(self.state.read().await.processed.contains_key(post_id))
    }

    async fn list_subreddit_scopes(&self) -> Result<Vec<String>, CoreError> {
        let state = self.state.read().await;
        let scopes: BTreeSet<&String> = state.processed.values().collect();
        Ok(scopes.into_iter().cloned().collect())
    }

    async fn merge_post(
        &self,
        post_id: &str,
        subreddit: &str,
        counts: &HashMap<String, u64>,
    ) -> Result<bool, CoreError> {
        let mut state = self.state.write().await;
        if state.processed.contains_key(post_id) {
            return Ok(false);
        }
        state
            .processed
            .insert(post_id.to_string(), subreddit.to_string());

        let scope = Scope::Subreddit(subreddit.to_string());
        for (word, count) in counts {
            state.add(word, &scope, *count);
            state.add(word, &Scope::Global, *count);
        }
        Ok(true)
    }

    async fn word_counts(&self, scope: &Scope) -> Result<HashMap<String, u64>, CoreError> {
        let state = self.state.read().await;
        Ok(state.counts.get(scope).cloned().unwrap_or_default())
    }

    async fn word_breakdown(&self, word: &str) -> Result<Vec<(Scope, u64)>, CoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<(Scope, u64)> = state
            .counts
            .iter()
            .filter_map(|(scope, counts)| counts.get(word).map(|count| (scope.clone(), *count)))
            .collect();
        rows.sort();
        Ok(rows)
    }

    async fn rebuild_global_counts(&self) -> Result<(), CoreError> {
        self.state.write().await.rebuild_global();
        Ok(())
    }

    async fn replace_counts(
        &self,
        scope: &Scope,
        counts: &BTreeMap<String, HashMap<String, u64>>,
        markers: &[(String, String)],
    ) -> Result<(), CoreError> {
        let mut state = self.state.write().await;
        match scope {
            Scope::Global => {
                state.counts.clear();
                state.processed.clear();
            }
            Scope::Subreddit(name) => {
                state.counts.remove(scope);
                state.processed.retain(|_, subreddit| *subreddit != *name);
            }
        }

        for (subreddit, words) in counts {
            let subreddit_scope = Scope::Subreddit(subreddit.clone());
            for (word, count) in words {
                state.add(word, &subreddit_scope, *count);
            }
        }
        for (post_id, subreddit) in markers {
            state.processed.insert(post_id.clone(), subreddit.clone());
        }
        state.rebuild_global();
        Ok(())
    }
}

/// In-process post source. Clones share the same posts.
#[derive(Debug, Clone, Default)]
pub struct MemoryPostSource {
    posts: Arc<RwLock<Vec<RedditPost>>>,
}

impl MemoryPostSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(posts: Vec<RedditPost>) -> Self {
        Self {
            posts: Arc::new(RwLock::new(posts)),
        }
    }

    pub async fn add_post(&self, post: RedditPost) {
        self.posts.write().await.push(post);
    }

    pub async fn add_posts<I>(&self, posts: I)
    where
        I: IntoIterator<Item = RedditPost>,
    {
        self.posts.write().await.extend(posts);
    }

    pub async fn len(&self) -> usize {
        self.posts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.posts.read().await.is_empty()
    }
}

pub(crate) fn matches_subreddit(post: &RedditPost, subreddit: Option<&str>) -> bool {
    match subreddit {
        Some(filter) => normalize_subreddit(&post.subreddit).as_deref() == Some(filter),
        None => true,
    }
}

impl PostSource for MemoryPostSource {
    async fn get_posts_for_analysis(
        &self,
        limit: Option<usize>,
        subreddit: Option<&str>,
    ) -> Result<Vec<RedditPost>, CoreError> {
        let posts = self.posts.read().await;
        Ok(posts
            .iter()
            .filter(|post| matches_subreddit(post, subreddit))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn get_unprocessed_posts(
        &self,
        subreddit: Option<&str>,
    ) -> Result<Vec<RedditPost>, CoreError> {
        // No marker visibility here; the analyzer filters processed posts.
        self.get_posts_for_analysis(None, subreddit).await
    }
}
