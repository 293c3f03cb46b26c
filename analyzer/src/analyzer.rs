//! Full and incremental word-frequency runs.
//!
//! Both strategies share [`Tokenizer::count`] for turning a post into counts
//! and differ only in how they write: a full run replaces the counts and
//! markers of its scope in one [`FrequencyStore::replace_counts`] commit, an
//! incremental run merges post by post through the store's atomic
//! [`FrequencyStore::merge_post`].
//!
//! Callers must not run a full run concurrently with any other run over an
//! overlapping scope. Incremental runs may overlap freely.

use crate::store::{FrequencyStore, PostSource};
use crate::tokenizer::Tokenizer;
use redditfreq_core::{
    normalize_subreddit, AnalysisMode, AnalysisRun, CoreError, DataSource, RedditPost, Scope,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Phases one run moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching,
    Tokenizing,
    Merging,
    Persisted,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Fetching => "fetching",
            RunPhase::Tokenizing => "tokenizing",
            RunPhase::Merging => "merging",
            RunPhase::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub mode: AnalysisMode,
    pub scope: Scope,
    /// Counts of `scope` after the run.
    pub counts: HashMap<String, u64>,
    /// Posts that contributed during this run.
    pub posts_processed: usize,
    /// Candidates that already had a marker (incremental runs only).
    pub posts_skipped: usize,
}

pub struct WordFrequencyAnalyzer<D, L, F> {
    database: D,
    files: L,
    store: F,
    tokenizer: Tokenizer,
}

impl<D, L, F> WordFrequencyAnalyzer<D, L, F>
where
    D: PostSource,
    L: PostSource,
    F: FrequencyStore,
{
    pub fn new(database: D, files: L, store: F) -> Self {
        Self {
            database,
            files,
            store,
            tokenizer: Tokenizer::new(),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn store(&self) -> &F {
        &self.store
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Runs one analysis and returns the counts of the filtered scope, or the
    /// global counts when no subreddit filter is given.
    pub async fn analyze_word_frequencies(
        &self,
        data_source: DataSource,
        incremental: bool,
        subreddit: Option<&str>,
    ) -> Result<HashMap<String, u64>, CoreError> {
        let run = AnalysisRun::new(data_source, incremental, subreddit);
        Ok(self.analyze(&run).await?.counts)
    }

    pub async fn analyze(&self, run: &AnalysisRun) -> Result<AnalysisOutcome, CoreError> {
        let scope = run.scope()?;
        info!(
            "Starting {:?} analysis of {} for {}",
            run.mode, run.data_source, scope
        );

        let outcome = match run.mode {
            AnalysisMode::Full => self.run_full(run, scope).await,
            AnalysisMode::Incremental => self.run_incremental(run, scope).await,
        };

        match &outcome {
            Ok(outcome) => {
                enter(RunPhase::Idle);
                info!(
                    "Analysis finished: {} posts processed, {} skipped, {} distinct words in {}",
                    outcome.posts_processed,
                    outcome.posts_skipped,
                    outcome.counts.len(),
                    outcome.scope
                );
            }
            Err(e) => warn!("Analysis of {} did not complete: {}", run.data_source, e),
        }
        outcome
    }

    async fn run_full(
        &self,
        run: &AnalysisRun,
        scope: Scope,
    ) -> Result<AnalysisOutcome, CoreError> {
        enter(RunPhase::Fetching);
        let posts = self.fetch(run, &scope, false).await?;
        if posts.is_empty() {
            return Err(no_data(run, &scope));
        }

        enter(RunPhase::Tokenizing);
        let mut per_subreddit: BTreeMap<String, HashMap<String, u64>> = BTreeMap::new();
        let mut markers = Vec::with_capacity(posts.len());
        for post in &posts {
            let Some(subreddit) = post_subreddit(post) else {
                continue;
            };
            let scope_counts = per_subreddit.entry(subreddit.clone()).or_default();
            for (word, count) in self.tokenizer.count(&post.text()) {
                *scope_counts.entry(word).or_insert(0) += count;
            }
            markers.push((post.id.clone(), subreddit));
        }
        if markers.is_empty() {
            return Err(no_data(run, &scope));
        }

        enter(RunPhase::Merging);
        debug!(
            "Replacing counts of {} subreddits and {} markers in {}",
            per_subreddit.len(),
            markers.len(),
            scope
        );
        self.store
            .replace_counts(&scope, &per_subreddit, &markers)
            .await?;

        enter(RunPhase::Persisted);
        Ok(AnalysisOutcome {
            mode: AnalysisMode::Full,
            counts: self.store.word_counts(&scope).await?,
            scope,
            posts_processed: markers.len(),
            posts_skipped: 0,
        })
    }

    async fn run_incremental(
        &self,
        run: &AnalysisRun,
        scope: Scope,
    ) -> Result<AnalysisOutcome, CoreError> {
        enter(RunPhase::Fetching);
        let candidates = self.fetch(run, &scope, true).await?;
        if candidates.is_empty() && self.is_source_empty(run, &scope).await? {
            return Err(no_data(run, &scope));
        }

        let mut posts_processed = 0;
        let mut posts_skipped = 0;
        for post in &candidates {
            let Some(subreddit) = post_subreddit(post) else {
                continue;
            };
            if self.store.is_processed(&post.id).await? {
                posts_skipped += 1;
                continue;
            }

            enter(RunPhase::Tokenizing);
            let counts = self.tokenizer.count(&post.text());

            enter(RunPhase::Merging);
            if self.store.merge_post(&post.id, &subreddit, &counts).await? {
                posts_processed += 1;
            } else {
                // Another run merged it between the check and the merge.
                posts_skipped += 1;
            }
        }

        enter(RunPhase::Persisted);
        Ok(AnalysisOutcome {
            mode: AnalysisMode::Incremental,
            counts: self.store.word_counts(&scope).await?,
            scope,
            posts_processed,
            posts_skipped,
        })
    }

    /// Posts of every selected source, de-duplicated by id. Database posts
    /// come first and win over file posts with the same id.
    async fn fetch(
        &self,
        run: &AnalysisRun,
        scope: &Scope,
        unprocessed_only: bool,
    ) -> Result<Vec<RedditPost>, CoreError> {
        let subreddit = subreddit_filter(scope);
        let mut posts = Vec::new();

        if run.data_source.includes_database() {
            let batch = if unprocessed_only {
                self.database.get_unprocessed_posts(subreddit).await?
            } else {
                self.database.get_posts_for_analysis(None, subreddit).await?
            };
            debug!("Fetched {} posts from the database", batch.len());
            posts.extend(batch);
        }
        if run.data_source.includes_files() {
            let batch = if unprocessed_only {
                self.files.get_unprocessed_posts(subreddit).await?
            } else {
                self.files.get_posts_for_analysis(None, subreddit).await?
            };
            debug!("Fetched {} posts from files", batch.len());
            posts.extend(batch);
        }

        let mut seen = HashSet::new();
        posts.retain(|post| seen.insert(post.id.clone()));
        Ok(posts)
    }

    async fn is_source_empty(
        &self,
        run: &AnalysisRun,
        scope: &Scope,
    ) -> Result<bool, CoreError> {
        let subreddit = subreddit_filter(scope);
        if run.data_source.includes_database()
            && !self
                .database
                .get_posts_for_analysis(Some(1), subreddit)
                .await?
                .is_empty()
        {
            return Ok(false);
        }
        if run.data_source.includes_files()
            && !self
                .files
                .get_posts_for_analysis(Some(1), subreddit)
                .await?
                .is_empty()
        {
            return Ok(false);
        }
        Ok(true)
    }
}

fn enter(phase: RunPhase) {
    debug!("Analysis phase: {}", phase);
}

fn subreddit_filter(scope: &Scope) -> Option<&str> {
    match scope {
        Scope::Global => None,
        Scope::Subreddit(name) => Some(name.as_str()),
    }
}

fn post_subreddit(post: &RedditPost) -> Option<String> {
    let subreddit = normalize_subreddit(&post.subreddit);
    if subreddit.is_none() {
        warn!(
            "Skipping post {} with invalid subreddit {:?}",
            post.id, post.subreddit
        );
    }
    subreddit
}

fn no_data(run: &AnalysisRun, scope: &Scope) -> CoreError {
    CoreError::NoData {
        data_source: run.data_source,
        scope: scope.to_string(),
    }
}
