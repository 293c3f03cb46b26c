#[cfg(test)]
mod tests {
    use crate::{
        FrequencyStore, MemoryFrequencyStore, MemoryPostSource, Tokenizer, WordFrequencyAnalyzer,
    };
    use redditfreq_core::{AnalysisRun, CoreError, DataSource, RedditPost, Scope, StorageError};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type MemoryAnalyzer =
        WordFrequencyAnalyzer<MemoryPostSource, MemoryPostSource, MemoryFrequencyStore>;

    fn post(id: &str, subreddit: &str, title: &str, created_utc: i64) -> RedditPost {
        RedditPost {
            id: id.to_string(),
            title: title.to_string(),
            content: None,
            subreddit: subreddit.to_string(),
            url: format!("https://reddit.com/r/{}/comments/{}", subreddit, id),
            created_utc,
        }
    }

    fn corpus() -> Vec<RedditPost> {
        vec![
            post("p1", "rust", "The borrow checker is the best", 1),
            post("p2", "rust", "Async Rust: the good parts", 2),
            post("p3", "golang", "The Go scheduler", 3),
            post("p4", "AskReddit", "What is the best language?", 4),
        ]
    }

    fn analyzer_with(posts: Vec<RedditPost>) -> (MemoryAnalyzer, MemoryPostSource) {
        let database = MemoryPostSource::with_posts(posts);
        let analyzer = WordFrequencyAnalyzer::new(
            database.clone(),
            MemoryPostSource::new(),
            MemoryFrequencyStore::new(),
        );
        (analyzer, database)
    }

    /// Fails every `merge_post` and `replace_counts` after the first
    /// `allowed` successful ones.
    #[derive(Debug, Clone)]
    struct FlakyStore {
        inner: MemoryFrequencyStore,
        allowed: usize,
        writes: std::sync::Arc<AtomicUsize>,
    }

    impl FlakyStore {
        fn new(allowed: usize) -> Self {
            Self {
                inner: MemoryFrequencyStore::new(),
                allowed,
                writes: Default::default(),
            }
        }

        fn write(&self) -> Result<(), CoreError> {
            if self.writes.load(Ordering::SeqCst) >= self.allowed {
                return Err(CoreError::Storage(StorageError::Unavailable {
                    reason: "store went away".to_string(),
                }));
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl FrequencyStore for FlakyStore {
        async fn get_word_count(&self, word: &str, scope: &Scope) -> Result<u64, CoreError> {
            self.inner.get_word_count(word, scope).await
        }

        async fn increment_word_count(
            &self,
            word: &str,
            scope: &Scope,
            delta: u64,
        ) -> Result<(), CoreError> {
            self.inner.increment_word_count(word, scope, delta).await
        }

        async fn overwrite_word_counts(
            &self,
            scope: &Scope,
            counts: &HashMap<String, u64>,
        ) -> Result<(), CoreError> {
            self.inner.overwrite_word_counts(scope, counts).await
        }

        async fn mark_processed(&self, post_id: &str, subreddit: &str) -> Result<bool, CoreError> {
            self.inner.mark_processed(post_id, subreddit).await
        }

        async fn is_processed(&self, post_id: &str) -> Result<bool, CoreError> {
            self.inner.is_processed(post_id).await
        }

        async fn list_subreddit_scopes(&self) -> Result<Vec<String>, CoreError> {
            self.inner.list_subreddit_scopes().await
        }

        async fn merge_post(
            &self,
            post_id: &str,
            subreddit: &str,
            counts: &HashMap<String, u64>,
        ) -> Result<bool, CoreError> {
            self.write()?;
            self.inner.merge_post(post_id, subreddit, counts).await
        }

        async fn word_counts(&self, scope: &Scope) -> Result<HashMap<String, u64>, CoreError> {
            self.inner.word_counts(scope).await
        }

        async fn word_breakdown(&self, word: &str) -> Result<Vec<(Scope, u64)>, CoreError> {
            self.inner.word_breakdown(word).await
        }

        async fn rebuild_global_counts(&self) -> Result<(), CoreError> {
            self.inner.rebuild_global_counts().await
        }

        async fn replace_counts(
            &self,
            scope: &Scope,
            counts: &BTreeMap<String, HashMap<String, u64>>,
            markers: &[(String, String)],
        ) -> Result<(), CoreError> {
            self.write()?;
            self.inner.replace_counts(scope, counts, markers).await
        }
    }

    #[tokio::test]
    async fn test_full_run_counts_every_post() {
        let (analyzer, _) = analyzer_with(corpus());

        let counts = analyzer
            .analyze_word_frequencies(DataSource::Database, false, None)
            .await
            .unwrap();

        assert_eq!(counts.get("the"), Some(&5));
        assert_eq!(counts.get("best"), Some(&2));
        assert_eq!(counts.get("rust"), Some(&1));
        assert_eq!(analyzer.store().processed_count().await, 4);

        let rust = analyzer
            .store()
            .word_counts(&Scope::Subreddit("rust".to_string()))
            .await
            .unwrap();
        assert_eq!(rust.get("the"), Some(&3));
    }

    #[tokio::test]
    async fn test_full_run_on_empty_corpus_is_no_data() {
        let (analyzer, _) = analyzer_with(Vec::new());

        let err = analyzer
            .analyze_word_frequencies(DataSource::Both, false, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::NoData {
                data_source: DataSource::Both,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_incremental_on_empty_source_is_no_data() {
        let (analyzer, _) = analyzer_with(Vec::new());
        let err = analyzer
            .analyze_word_frequencies(DataSource::Database, true, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoData { .. }));
    }

    #[tokio::test]
    async fn test_incremental_is_idempotent() {
        let (analyzer, _) = analyzer_with(corpus());

        let first = analyzer
            .analyze_word_frequencies(DataSource::Database, true, None)
            .await
            .unwrap();
        let snapshot = analyzer.store().snapshot().await;

        let run = AnalysisRun::incremental(DataSource::Database);
        let outcome = analyzer.analyze(&run).await.unwrap();

        assert_eq!(outcome.counts, first);
        assert_eq!(outcome.posts_processed, 0);
        assert_eq!(outcome.posts_skipped, 4);
        assert_eq!(analyzer.store().snapshot().await, snapshot);
    }

    #[tokio::test]
    async fn test_incremental_counts_only_new_posts() {
        let (analyzer, database) = analyzer_with(corpus());
        analyzer
            .analyze_word_frequencies(DataSource::Database, true, None)
            .await
            .unwrap();

        database
            .add_post(post("p5", "rust", "The compiler is the mentor", 5))
            .await;
        let run = AnalysisRun::incremental(DataSource::Database);
        let outcome = analyzer.analyze(&run).await.unwrap();

        assert_eq!(outcome.posts_processed, 1);
        assert_eq!(outcome.counts.get("the"), Some(&7));
        assert_eq!(outcome.counts.get("compiler"), Some(&1));

        for _ in 0..3 {
            analyzer.analyze(&run).await.unwrap();
        }
        let the = analyzer
            .store()
            .get_word_count("the", &Scope::Global)
            .await
            .unwrap();
        assert_eq!(the, 7);
    }

    #[tokio::test]
    async fn test_full_and_incremental_agree() {
        let (full, _) = analyzer_with(corpus());
        full.analyze_word_frequencies(DataSource::Database, false, None)
            .await
            .unwrap();

        let (incremental, database) = analyzer_with(Vec::new());
        for post in corpus() {
            database.add_post(post).await;
            incremental
                .analyze_word_frequencies(DataSource::Database, true, None)
                .await
                .unwrap();
        }

        assert_eq!(
            full.store().snapshot().await,
            incremental.store().snapshot().await
        );
        assert_eq!(
            full.list_subreddits().await.unwrap(),
            incremental.list_subreddits().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_global_is_sum_of_subreddits() {
        let (analyzer, _) = analyzer_with(corpus());
        analyzer
            .analyze_word_frequencies(DataSource::Database, true, None)
            .await
            .unwrap();

        let store = analyzer.store();
        let global = store.word_counts(&Scope::Global).await.unwrap();
        let mut summed: HashMap<String, u64> = HashMap::new();
        for subreddit in store.list_subreddit_scopes().await.unwrap() {
            for (word, count) in store
                .word_counts(&Scope::Subreddit(subreddit))
                .await
                .unwrap()
            {
                *summed.entry(word).or_insert(0) += count;
            }
        }
        assert_eq!(global, summed);
    }

    #[tokio::test]
    async fn test_incremental_with_subreddit_filter() {
        let (analyzer, _) = analyzer_with(corpus());

        let counts = analyzer
            .analyze_word_frequencies(DataSource::Database, true, Some("r/Rust"))
            .await
            .unwrap();

        assert_eq!(counts.get("the"), Some(&3));
        assert_eq!(counts.get("go"), None);
        assert_eq!(analyzer.list_subreddits().await.unwrap(), vec!["rust"]);

        let global = analyzer.top_words(100, None).await.unwrap();
        assert!(global.iter().all(|(word, _)| word != "scheduler"));
    }

    #[tokio::test]
    async fn test_full_run_with_filter_leaves_other_scopes() {
        let (analyzer, _) = analyzer_with(corpus());
        analyzer
            .analyze_word_frequencies(DataSource::Database, true, None)
            .await
            .unwrap();

        let rust = Scope::Subreddit("rust".to_string());
        analyzer
            .store()
            .increment_word_count("drift", &rust, 42)
            .await
            .unwrap();

        let counts = analyzer
            .analyze_word_frequencies(DataSource::Database, false, Some("rust"))
            .await
            .unwrap();
        assert_eq!(counts.get("drift"), None);
        assert_eq!(counts.get("the"), Some(&3));

        let store = analyzer.store();
        assert_eq!(store.get_word_count("drift", &Scope::Global).await.unwrap(), 0);
        assert_eq!(
            store
                .get_word_count("scheduler", &Scope::Subreddit("golang".to_string()))
                .await
                .unwrap(),
            1
        );
        assert_eq!(store.get_word_count("the", &Scope::Global).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_full_run_clears_scopes_without_posts() {
        let (analyzer, _) = analyzer_with(corpus());
        analyzer
            .store()
            .merge_post("gone", "oldsub", &HashMap::from([("ghost".to_string(), 3)]))
            .await
            .unwrap();

        analyzer
            .analyze_word_frequencies(DataSource::Database, false, None)
            .await
            .unwrap();

        let store = analyzer.store();
        assert_eq!(
            store
                .get_word_count("ghost", &Scope::Subreddit("oldsub".to_string()))
                .await
                .unwrap(),
            0
        );
        assert_eq!(store.get_word_count("ghost", &Scope::Global).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_incremental_after_full_does_not_recount() {
        let (analyzer, _) = analyzer_with(corpus());
        let full = analyzer
            .analyze_word_frequencies(DataSource::Database, false, None)
            .await
            .unwrap();
        let incremental = analyzer
            .analyze_word_frequencies(DataSource::Database, true, None)
            .await
            .unwrap();
        assert_eq!(full, incremental);
    }

    #[tokio::test]
    async fn test_both_sources_deduplicate_by_id() {
        let database = MemoryPostSource::with_posts(corpus());
        let files = MemoryPostSource::with_posts(vec![
            post("p1", "rust", "A different copy of p1", 1),
            post("f1", "rust", "Only in files", 9),
        ]);
        let analyzer =
            WordFrequencyAnalyzer::new(database, files, MemoryFrequencyStore::new());

        let counts = analyzer
            .analyze_word_frequencies(DataSource::Both, false, None)
            .await
            .unwrap();
        assert_eq!(counts.get("different"), None);
        assert_eq!(counts.get("files"), Some(&1));
        assert_eq!(counts.get("borrow"), Some(&1));

        let files_only = analyzer
            .analyze_word_frequencies(DataSource::Files, false, None)
            .await
            .unwrap();
        assert_eq!(files_only.get("borrow"), None);
        assert_eq!(files_only.get("different"), Some(&1));
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_merged_posts() {
        let database = MemoryPostSource::with_posts(corpus());
        let analyzer = WordFrequencyAnalyzer::new(
            database.clone(),
            MemoryPostSource::new(),
            FlakyStore::new(2),
        );

        let err = analyzer
            .analyze_word_frequencies(DataSource::Database, true, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Storage(StorageError::Unavailable { .. })
        ));
        assert!(analyzer.store().is_processed("p1").await.unwrap());
        assert!(analyzer.store().is_processed("p2").await.unwrap());
        assert!(!analyzer.store().is_processed("p3").await.unwrap());

        // Resume against the same state with a healthy store.
        let resumed = WordFrequencyAnalyzer::new(
            database,
            MemoryPostSource::new(),
            analyzer.store().inner.clone(),
        );
        let counts = resumed
            .analyze_word_frequencies(DataSource::Database, true, None)
            .await
            .unwrap();

        let (reference, _) = analyzer_with(corpus());
        let expected = reference
            .analyze_word_frequencies(DataSource::Database, false, None)
            .await
            .unwrap();
        assert_eq!(counts, expected);
    }

    #[tokio::test]
    async fn test_failed_full_run_leaves_store_untouched() {
        let database = MemoryPostSource::with_posts(vec![post("p1", "rust", "alpha", 1)]);
        let analyzer = WordFrequencyAnalyzer::new(
            database.clone(),
            MemoryPostSource::new(),
            FlakyStore::new(1),
        );
        analyzer
            .analyze_word_frequencies(DataSource::Database, true, None)
            .await
            .unwrap();
        let before = analyzer.store().inner.snapshot().await;

        database.add_post(post("p2", "rust", "alpha", 2)).await;
        let err = analyzer
            .analyze_word_frequencies(DataSource::Database, false, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Storage(StorageError::Unavailable { .. })
        ));
        assert_eq!(analyzer.store().inner.snapshot().await, before);
        assert!(!analyzer.store().is_processed("p2").await.unwrap());

        let resumed = WordFrequencyAnalyzer::new(
            database,
            MemoryPostSource::new(),
            analyzer.store().inner.clone(),
        );
        let counts = resumed
            .analyze_word_frequencies(DataSource::Database, true, None)
            .await
            .unwrap();
        assert_eq!(counts, HashMap::from([("alpha".to_string(), 2)]));
    }

    #[tokio::test]
    async fn test_full_run_over_narrower_source_resets_markers() {
        let database = MemoryPostSource::with_posts(vec![post("d1", "rust", "dbword", 1)]);
        let files = MemoryPostSource::with_posts(vec![post("f1", "rust", "fileword", 2)]);
        let analyzer = WordFrequencyAnalyzer::new(database, files, MemoryFrequencyStore::new());

        analyzer
            .analyze_word_frequencies(DataSource::Both, true, None)
            .await
            .unwrap();
        let files_only = analyzer
            .analyze_word_frequencies(DataSource::Files, false, None)
            .await
            .unwrap();
        assert_eq!(files_only, HashMap::from([("fileword".to_string(), 1)]));
        assert!(!analyzer.store().is_processed("d1").await.unwrap());

        let counts = analyzer
            .analyze_word_frequencies(DataSource::Both, true, None)
            .await
            .unwrap();
        let expected = HashMap::from([("fileword".to_string(), 1), ("dbword".to_string(), 1)]);
        assert_eq!(counts, expected);
        assert_eq!(
            analyzer
                .analyze_word_frequencies(DataSource::Both, false, None)
                .await
                .unwrap(),
            expected
        );
    }

    #[tokio::test]
    async fn test_full_run_without_valid_subreddits_is_no_data() {
        let (analyzer, _) = analyzer_with(vec![post("x1", "not a sub", "words here", 1)]);
        analyzer
            .store()
            .merge_post("kept", "rust", &HashMap::from([("kept".to_string(), 1)]))
            .await
            .unwrap();

        let err = analyzer
            .analyze_word_frequencies(DataSource::Database, false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoData { .. }));
        assert_eq!(
            analyzer
                .store()
                .get_word_count("kept", &Scope::Global)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_concurrent_incremental_runs_do_not_double_count() {
        let (analyzer, _) = analyzer_with(corpus());
        let run = AnalysisRun::incremental(DataSource::Database);

        let (a, b) = tokio::join!(analyzer.analyze(&run), analyzer.analyze(&run));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.posts_processed + b.posts_processed, 4);

        let the = analyzer
            .store()
            .get_word_count("the", &Scope::Global)
            .await
            .unwrap();
        assert_eq!(the, 5);
    }

    #[tokio::test]
    async fn test_shared_store_across_analyzers() {
        let store = MemoryFrequencyStore::new();
        let database = MemoryPostSource::with_posts(corpus());
        let first = WordFrequencyAnalyzer::new(
            database.clone(),
            MemoryPostSource::new(),
            store.clone(),
        );
        let second = WordFrequencyAnalyzer::new(database, MemoryPostSource::new(), store.clone());

        let run = AnalysisRun::incremental(DataSource::Database);
        let handle_a = first.analyze(&run);
        let handle_b = second.analyze(&run);
        let (a, b) = tokio::join!(handle_a, handle_b);
        assert_eq!(a.unwrap().posts_processed + b.unwrap().posts_processed, 4);
        assert_eq!(store.processed_count().await, 4);
        assert_eq!(
            store.get_word_count("best", &Scope::Global).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_queries_after_run() {
        let (analyzer, _) = analyzer_with(corpus());
        analyzer
            .analyze_word_frequencies(DataSource::Database, true, None)
            .await
            .unwrap();

        let top = analyzer.top_words(2, None).await.unwrap();
        assert_eq!(
            top,
            vec![("the".to_string(), 5), ("best".to_string(), 2)]
        );
        assert!(analyzer.top_words(0, None).await.unwrap().is_empty());

        let scoped = analyzer.top_words(1, Some("golang")).await.unwrap();
        assert_eq!(scoped, vec![("go".to_string(), 1)]);

        let matches = analyzer.search_words("b*", None).await.unwrap();
        assert_eq!(
            matches,
            vec![("best".to_string(), 2), ("borrow".to_string(), 1)]
        );

        let details = analyzer.get_word_details("THE").await.unwrap().unwrap();
        assert_eq!(details.total_count, 5);
        assert_eq!(details.per_subreddit.get("rust"), Some(&3));
        assert_eq!(details.per_subreddit.get("askreddit"), Some(&1));
        assert!(analyzer
            .get_word_details("zzznotaword")
            .await
            .unwrap()
            .is_none());

        assert_eq!(
            analyzer.list_subreddits().await.unwrap(),
            vec!["askreddit", "golang", "rust"]
        );
    }

    #[tokio::test]
    async fn test_summary_of_run() {
        let (analyzer, _) = analyzer_with(corpus());
        let outcome = analyzer
            .analyze(&AnalysisRun::full(DataSource::Database))
            .await
            .unwrap();

        let summary = analyzer
            .summarize_run(&outcome, 1, Some("rust"), Some("borrow"))
            .await
            .unwrap();
        assert_eq!(summary.posts_processed, 4);
        assert_eq!(summary.total_unique_words, outcome.counts.len());
        assert_eq!(summary.top_words, vec![("the".to_string(), 5)]);
        assert_eq!(
            summary.search_matches,
            Some(vec![("rust".to_string(), 1)])
        );
        assert_eq!(summary.word_details.unwrap().total_count, 1);
    }

    #[tokio::test]
    async fn test_tokenizer_filters_apply_to_runs() {
        let (analyzer, _) = analyzer_with(corpus());
        let analyzer = analyzer.with_tokenizer(
            Tokenizer::new()
                .with_min_word_length(3)
                .with_stop_words(["the"]),
        );

        let counts = analyzer
            .analyze_word_frequencies(DataSource::Database, false, None)
            .await
            .unwrap();
        assert_eq!(counts.get("the"), None);
        assert_eq!(counts.get("is"), None);
        assert_eq!(counts.get("best"), Some(&2));
    }

    #[tokio::test]
    async fn test_invalid_subreddit_filter() {
        let (analyzer, _) = analyzer_with(corpus());
        let err = analyzer
            .analyze_word_frequencies(DataSource::Database, true, Some("not a sub"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { .. }));
    }
}
