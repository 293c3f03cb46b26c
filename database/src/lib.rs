//! SQLite persistence for posts, processed markers and word counts.
//!
//! [`Database`] is both the `database` post source and the frequency store
//! of a normal deployment. Every multi-row write runs in one transaction.

use analyzer::{FrequencyStore, PostSource};
use redditfreq_core::{
    normalize_subreddit, CoreError, DatabaseStats, RedditPost, Scope, StorageError,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_POST_LIMIT: usize = 100;

const SELECT_POSTS: &str =
    "SELECT p.id, p.subreddit, p.title, p.content, p.url, p.created_utc FROM posts p";

const INSERT_MARKER: &str =
    "INSERT OR IGNORE INTO processed_posts (post_id, subreddit, processed_at) VALUES (?, ?, ?)";

const UPSERT_WORD_COUNT: &str = "INSERT INTO word_frequencies (word, scope, count) \
     VALUES (?, ?, ?) \
     ON CONFLICT (word, scope) DO UPDATE SET count = count + excluded.count";

#[derive(Debug, Clone)]
pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            pool: None,
        }
    }

    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let in_memory = self.connection_string.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| StorageError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to `:memory:` opens its own database.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(self.pool()?)
            .await
            .map_err(|e| StorageError::MigrationFailed {
                migration: e.to_string(),
            })?;
        debug!("Database migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }

    fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool.as_ref().ok_or_else(|| {
            CoreError::Storage(StorageError::ConnectionFailed {
                reason: "database is not connected".to_string(),
            })
        })
    }

    /// Stores posts handed over by the scraper. Posts already stored are left
    /// untouched. Returns how many posts were new.
    pub async fn save_posts(&self, posts: &[RedditPost]) -> Result<usize, CoreError> {
        let mut tx = self.pool()?.begin().await?;
        let mut inserted = 0;
        for post in posts {
            let subreddit = normalize_subreddit(&post.subreddit)
                .unwrap_or_else(|| post.subreddit.trim().to_lowercase());
            let result = sqlx::query(
                "INSERT OR IGNORE INTO posts (id, subreddit, title, content, url, created_utc) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&post.id)
            .bind(subreddit)
            .bind(&post.title)
            .bind(&post.content)
            .bind(&post.url)
            .bind(post.created_utc)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await.map_err(commit_failed)?;

        info!("Saved {} new posts ({} submitted)", inserted, posts.len());
        Ok(inserted)
    }

    pub async fn save_post(&self, post: &RedditPost) -> Result<bool, CoreError> {
        Ok(self.save_posts(std::slice::from_ref(post)).await? == 1)
    }

    pub async fn get_database_stats(&self) -> Result<DatabaseStats, CoreError> {
        let pool = self.pool()?;
        let total_posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(pool)
            .await?;
        let processed_posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_posts")
            .fetch_one(pool)
            .await?;
        let unique_words: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM word_frequencies WHERE scope = ?")
                .bind(Scope::GLOBAL_KEY)
                .fetch_one(pool)
                .await?;
        let subreddits: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT subreddit FROM posts ORDER BY subreddit")
                .fetch_all(pool)
                .await?;

        Ok(DatabaseStats {
            total_posts: from_db_count(total_posts),
            processed_posts: from_db_count(processed_posts),
            unique_words: from_db_count(unique_words),
            subreddits,
        })
    }

    /// Stored posts for browsing, oldest first. `limit` defaults to
    /// [`DEFAULT_POST_LIMIT`].
    pub async fn list_posts(
        &self,
        subreddit: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<RedditPost>, CoreError> {
        let scope = Scope::from_filter(subreddit)?;
        let subreddit = match &scope {
            Scope::Global => None,
            Scope::Subreddit(name) => Some(name.as_str()),
        };
        self.fetch_posts(false, Some(limit.unwrap_or(DEFAULT_POST_LIMIT)), subreddit)
            .await
    }

    async fn fetch_posts(
        &self,
        unprocessed_only: bool,
        limit: Option<usize>,
        subreddit: Option<&str>,
    ) -> Result<Vec<RedditPost>, CoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_POSTS);
        query.push(" WHERE 1 = 1");
        if unprocessed_only {
            query.push(
                " AND NOT EXISTS (SELECT 1 FROM processed_posts pp WHERE pp.post_id = p.id)",
            );
        }
        if let Some(subreddit) = subreddit {
            query.push(" AND p.subreddit = ").push_bind(subreddit);
        }
        query.push(" ORDER BY p.created_utc, p.id");
        if let Some(limit) = limit {
            query
                .push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = query.build().fetch_all(self.pool()?).await?;
        let posts = rows
            .iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }
}

fn post_from_row(row: &SqliteRow) -> Result<RedditPost, sqlx::Error> {
    Ok(RedditPost {
        id: row.try_get("id")?,
        subreddit: row.try_get("subreddit")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        url: row.try_get("url")?,
        created_utc: row.try_get("created_utc")?,
    })
}

fn to_db_count(count: u64) -> Result<i64, CoreError> {
    i64::try_from(count).map_err(|_| CoreError::InvalidInput {
        message: format!("word count {} does not fit in storage", count),
    })
}

fn from_db_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

impl PostSource for Database {
    async fn get_posts_for_analysis(
        &self,
        limit: Option<usize>,
        subreddit: Option<&str>,
    ) -> Result<Vec<RedditPost>, CoreError> {
        self.fetch_posts(false, limit, subreddit).await
    }

    async fn get_unprocessed_posts(
        &self,
        subreddit: Option<&str>,
    ) -> Result<Vec<RedditPost>, CoreError> {
        self.fetch_posts(true, None, subreddit).await
    }
}

impl FrequencyStore for Database {
    async fn get_word_count(&self, word: &str, scope: &Scope) -> Result<u64, CoreError> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT count FROM word_frequencies WHERE word = ? AND scope = ?")
                .bind(word)
                .bind(scope.as_key())
                .fetch_optional(self.pool()?)
                .await?;
        Ok(count.map(from_db_count).unwrap_or(0))
    }

    async fn increment_word_count(
        &self,
        word: &str,
        scope: &Scope,
        delta: u64,
    ) -> Result<(), CoreError> {
        if delta == 0 {
            return Ok(());
        }
        sqlx::query(UPSERT_WORD_COUNT)
            .bind(word)
            .bind(scope.as_key())
            .bind(to_db_count(delta)?)
            .execute(self.pool()?)
            .await?;
        Ok(())
    }

    async fn overwrite_word_counts(
        &self,
        scope: &Scope,
        counts: &HashMap<String, u64>,
    ) -> Result<(), CoreError> {
        let mut tx = self.pool()?.begin().await?;
        sqlx::query("DELETE FROM word_frequencies WHERE scope = ?")
            .bind(scope.as_key())
            .execute(&mut *tx)
            .await?;
        for (word, count) in counts {
            if *count == 0 {
                continue;
            }
            sqlx::query("INSERT INTO word_frequencies (word, scope, count) VALUES (?, ?, ?)")
                .bind(word)
                .bind(scope.as_key())
                .bind(to_db_count(*count)?)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await.map_err(commit_failed)?;
        Ok(())
    }

    async fn mark_processed(&self, post_id: &str, subreddit: &str) -> Result<bool, CoreError> {
        let result = sqlx::query(INSERT_MARKER)
            .bind(post_id)
            .bind(subreddit)
            .bind(chrono::Utc::now().timestamp())
            .execute(self.pool()?)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn is_processed(&self, post_id: &str) -> Result<bool, CoreError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM processed_posts WHERE post_id = ?")
                .bind(post_id)
                .fetch_optional(self.pool()?)
                .await?;
        Ok(found.is_some())
    }

    async fn list_subreddit_scopes(&self) -> Result<Vec<String>, CoreError> {
        let subreddits: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT subreddit FROM processed_posts ORDER BY subreddit",
        )
        .fetch_all(self.pool()?)
        .await?;
        Ok(subreddits)
    }

    async fn merge_post(
        &self,
        post_id: &str,
        subreddit: &str,
        counts: &HashMap<String, u64>,
    ) -> Result<bool, CoreError> {
        let mut tx = self.pool()?.begin().await?;

        // The marker insert is the first write, so it takes the write lock and
        // decides the race before any count is touched.
        let marker = sqlx::query(INSERT_MARKER)
            .bind(post_id)
            .bind(subreddit)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await?;
        if marker.rows_affected() == 0 {
            tx.rollback().await?;
            debug!("Post {} already merged", post_id);
            return Ok(false);
        }

        for (word, count) in counts {
            if *count == 0 {
                continue;
            }
            let count = to_db_count(*count)?;
            for scope in [subreddit, Scope::GLOBAL_KEY] {
                sqlx::query(UPSERT_WORD_COUNT)
                    .bind(word)
                    .bind(scope)
                    .bind(count)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await.map_err(commit_failed)?;
        Ok(true)
    }

    async fn word_counts(&self, scope: &Scope) -> Result<HashMap<String, u64>, CoreError> {
        let rows = sqlx::query("SELECT word, count FROM word_frequencies WHERE scope = ?")
            .bind(scope.as_key())
            .fetch_all(self.pool()?)
            .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let word: String = row.try_get("word")?;
            let count: i64 = row.try_get("count")?;
            counts.insert(word, from_db_count(count));
        }
        Ok(counts)
    }

    async fn word_breakdown(&self, word: &str) -> Result<Vec<(Scope, u64)>, CoreError> {
        let rows = sqlx::query(
            "SELECT scope, count FROM word_frequencies WHERE word = ? ORDER BY scope",
        )
        .bind(word)
        .fetch_all(self.pool()?)
        .await?;

        let mut breakdown = Vec::with_capacity(rows.len());
        for row in rows {
            let scope: String = row.try_get("scope")?;
            let count: i64 = row.try_get("count")?;
            breakdown.push((Scope::from_key(&scope), from_db_count(count)));
        }
        Ok(breakdown)
    }

    async fn rebuild_global_counts(&self) -> Result<(), CoreError> {
        let mut tx = self.pool()?.begin().await?;
        rebuild_global(&mut *tx).await?;
        tx.commit().await.map_err(commit_failed)?;
        Ok(())
    }

    async fn replace_counts(
        &self,
        scope: &Scope,
        counts: &BTreeMap<String, HashMap<String, u64>>,
        markers: &[(String, String)],
    ) -> Result<(), CoreError> {
        let mut tx = self.pool()?.begin().await?;

        match scope {
            Scope::Global => {
                sqlx::query("DELETE FROM word_frequencies")
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM processed_posts")
                    .execute(&mut *tx)
                    .await?;
            }
            Scope::Subreddit(name) => {
                sqlx::query("DELETE FROM word_frequencies WHERE scope = ?")
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM processed_posts WHERE subreddit = ?")
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for (subreddit, words) in counts {
            for (word, count) in words {
                if *count == 0 {
                    continue;
                }
                sqlx::query(UPSERT_WORD_COUNT)
                    .bind(word)
                    .bind(subreddit)
                    .bind(to_db_count(*count)?)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let processed_at = chrono::Utc::now().timestamp();
        for (post_id, subreddit) in markers {
            sqlx::query(INSERT_MARKER)
                .bind(post_id)
                .bind(subreddit)
                .bind(processed_at)
                .execute(&mut *tx)
                .await?;
        }

        rebuild_global(&mut *tx).await?;
        tx.commit().await.map_err(commit_failed)?;

        info!(
            "Replaced counts of {} with {} subreddits and {} markers",
            scope,
            counts.len(),
            markers.len()
        );
        Ok(())
    }
}

async fn rebuild_global(conn: &mut SqliteConnection) -> Result<(), CoreError> {
    sqlx::query("DELETE FROM word_frequencies WHERE scope = ?")
        .bind(Scope::GLOBAL_KEY)
        .execute(&mut *conn)
        .await?;
    sqlx::query(
        "INSERT INTO word_frequencies (word, scope, count) \
         SELECT word, ?, SUM(count) FROM word_frequencies \
         WHERE scope <> ? GROUP BY word HAVING SUM(count) > 0",
    )
    .bind(Scope::GLOBAL_KEY)
    .bind(Scope::GLOBAL_KEY)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn commit_failed(error: sqlx::Error) -> CoreError {
    CoreError::Storage(StorageError::TransactionFailed {
        reason: error.to_string(),
    })
}
