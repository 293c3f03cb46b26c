//! Post source over the scraper's JSON output directory.
//!
//! Each `*.json` file holds either an array of posts or an object with a
//! `posts` array. A missing directory means nothing has been scraped yet and
//! reads as an empty source.

use crate::memory::matches_subreddit;
use crate::store::PostSource;
use redditfreq_core::{CoreError, RedditPost, StorageError};
use serde::Deserialize;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Deserialize)]
#[serde(untagged)]
enum PostFile {
    List(Vec<RedditPost>),
    Wrapped { posts: Vec<RedditPost> },
}

impl PostFile {
    fn into_posts(self) -> Vec<RedditPost> {
        match self {
            PostFile::List(posts) | PostFile::Wrapped { posts } => posts,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilePostSource {
    data_dir: PathBuf,
}

impl FilePostSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Every post in the directory, oldest first, first occurrence of an id
    /// winning.
    pub async fn load_posts(&self) -> Result<Vec<RedditPost>, CoreError> {
        let mut paths = match self.json_files().await {
            Ok(paths) => paths,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    "Post directory {} does not exist yet",
                    self.data_dir.display()
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(file_error(&self.data_dir, e.to_string())),
        };
        paths.sort();

        let mut seen = HashSet::new();
        let mut posts = Vec::new();
        for path in paths {
            let file_posts = read_post_file(&path).await?;
            debug!("Read {} posts from {}", file_posts.len(), path.display());
            for post in file_posts {
                if seen.insert(post.id.clone()) {
                    posts.push(post);
                } else {
                    warn!("Skipping duplicate post {} in {}", post.id, path.display());
                }
            }
        }

        posts.sort_by(|a, b| {
            a.created_utc
                .cmp(&b.created_utc)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(posts)
    }

    async fn json_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.data_dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if is_json && entry.file_type().await?.is_file() {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

/// Reads one scraped post file in either supported layout.
pub async fn read_post_file(path: &Path) -> Result<Vec<RedditPost>, CoreError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| file_error(path, e.to_string()))?;
    let file: PostFile =
        serde_json::from_str(&contents).map_err(|e| file_error(path, e.to_string()))?;
    Ok(file.into_posts())
}

fn file_error(path: &Path, reason: String) -> CoreError {
    CoreError::Storage(StorageError::FileSource {
        path: path.display().to_string(),
        reason,
    })
}

impl PostSource for FilePostSource {
    async fn get_posts_for_analysis(
        &self,
        limit: Option<usize>,
        subreddit: Option<&str>,
    ) -> Result<Vec<RedditPost>, CoreError> {
        Ok(self
            .load_posts()
            .await?
            .into_iter()
            .filter(|post| matches_subreddit(post, subreddit))
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn get_unprocessed_posts(
        &self,
        subreddit: Option<&str>,
    ) -> Result<Vec<RedditPost>, CoreError> {
        // Files carry no markers; the analyzer filters processed posts.
        self.get_posts_for_analysis(None, subreddit).await
    }
}
