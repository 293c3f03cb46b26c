use crate::error::CoreError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    pub created_utc: i64,
}

impl RedditPost {
    /// Text that gets tokenized: the title followed by the self text, if any.
    pub fn text(&self) -> String {
        match self.content.as_deref() {
            Some(body) if !body.is_empty() => format!("{}\n{}", self.title, body),
            _ => self.title.clone(),
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.created_utc, 0).single()
    }
}

/// Normalizes a subreddit name to its scope key.
///
/// Strips whitespace and an `r/` or `/r/` prefix and lowercases the rest.
/// Returns `None` when nothing is left or the name contains characters Reddit
/// does not allow in subreddit names.
pub fn normalize_subreddit(name: &str) -> Option<String> {
    let trimmed = name.trim();
    let lowered = trimmed.to_lowercase();
    let stripped = lowered
        .strip_prefix("/r/")
        .or_else(|| lowered.strip_prefix("r/"))
        .unwrap_or(&lowered);

    if stripped.is_empty() || !stripped.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some(stripped.to_string())
}

/// Partition key for word counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    Global,
    Subreddit(String),
}

impl Scope {
    /// Storage key of the global sentinel. Never a valid subreddit name.
    pub const GLOBAL_KEY: &'static str = "*";

    pub fn subreddit(name: &str) -> Result<Self, CoreError> {
        normalize_subreddit(name)
            .map(Scope::Subreddit)
            .ok_or_else(|| CoreError::InvalidInput {
                message: format!("invalid subreddit name: {:?}", name),
            })
    }

    /// Scope for an optional subreddit filter; no filter means global.
    pub fn from_filter(filter: Option<&str>) -> Result<Self, CoreError> {
        match filter {
            Some(name) => Self::subreddit(name),
            None => Ok(Scope::Global),
        }
    }

    pub fn from_key(key: &str) -> Self {
        if key == Self::GLOBAL_KEY {
            Scope::Global
        } else {
            Scope::Subreddit(key.to_string())
        }
    }

    pub fn as_key(&self) -> &str {
        match self {
            Scope::Global => Self::GLOBAL_KEY,
            Scope::Subreddit(name) => name,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "all subreddits"),
            Scope::Subreddit(name) => write!(f, "r/{}", name),
        }
    }
}

/// Where an analysis run reads its posts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Files,
    Database,
    #[default]
    Both,
}

impl DataSource {
    pub fn includes_database(self) -> bool {
        matches!(self, DataSource::Database | DataSource::Both)
    }

    pub fn includes_files(self) -> bool {
        matches!(self, DataSource::Files | DataSource::Both)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataSource::Files => "files",
            DataSource::Database => "database",
            DataSource::Both => "both",
        };
        f.write_str(name)
    }
}

impl FromStr for DataSource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "files" => Ok(DataSource::Files),
            "database" | "db" => Ok(DataSource::Database),
            "both" => Ok(DataSource::Both),
            other => Err(CoreError::InvalidInput {
                message: format!(
                    "unknown data source '{}', expected files, database or both",
                    other
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Recompute the affected scopes from every matching post.
    Full,
    /// Only count posts that have no processed marker yet.
    Incremental,
}

/// One analyzer invocation. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRun {
    pub mode: AnalysisMode,
    pub data_source: DataSource,
    pub subreddit: Option<String>,
}

impl AnalysisRun {
    pub fn new(data_source: DataSource, incremental: bool, subreddit: Option<&str>) -> Self {
        Self {
            mode: if incremental {
                AnalysisMode::Incremental
            } else {
                AnalysisMode::Full
            },
            data_source,
            subreddit: subreddit.map(str::to_string),
        }
    }

    pub fn full(data_source: DataSource) -> Self {
        Self::new(data_source, false, None)
    }

    pub fn incremental(data_source: DataSource) -> Self {
        Self::new(data_source, true, None)
    }

    pub fn scope(&self) -> Result<Scope, CoreError> {
        Scope::from_filter(self.subreddit.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordDetails {
    pub word: String,
    pub total_count: u64,
    pub per_subreddit: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_unique_words: usize,
    pub total_word_occurrences: u64,
    pub posts_processed: usize,
    pub top_words: Vec<(String, u64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_matches: Option<Vec<(String, u64)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_details: Option<WordDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub total_posts: u64,
    pub processed_posts: u64,
    pub unique_words: u64,
    pub subreddits: Vec<String>,
}
