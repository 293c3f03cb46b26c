//! Analyzer configuration loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working setup backed by `redditfreq.db` and `data/scraped`.

use crate::error::{ConfigError, CoreError};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DATABASE_URL_ENV: &str = "REDDITFREQ_DATABASE_URL";
pub const DATA_DIR_ENV: &str = "REDDITFREQ_DATA_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerConfig {
    pub database_url: String,
    /// Directory of scraped JSON post files used by the `files` data source.
    pub data_dir: PathBuf,
    pub default_top_n: usize,
    pub log_filter: String,
    pub tokenizer: TokenizerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TokenizerConfig {
    /// Tokens shorter than this many characters are dropped.
    pub min_word_length: usize,
    pub stop_words: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://redditfreq.db".to_string(),
            data_dir: PathBuf::from("data/scraped"),
            default_top_n: 50,
            log_filter: "redditfreq=info,analyzer=info,database=info".to_string(),
            tokenizer: TokenizerConfig::default(),
        }
    }
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            min_word_length: 1,
            stop_words: Vec::new(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, CoreError> {
        let config: AnalyzerConfig = toml::from_str(contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the file at `path`, applies environment overrides and validates.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CoreError::Config(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }),
            ErrorKind::PermissionDenied => CoreError::Config(ConfigError::PermissionDenied {
                path: path.display().to_string(),
            }),
            _ => CoreError::Io(e),
        })?;

        let mut config: AnalyzerConfig =
            toml::from_str(&contents).map_err(ConfigError::Parse)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads `path` when given, otherwise starts from defaults. Environment
    /// overrides apply either way.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, CoreError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Self::default();
                config.apply_overrides(|key| std::env::var(key).ok());
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(DATABASE_URL_ENV) {
            self.database_url = url;
        }
        if let Some(dir) = lookup(DATA_DIR_ENV) {
            self.data_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "database_url".to_string(),
            });
        }
        if !self.database_url.starts_with("sqlite:") {
            return Err(ConfigError::InvalidValue {
                field: "database_url".to_string(),
                value: self.database_url.clone(),
            });
        }
        if self.tokenizer.min_word_length == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "tokenizer.min_word_length must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AnalyzerConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.tokenizer.min_word_length, 1);
        assert!(config.tokenizer.stop_words.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let config = AnalyzerConfig::from_toml_str(
            r#"
            database_url = "sqlite://analysis.db"
            data_dir = "scraped"
            default_top_n = 10

            [tokenizer]
            min_word_length = 3
            stop_words = ["the", "and"]
            "#,
        )
        .unwrap();

        assert_eq!(config.database_url, "sqlite://analysis.db");
        assert_eq!(config.data_dir, PathBuf::from("scraped"));
        assert_eq!(config.default_top_n, 10);
        assert_eq!(config.tokenizer.min_word_length, 3);
        assert_eq!(config.tokenizer.stop_words, vec!["the", "and"]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AnalyzerConfig::from_toml_str("database_url = \"postgres://x\"").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::InvalidValue { .. })
        ));

        let err = AnalyzerConfig::from_toml_str("[tokenizer]\nmin_word_length = 0").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::ValidationFailed { .. })
        ));

        let err = AnalyzerConfig::from_toml_str("unknown_key = 1").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::Parse(_))));
    }

    #[test]
    fn test_overrides() {
        let mut config = AnalyzerConfig::default();
        config.apply_overrides(|key| match key {
            DATABASE_URL_ENV => Some("sqlite::memory:".to_string()),
            DATA_DIR_ENV => Some("/tmp/posts".to_string()),
            _ => None,
        });
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/posts"));
    }

    #[test]
    fn test_missing_file() {
        let err = AnalyzerConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
