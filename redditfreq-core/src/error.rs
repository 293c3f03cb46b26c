use crate::types::DataSource;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("No posts to analyze from {data_source} for {scope}")]
    NoData {
        data_source: DataSource,
        scope: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Database locked")]
    DatabaseLocked,

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Failed to read post file {path}: {reason}")]
    FileSource { path: String, reason: String },

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Permission denied accessing config: {path}")]
    PermissionDenied { path: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl From<sqlx::Error> for CoreError {
    fn from(error: sqlx::Error) -> Self {
        let locked = match &error {
            sqlx::Error::Database(db_error) => {
                let message = db_error.message();
                message.contains("database is locked") || message.contains("database is busy")
            }
            _ => false,
        };

        if locked {
            CoreError::Storage(StorageError::DatabaseLocked)
        } else {
            CoreError::Storage(StorageError::Sql(error))
        }
    }
}
