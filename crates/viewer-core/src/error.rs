use thiserror::Error;

use crate::embedding::EmbeddingError;

pub type Result<T> = std::result::Result<T, ViewerError>;

/// Coarse classification of a failure, so callers can decide how far it
/// propagates without matching on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Parse,
    Query,
}

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Invalid {field}: {message}")]
    Parse { field: &'static str, message: String },
    #[error("Query error: {0}")]
    Query(String),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

impl ViewerError {
    pub fn parse(field: &'static str, message: impl Into<String>) -> Self {
        ViewerError::Parse {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ViewerError::Connection(_) => ErrorKind::Connection,
            ViewerError::Reqwest(e) if e.is_connect() || e.is_timeout() => ErrorKind::Connection,
            ViewerError::Parse { .. } | ViewerError::Json(_) => ErrorKind::Parse,
            ViewerError::Query(_)
            | ViewerError::Reqwest(_)
            | ViewerError::Sqlite(_)
            | ViewerError::Embedding(_) => ErrorKind::Query,
        }
    }
}
