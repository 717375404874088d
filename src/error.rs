use thiserror::Error;

/// Errors surfaced by the library seams (editor, store, config, catalogs).
///
/// Failures of an executing request are not represented here; the executor
/// turns them into [`crate::types::RequestStatus`] transitions instead.
#[derive(Debug, Error)]
pub enum ExplorerError {
    /// Pre-flight validation failed; one message per offending field.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExplorerError {
    /// Validation messages, if this is a validation failure.
    pub fn validation_messages(&self) -> Option<&[String]> {
        match self {
            ExplorerError::Validation(messages) => Some(messages),
            _ => None,
        }
    }
}

pub type Result<T, E = ExplorerError> = std::result::Result<T, E>;
