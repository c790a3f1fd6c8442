use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The document changed since it was read.
    #[error("document `{key}` was modified concurrently")]
    Conflict { key: String },
    /// An insert hit an existing document.
    #[error("document `{key}` already exists")]
    AlreadyExists { key: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a conflict error for `key`.
    pub fn conflict(key: impl Into<String>) -> Self {
        StorageError::Conflict { key: key.into() }
    }

    /// Construct an already-exists error for `key`.
    pub fn already_exists(key: impl Into<String>) -> Self {
        StorageError::AlreadyExists { key: key.into() }
    }
}
