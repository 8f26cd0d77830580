use std::error::Error;
use thiserror::Error;

/// Result alias for persistence operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by object store backends regardless of the underlying technology.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend could not be reached or refused the request.
    #[error("object store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A value was written to a path that has no persisted object.
    #[error("no object at `{path}`")]
    MissingObject { path: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
