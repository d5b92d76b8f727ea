use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the request (connection lost, query failed...).
    #[error("{backend} storage unavailable: {message}")]
    Unavailable {
        /// Backend name.
        backend: &'static str,
        /// What was being attempted.
        message: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A persisted record could not be mapped back into an entity.
    #[error("{backend} storage returned an unreadable record: {message}")]
    Corrupted {
        /// Backend name.
        backend: &'static str,
        /// What could not be decoded.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(
        backend: &'static str,
        message: String,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        StorageError::Unavailable {
            backend,
            message,
            source: Box::new(source),
        }
    }

    /// Name of the backend that produced the error.
    pub fn backend(&self) -> &'static str {
        match self {
            StorageError::Unavailable { backend, .. } | StorageError::Corrupted { backend, .. } => {
                backend
            }
        }
    }
}
