use std::error::Error;
use thiserror::Error;

use crate::dao::collection_store::{Collection, DocumentId};

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
    /// A conditional update was rejected because the document moved on.
    #[error("document `{id}` in `{collection}` was modified concurrently")]
    Conflict {
        collection: Collection,
        id: DocumentId,
    },
    #[error("document `{id}` not found in `{collection}`")]
    NotFound {
        collection: Collection,
        id: DocumentId,
    },
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
