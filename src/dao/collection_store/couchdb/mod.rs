mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchCollectionStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            CouchDaoError::Conflict { collection, id } => StorageError::Conflict { collection, id },
            CouchDaoError::NotFound { collection, id } => StorageError::NotFound { collection, id },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
