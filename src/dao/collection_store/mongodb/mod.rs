mod config;
mod connection;
mod error;
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoCollectionStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::Conflict { collection, id } => StorageError::Conflict { collection, id },
            MongoDaoError::NotFound { collection, id } => StorageError::NotFound { collection, id },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
