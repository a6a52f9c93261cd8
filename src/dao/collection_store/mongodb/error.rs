//! Error types shared by the MongoDB storage implementation.

use mongodb::error::Error as MongoError;
use thiserror::Error;

use crate::dao::collection_store::{Collection, DocumentId};

/// Convenient result alias returning [`MongoDaoError`] failures.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Failures that can occur while interacting with MongoDB.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: Collection,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to insert into `{collection}`")]
    Insert {
        collection: Collection,
        #[source]
        source: MongoError,
    },
    #[error("failed to read `{id}` from `{collection}`")]
    Fetch {
        collection: Collection,
        id: DocumentId,
        #[source]
        source: MongoError,
    },
    #[error("failed to update `{id}` in `{collection}`")]
    Update {
        collection: Collection,
        id: DocumentId,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete `{id}` from `{collection}`")]
    Delete {
        collection: Collection,
        id: DocumentId,
        #[source]
        source: MongoError,
    },
    #[error("failed to list `{collection}`")]
    List {
        collection: Collection,
        #[source]
        source: MongoError,
    },
    #[error("change stream on `{collection}` failed")]
    Watch {
        collection: Collection,
        #[source]
        source: MongoError,
    },
    #[error("failed to convert a `{collection}` document")]
    Convert {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },
    #[error("document in `{collection}` has no string `_id`")]
    MissingId { collection: Collection },
    #[error("document `{id}` in `{collection}` changed since it was read")]
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
