#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::fmt;

use futures::{future::BoxFuture, stream::BoxStream};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dao::storage::StorageResult;

/// Schemaless document body, without the identity and revision fields.
pub type Fields = Map<String, Value>;

/// Stream of whole-collection snapshots: the current contents first, then one
/// snapshot per change.
pub type ChangeFeed = BoxStream<'static, StorageResult<Vec<StoredDocument>>>;

/// The named collections the application keeps in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Restaurants,
    Members,
    CoffeeWins,
}

impl Collection {
    /// Every collection, in the order the mirror subscribes to them.
    pub const ALL: [Collection; 3] = [
        Collection::Restaurants,
        Collection::Members,
        Collection::CoffeeWins,
    ];

    /// Name of the collection inside the store.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Restaurants => "restaurants",
            Collection::Members => "members",
            Collection::CoffeeWins => "coffee-wins",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Store-assigned document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Opaque revision stamp used for conditional updates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(pub String);

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub revision: Revision,
    pub fields: Fields,
}

/// Abstraction over the remote document database holding the shared lists.
pub trait CollectionStore: Send + Sync {
    /// Insert a new document and return the identifier the store assigned.
    fn create(
        &self,
        collection: Collection,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<DocumentId>>;

    /// Read one document straight from the store; `None` when it does not exist.
    fn get(
        &self,
        collection: Collection,
        id: DocumentId,
    ) -> BoxFuture<'static, StorageResult<Option<StoredDocument>>>;

    /// Overwrite the given top-level fields. When `expected` is set the write only
    /// succeeds if the document is still at that revision.
    fn update_fields(
        &self,
        collection: Collection,
        id: DocumentId,
        fields: Fields,
        expected: Option<Revision>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Atomically add `delta` to a numeric field.
    fn increment(
        &self,
        collection: Collection,
        id: DocumentId,
        field: &'static str,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Delete a document. Deleting a missing document succeeds.
    fn delete(&self, collection: Collection, id: DocumentId)
    -> BoxFuture<'static, StorageResult<()>>;

    /// List every document currently in the collection, oldest first.
    fn list(&self, collection: Collection) -> BoxFuture<'static, StorageResult<Vec<StoredDocument>>>;

    /// Subscribe to whole-collection snapshots.
    fn subscribe(&self, collection: Collection) -> ChangeFeed;

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
