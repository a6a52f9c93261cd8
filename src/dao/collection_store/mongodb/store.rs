use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt, TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection as MongoCollection, Database,
    bson::{Bson, DateTime, Document, doc},
    options::IndexOptions,
};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
};
use crate::dao::{
    collection_store::{
        ChangeFeed, Collection, CollectionStore, DocumentId, Fields, Revision, StoredDocument,
    },
    storage::{StorageError, StorageResult},
};

const REVISION_FIELD: &str = "_rev";
const CREATED_AT_FIELD: &str = "_created_at";

/// [`CollectionStore`] backed by MongoDB; change feeds use change streams, so
/// the server must run as a replica set.
#[derive(Clone)]
pub struct MongoCollectionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    database: RwLock<Database>,
    config: MongoConfig,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.database.read().await.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.database.write().await = database;
        Ok(())
    }
}

impl MongoCollectionStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                database: RwLock::new(database),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        for collection in Collection::ALL {
            let index = mongodb::IndexModel::builder()
                .keys(doc! { CREATED_AT_FIELD: 1 })
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("{}_created_idx", collection.name())))
                        .build(),
                )
                .build();

            self.collection(collection)
                .await
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: CREATED_AT_FIELD,
                    source,
                })?;
        }
        Ok(())
    }

    async fn collection(&self, collection: Collection) -> MongoCollection<Document> {
        let guard = self.inner.database.read().await;
        guard.collection::<Document>(collection.name())
    }

    async fn create(&self, collection: Collection, fields: Fields) -> MongoResult<DocumentId> {
        let mut document = fields_to_document(collection, fields)?;
        let id = Uuid::new_v4().simple().to_string();
        document.insert("_id", id.clone());
        document.insert(REVISION_FIELD, 1_i64);
        document.insert(CREATED_AT_FIELD, DateTime::now());

        self.collection(collection)
            .await
            .insert_one(document)
            .await
            .map_err(|source| MongoDaoError::Insert { collection, source })?;

        Ok(DocumentId(id))
    }

    async fn get(
        &self,
        collection: Collection,
        id: DocumentId,
    ) -> MongoResult<Option<StoredDocument>> {
        let document = self
            .collection(collection)
            .await
            .find_one(doc! { "_id": id.as_str() })
            .await
            .map_err(|source| MongoDaoError::Fetch {
                collection,
                id,
                source,
            })?;
        document
            .map(|document| document_to_stored(collection, document))
            .transpose()
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: DocumentId,
        fields: Fields,
        expected: Option<Revision>,
    ) -> MongoResult<()> {
        let mut filter = doc! { "_id": id.as_str() };
        if let Some(expected) = expected {
            let revision: i64 = expected.0.parse().map_err(|_| MongoDaoError::Conflict {
                collection,
                id: id.clone(),
            })?;
            filter.insert(REVISION_FIELD, revision);
        }

        let set = fields_to_document(collection, fields)?;
        let handle = self.collection(collection).await;
        let result = handle
            .update_one(filter, doc! { "$set": set, "$inc": { REVISION_FIELD: 1_i64 } })
            .await
            .map_err(|source| MongoDaoError::Update {
                collection,
                id: id.clone(),
                source,
            })?;

        if result.matched_count == 0 {
            return Err(self.missing_or_conflict(collection, id).await);
        }
        Ok(())
    }

    async fn increment(
        &self,
        collection: Collection,
        id: DocumentId,
        field: &'static str,
        delta: i64,
    ) -> MongoResult<()> {
        let mut inc = Document::new();
        inc.insert(field, delta);
        inc.insert(REVISION_FIELD, 1_i64);

        let result = self
            .collection(collection)
            .await
            .update_one(doc! { "_id": id.as_str() }, doc! { "$inc": inc })
            .await
            .map_err(|source| MongoDaoError::Update {
                collection,
                id: id.clone(),
                source,
            })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::NotFound { collection, id });
        }
        Ok(())
    }

    async fn missing_or_conflict(&self, collection: Collection, id: DocumentId) -> MongoDaoError {
        let exists = self
            .collection(collection)
            .await
            .count_documents(doc! { "_id": id.as_str() })
            .await;
        match exists {
            Ok(0) => MongoDaoError::NotFound { collection, id },
            Ok(_) => MongoDaoError::Conflict { collection, id },
            Err(source) => MongoDaoError::Update {
                collection,
                id,
                source,
            },
        }
    }

    async fn delete(&self, collection: Collection, id: DocumentId) -> MongoResult<()> {
        let result = self
            .collection(collection)
            .await
            .delete_one(doc! { "_id": id.as_str() })
            .await
            .map_err(|source| MongoDaoError::Delete {
                collection,
                id: id.clone(),
                source,
            })?;
        if result.deleted_count == 0 {
            debug!(%collection, %id, "delete matched no document");
        }
        Ok(())
    }

    async fn list(&self, collection: Collection) -> MongoResult<Vec<StoredDocument>> {
        let documents: Vec<Document> = self
            .collection(collection)
            .await
            .find(doc! {})
            .sort(doc! { CREATED_AT_FIELD: 1 })
            .await
            .map_err(|source| MongoDaoError::List { collection, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::List { collection, source })?;

        documents
            .into_iter()
            .map(|document| document_to_stored(collection, document))
            .collect()
    }

    fn change_feed(
        self,
        collection: Collection,
    ) -> impl Stream<Item = MongoResult<Vec<StoredDocument>>> {
        try_stream! {
            let handle = self.collection(collection).await;
            let mut changes = handle
                .watch()
                .await
                .map_err(|source| MongoDaoError::Watch { collection, source })?;

            yield self.list(collection).await?;

            while let Some(_event) = changes
                .try_next()
                .await
                .map_err(|source| MongoDaoError::Watch { collection, source })?
            {
                yield self.list(collection).await?;
            }
        }
    }
}

fn fields_to_document(collection: Collection, fields: Fields) -> MongoResult<Document> {
    serde_json::from_value::<Document>(Value::Object(fields))
        .map_err(|source| MongoDaoError::Convert { collection, source })
}

fn document_to_stored(collection: Collection, mut document: Document) -> MongoResult<StoredDocument> {
    let id = match document.remove("_id") {
        Some(Bson::String(id)) => id,
        _ => return Err(MongoDaoError::MissingId { collection }),
    };
    let revision = match document.remove(REVISION_FIELD) {
        Some(Bson::Int64(value)) => value.to_string(),
        Some(Bson::Int32(value)) => value.to_string(),
        _ => "0".to_owned(),
    };
    document.remove(CREATED_AT_FIELD);

    let fields = match serde_json::to_value(&document)
        .map_err(|source| MongoDaoError::Convert { collection, source })?
    {
        Value::Object(map) => map,
        _ => Fields::new(),
    };

    Ok(StoredDocument {
        id: DocumentId(id),
        revision: Revision(revision),
        fields,
    })
}

impl CollectionStore for MongoCollectionStore {
    fn create(
        &self,
        collection: Collection,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<DocumentId>> {
        let store = self.clone();
        Box::pin(async move { store.create(collection, fields).await.map_err(Into::into) })
    }

    fn get(
        &self,
        collection: Collection,
        id: DocumentId,
    ) -> BoxFuture<'static, StorageResult<Option<StoredDocument>>> {
        let store = self.clone();
        Box::pin(async move { store.get(collection, id).await.map_err(Into::into) })
    }

    fn update_fields(
        &self,
        collection: Collection,
        id: DocumentId,
        fields: Fields,
        expected: Option<Revision>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_fields(collection, id, fields, expected)
                .await
                .map_err(Into::into)
        })
    }

    fn increment(
        &self,
        collection: Collection,
        id: DocumentId,
        field: &'static str,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .increment(collection, id, field, delta)
                .await
                .map_err(Into::into)
        })
    }

    fn delete(
        &self,
        collection: Collection,
        id: DocumentId,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete(collection, id).await.map_err(Into::into) })
    }

    fn list(&self, collection: Collection) -> BoxFuture<'static, StorageResult<Vec<StoredDocument>>> {
        let store = self.clone();
        Box::pin(async move { store.list(collection).await.map_err(Into::into) })
    }

    fn subscribe(&self, collection: Collection) -> ChangeFeed {
        self.clone()
            .change_feed(collection)
            .map_err(StorageError::from)
            .boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
