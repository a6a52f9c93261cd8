//! In-process implementation of [`CollectionStore`] used for local development and tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use futures::{StreamExt, future::BoxFuture, stream};
use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use super::{ChangeFeed, Collection, CollectionStore, DocumentId, Fields, Revision, StoredDocument};
use crate::dao::storage::{StorageError, StorageResult};

/// Failures specific to the memory store.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("memory store is switched off")]
    Offline,
    #[error("field `{field}` of `{id}` is not numeric")]
    NotNumeric { id: DocumentId, field: &'static str },
}

/// Document store kept entirely in memory, with change feeds backed by watch channels.
#[derive(Clone)]
pub struct MemoryCollectionStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    collections: DashMap<Collection, CollectionSlot>,
    available: AtomicBool,
}

struct CollectionSlot {
    documents: IndexMap<DocumentId, (u64, Fields)>,
    feed: watch::Sender<Vec<StoredDocument>>,
}

impl CollectionSlot {
    fn new() -> Self {
        let (feed, _rx) = watch::channel(Vec::new());
        Self {
            documents: IndexMap::new(),
            feed,
        }
    }

    fn snapshot(&self) -> Vec<StoredDocument> {
        self.documents
            .iter()
            .map(|(id, (revision, fields))| StoredDocument {
                id: id.clone(),
                revision: Revision(revision.to_string()),
                fields: fields.clone(),
            })
            .collect()
    }

    fn publish(&self) {
        self.feed.send_replace(self.snapshot());
    }
}

impl Default for MemoryCollectionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCollectionStore {
    /// Build an empty, available store holding the three application collections.
    pub fn new() -> Self {
        let collections = DashMap::new();
        for collection in Collection::ALL {
            collections.insert(collection, CollectionSlot::new());
        }
        Self {
            inner: Arc::new(MemoryInner {
                collections,
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate the store becoming reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(offline_error())
        }
    }

    fn create_now(&self, collection: Collection, fields: Fields) -> StorageResult<DocumentId> {
        self.ensure_available()?;
        let id = DocumentId(Uuid::new_v4().simple().to_string());
        let mut slot = self
            .inner
            .collections
            .entry(collection)
            .or_insert_with(CollectionSlot::new);
        slot.documents.insert(id.clone(), (1, fields));
        slot.publish();
        Ok(id)
    }

    fn get_now(&self, collection: Collection, id: &DocumentId) -> StorageResult<Option<StoredDocument>> {
        self.ensure_available()?;
        let Some(slot) = self.inner.collections.get(&collection) else {
            return Ok(None);
        };
        Ok(slot.documents.get(id).map(|(revision, fields)| StoredDocument {
            id: id.clone(),
            revision: Revision(revision.to_string()),
            fields: fields.clone(),
        }))
    }

    fn update_now(
        &self,
        collection: Collection,
        id: DocumentId,
        fields: Fields,
        expected: Option<Revision>,
    ) -> StorageResult<()> {
        self.ensure_available()?;
        let mut slot = self
            .inner
            .collections
            .entry(collection)
            .or_insert_with(CollectionSlot::new);
        let Some((revision, current)) = slot.documents.get_mut(&id) else {
            return Err(StorageError::NotFound { collection, id });
        };
        if let Some(expected) = expected {
            if expected.0 != revision.to_string() {
                return Err(StorageError::Conflict { collection, id });
            }
        }
        current.extend(fields);
        *revision += 1;
        slot.publish();
        Ok(())
    }

    fn increment_now(
        &self,
        collection: Collection,
        id: DocumentId,
        field: &'static str,
        delta: i64,
    ) -> StorageResult<()> {
        self.ensure_available()?;
        let mut slot = self
            .inner
            .collections
            .entry(collection)
            .or_insert_with(CollectionSlot::new);
        let Some((revision, current)) = slot.documents.get_mut(&id) else {
            return Err(StorageError::NotFound { collection, id });
        };
        let value = match current.get(field) {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_i64().ok_or_else(|| {
                StorageError::unavailable(
                    format!("cannot increment `{field}`"),
                    MemoryStoreError::NotNumeric {
                        id: id.clone(),
                        field,
                    },
                )
            })?,
        };
        current.insert(field.to_owned(), Value::from(value + delta));
        *revision += 1;
        slot.publish();
        Ok(())
    }

    fn delete_now(&self, collection: Collection, id: DocumentId) -> StorageResult<()> {
        self.ensure_available()?;
        let mut slot = self
            .inner
            .collections
            .entry(collection)
            .or_insert_with(CollectionSlot::new);
        if slot.documents.shift_remove(&id).is_some() {
            slot.publish();
        }
        Ok(())
    }

    fn list_now(&self, collection: Collection) -> StorageResult<Vec<StoredDocument>> {
        self.ensure_available()?;
        Ok(self
            .inner
            .collections
            .get(&collection)
            .map(|slot| slot.snapshot())
            .unwrap_or_default())
    }
}

fn offline_error() -> StorageError {
    StorageError::unavailable("memory store offline".into(), MemoryStoreError::Offline)
}

impl CollectionStore for MemoryCollectionStore {
    fn create(
        &self,
        collection: Collection,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<DocumentId>> {
        let store = self.clone();
        Box::pin(async move { store.create_now(collection, fields) })
    }

    fn get(
        &self,
        collection: Collection,
        id: DocumentId,
    ) -> BoxFuture<'static, StorageResult<Option<StoredDocument>>> {
        let store = self.clone();
        Box::pin(async move { store.get_now(collection, &id) })
    }

    fn update_fields(
        &self,
        collection: Collection,
        id: DocumentId,
        fields: Fields,
        expected: Option<Revision>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.update_now(collection, id, fields, expected) })
    }

    fn increment(
        &self,
        collection: Collection,
        id: DocumentId,
        field: &'static str,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.increment_now(collection, id, field, delta) })
    }

    fn delete(
        &self,
        collection: Collection,
        id: DocumentId,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.delete_now(collection, id) })
    }

    fn list(&self, collection: Collection) -> BoxFuture<'static, StorageResult<Vec<StoredDocument>>> {
        let store = self.clone();
        Box::pin(async move { store.list_now(collection) })
    }

    fn subscribe(&self, collection: Collection) -> ChangeFeed {
        if let Err(err) = self.ensure_available() {
            return stream::once(async move { Err(err) }).boxed();
        }

        let receiver = self
            .inner
            .collections
            .entry(collection)
            .or_insert_with(CollectionSlot::new)
            .feed
            .subscribe();
        WatchStream::new(receiver).map(Ok).boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_available() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_available() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn feed_starts_with_current_contents() {
        let store = MemoryCollectionStore::new();
        store
            .create(Collection::Members, fields(json!({"name": "Jin"})))
            .await
            .unwrap();

        let mut feed = store.subscribe(Collection::Members);
        let first = feed.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].fields["name"], json!("Jin"));

        store
            .create(Collection::Members, fields(json!({"name": "Mina"})))
            .await
            .unwrap();
        let second = feed.next().await.unwrap().unwrap();
        let names: Vec<_> = second.iter().map(|doc| doc.fields["name"].clone()).collect();
        assert_eq!(names, vec![json!("Jin"), json!("Mina")]);
    }

    #[tokio::test]
    async fn conditional_update_rejects_stale_revision() {
        let store = MemoryCollectionStore::new();
        let id = store
            .create(Collection::Restaurants, fields(json!({"name": "Kimbap", "votes": 0})))
            .await
            .unwrap();

        store
            .update_fields(
                Collection::Restaurants,
                id.clone(),
                fields(json!({"name": "Kimbap Heaven"})),
                Some(Revision("1".into())),
            )
            .await
            .unwrap();

        let err = store
            .update_fields(
                Collection::Restaurants,
                id.clone(),
                fields(json!({"name": "Stale"})),
                Some(Revision("1".into())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));

        let docs = store.list(Collection::Restaurants).await.unwrap();
        assert_eq!(docs[0].fields["name"], json!("Kimbap Heaven"));
        assert_eq!(docs[0].revision, Revision("2".into()));
    }

    #[tokio::test]
    async fn increment_treats_missing_field_as_zero() {
        let store = MemoryCollectionStore::new();
        let id = store
            .create(Collection::Restaurants, fields(json!({"name": "Pho"})))
            .await
            .unwrap();

        store
            .increment(Collection::Restaurants, id.clone(), "votes", 1)
            .await
            .unwrap();
        store
            .increment(Collection::Restaurants, id, "votes", 1)
            .await
            .unwrap();

        let docs = store.list(Collection::Restaurants).await.unwrap();
        assert_eq!(docs[0].fields["votes"], json!(2));
    }

    #[tokio::test]
    async fn get_reads_the_current_revision() {
        let store = MemoryCollectionStore::new();
        let id = store
            .create(Collection::Members, fields(json!({"name": "Jin"})))
            .await
            .unwrap();
        store
            .update_fields(Collection::Members, id.clone(), fields(json!({"name": "Jina"})), None)
            .await
            .unwrap();

        let document = store.get(Collection::Members, id).await.unwrap().unwrap();
        assert_eq!(document.revision, Revision("2".into()));
        assert_eq!(document.fields["name"], json!("Jina"));
        assert!(
            store
                .get(Collection::Members, DocumentId::from("nope"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn deleting_missing_document_is_not_an_error() {
        let store = MemoryCollectionStore::new();
        store
            .delete(Collection::Members, DocumentId::from("nope"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn offline_store_rejects_every_operation() {
        let store = MemoryCollectionStore::new();
        store.set_available(false);

        assert!(store.list(Collection::Members).await.is_err());
        assert!(store.health_check().await.is_err());
        assert!(
            store
                .create(Collection::Members, Fields::new())
                .await
                .is_err()
        );
        let mut feed = store.subscribe(Collection::Members);
        assert!(feed.next().await.unwrap().is_err());
    }
}
