use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_stream::try_stream;
use futures::{Stream, StreamExt, TryStreamExt, future::BoxFuture};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, from_value};
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    collection_store::{
        ChangeFeed, Collection, CollectionStore, DocumentId, Fields, Revision, StoredDocument,
    },
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ChangesResponse, CouchDocument, DatabaseInfo, END_SUFFIX, PutResponse,
        couch_doc_id, doc_prefix, seq_param,
    },
};

/// How long a `_changes` long-poll may stay open before CouchDB answers empty.
const LONGPOLL_TIMEOUT: Duration = Duration::from_secs(30);
/// Compare-and-swap attempts for an increment before reporting a conflict.
const INCREMENT_ATTEMPTS: u32 = 3;

/// [`CollectionStore`] backed by a single CouchDB database.
#[derive(Clone)]
pub struct CouchCollectionStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchCollectionStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_json<T>(&self, builder: reqwest::RequestBuilder, path: &str) -> CouchResult<T>
    where
        T: DeserializeOwned,
    {
        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: path.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    async fn get_document(
        &self,
        collection: Collection,
        id: &DocumentId,
    ) -> CouchResult<Option<CouchDocument>> {
        let doc_id = couch_doc_id(collection, id);
        let response = self
            .request(Method::GET, &doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchDocument>()
                .await
                .map(Some)
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: doc_id,
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id,
                status: other,
            }),
        }
    }

    async fn put_document(
        &self,
        collection: Collection,
        id: &DocumentId,
        document: &CouchDocument,
    ) -> CouchResult<String> {
        let response = self
            .request(Method::PUT, &document.id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: document.id.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict {
                collection,
                id: id.clone(),
            }),
            status if status.is_success() => response
                .json::<PutResponse>()
                .await
                .map(|put| put.rev)
                .map_err(|source| CouchDaoError::DecodeResponse {
                    path: document.id.clone(),
                    source,
                }),
            other => Err(CouchDaoError::RequestStatus {
                path: document.id.clone(),
                status: other,
            }),
        }
    }

    async fn create(&self, collection: Collection, fields: Fields) -> CouchResult<DocumentId> {
        let id = DocumentId(Uuid::new_v4().simple().to_string());
        let created_at_ms = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        let document = CouchDocument {
            id: couch_doc_id(collection, &id),
            rev: None,
            created_at_ms,
            fields,
        };
        self.put_document(collection, &id, &document).await?;
        Ok(id)
    }

    async fn get(
        &self,
        collection: Collection,
        id: DocumentId,
    ) -> CouchResult<Option<StoredDocument>> {
        Ok(self
            .get_document(collection, &id)
            .await?
            .map(|document| document.into_stored(collection)))
    }

    async fn update_fields(
        &self,
        collection: Collection,
        id: DocumentId,
        fields: Fields,
        expected: Option<Revision>,
    ) -> CouchResult<()> {
        let Some(mut document) = self.get_document(collection, &id).await? else {
            return Err(CouchDaoError::NotFound { collection, id });
        };
        if let Some(expected) = expected {
            if document.rev.as_deref() != Some(expected.0.as_str()) {
                return Err(CouchDaoError::Conflict { collection, id });
            }
        }
        document.fields.extend(fields);
        self.put_document(collection, &id, &document).await?;
        Ok(())
    }

    async fn increment(
        &self,
        collection: Collection,
        id: DocumentId,
        field: &'static str,
        delta: i64,
    ) -> CouchResult<()> {
        for attempt in 1..=INCREMENT_ATTEMPTS {
            let Some(mut document) = self.get_document(collection, &id).await? else {
                return Err(CouchDaoError::NotFound { collection, id });
            };
            let current = match document.fields.get(field) {
                None | Some(Value::Null) => 0,
                Some(value) => value.as_i64().ok_or_else(|| CouchDaoError::NotNumeric {
                    id: id.clone(),
                    field,
                })?,
            };
            document
                .fields
                .insert(field.to_owned(), Value::from(current + delta));

            match self.put_document(collection, &id, &document).await {
                Ok(_) => return Ok(()),
                Err(CouchDaoError::Conflict { .. }) => {
                    debug!(%collection, %id, attempt, "increment lost a revision race; retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(CouchDaoError::Conflict { collection, id })
    }

    async fn delete(&self, collection: Collection, id: DocumentId) -> CouchResult<()> {
        let Some(document) = self.get_document(collection, &id).await? else {
            return Ok(());
        };
        let rev = document.rev.unwrap_or_default();
        let response = self
            .request(Method::DELETE, &document.id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: document.id.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            StatusCode::CONFLICT => Err(CouchDaoError::Conflict { collection, id }),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path: document.id,
                status: other,
            }),
        }
    }

    async fn list(&self, collection: Collection) -> CouchResult<Vec<StoredDocument>> {
        const ALL_DOCS: &str = "_all_docs";
        let prefix = doc_prefix(collection);
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let payload: AllDocsResponse = self
            .get_json(self.request(Method::GET, ALL_DOCS).query(&query), ALL_DOCS)
            .await?;

        let mut documents = Vec::with_capacity(payload.rows.len());
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed: CouchDocument =
                    from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                        path: row.id.clone(),
                        source,
                    })?;
                documents.push(parsed);
            }
        }
        documents.sort_by_key(|document| document.created_at_ms);

        Ok(documents
            .into_iter()
            .map(|document| document.into_stored(collection))
            .collect())
    }

    async fn update_seq(&self) -> CouchResult<Value> {
        let info: DatabaseInfo = self
            .get_json(
                self.authorize(self.client.get(self.database_url())),
                &self.database,
            )
            .await?;
        Ok(info.update_seq)
    }

    async fn changes_since(&self, since: &Value) -> CouchResult<ChangesResponse> {
        const CHANGES: &str = "_changes";
        let query = [
            ("feed", "longpoll".to_string()),
            ("since", seq_param(since)),
            ("timeout", LONGPOLL_TIMEOUT.as_millis().to_string()),
        ];
        self.get_json(self.request(Method::GET, CHANGES).query(&query), CHANGES)
            .await
    }

    fn change_feed(
        self,
        collection: Collection,
    ) -> impl Stream<Item = CouchResult<Vec<StoredDocument>>> {
        try_stream! {
            let prefix = doc_prefix(collection);
            let mut since = self.update_seq().await?;
            yield self.list(collection).await?;

            loop {
                let changes = self.changes_since(&since).await?;
                since = changes.last_seq;
                if changes.results.iter().any(|row| row.id.starts_with(&prefix)) {
                    yield self.list(collection).await?;
                }
            }
        }
    }

    async fn health_check(&self) -> CouchResult<()> {
        let url = self.database_url();
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: url.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: url,
                status: response.status(),
            })
        }
    }
}

impl CollectionStore for CouchCollectionStore {
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
        Box::pin(async move { store.health_check().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
