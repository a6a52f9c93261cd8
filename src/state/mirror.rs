use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        collection_store::{ChangeFeed, Collection, CollectionStore, StoredDocument},
        models::{CoffeeWinEntity, MemberEntity, Record, RestaurantEntity},
    },
    services::sse_events,
    state::SseHub,
};

/// In-memory copy of every collection, rebuilt from the store's change feeds.
///
/// Each snapshot replaces the whole list for its collection; nothing else
/// writes here, so a mutation only shows up once the feed delivers it.
pub struct LocalMirror {
    restaurants: watch::Sender<Vec<Record<RestaurantEntity>>>,
    members: watch::Sender<Vec<Record<MemberEntity>>>,
    coffee_wins: watch::Sender<Vec<Record<CoffeeWinEntity>>>,
    feeds: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalMirror {
    pub fn new() -> Self {
        Self {
            restaurants: watch::channel(Vec::new()).0,
            members: watch::channel(Vec::new()).0,
            coffee_wins: watch::channel(Vec::new()).0,
            feeds: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to every collection of `store`, replacing any previous feeds.
    pub fn attach(self: &Arc<Self>, store: Arc<dyn CollectionStore>, hub: SseHub) {
        let handles: Vec<JoinHandle<()>> = Collection::ALL
            .into_iter()
            .map(|collection| {
                let feed = store.subscribe(collection);
                let mirror = Arc::downgrade(self);
                let hub = hub.clone();
                tokio::spawn(follow_feed(mirror, collection, feed, hub))
            })
            .collect();

        let previous = std::mem::replace(&mut *self.lock_feeds(), handles);
        for handle in previous {
            handle.abort();
        }
        info!("mirror subscribed to all collections");
    }

    /// Cancel every running feed. Snapshots already received are kept.
    pub fn teardown(&self) {
        for handle in self.lock_feeds().drain(..) {
            handle.abort();
        }
    }

    fn lock_feeds(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.feeds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, collection: Collection, documents: Vec<StoredDocument>, hub: &SseHub) {
        match collection {
            Collection::Restaurants => {
                let records = decode::<RestaurantEntity>(collection, documents);
                sse_events::broadcast_restaurants(hub, &records);
                self.restaurants.send_replace(records);
            }
            Collection::Members => {
                let records = decode::<MemberEntity>(collection, documents);
                sse_events::broadcast_members(hub, &records);
                self.members.send_replace(records);
            }
            Collection::CoffeeWins => {
                let records = decode::<CoffeeWinEntity>(collection, documents);
                sse_events::broadcast_coffee_history(hub, &records);
                self.coffee_wins.send_replace(records);
            }
        }
    }

    pub fn restaurants(&self) -> Vec<Record<RestaurantEntity>> {
        self.restaurants.borrow().clone()
    }

    pub fn members(&self) -> Vec<Record<MemberEntity>> {
        self.members.borrow().clone()
    }

    pub fn coffee_wins(&self) -> Vec<Record<CoffeeWinEntity>> {
        self.coffee_wins.borrow().clone()
    }

    pub fn watch_restaurants(&self) -> watch::Receiver<Vec<Record<RestaurantEntity>>> {
        self.restaurants.subscribe()
    }

    pub fn watch_members(&self) -> watch::Receiver<Vec<Record<MemberEntity>>> {
        self.members.subscribe()
    }

    pub fn watch_coffee_wins(&self) -> watch::Receiver<Vec<Record<CoffeeWinEntity>>> {
        self.coffee_wins.subscribe()
    }
}

impl Default for LocalMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LocalMirror {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn follow_feed(
    mirror: Weak<LocalMirror>,
    collection: Collection,
    mut feed: ChangeFeed,
    hub: SseHub,
) {
    while let Some(update) = feed.next().await {
        match update {
            Ok(documents) => {
                let Some(mirror) = mirror.upgrade() else {
                    break;
                };
                debug!(%collection, count = documents.len(), "applying collection snapshot");
                mirror.apply(collection, documents, &hub);
            }
            Err(err) => {
                warn!(%collection, error = %err, "change feed failed; mirror stops updating");
                return;
            }
        }
    }
    debug!(%collection, "change feed closed");
}

/// Decode a snapshot, skipping documents that do not fit the record type.
fn decode<T: DeserializeOwned>(
    collection: Collection,
    documents: Vec<StoredDocument>,
) -> Vec<Record<T>> {
    documents
        .into_iter()
        .filter_map(|document| {
            let id = document.id.clone();
            match Record::try_from(document) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(%collection, %id, error = %err, "skipping undecodable document");
                    None
                }
            }
        })
        .collect()
}
