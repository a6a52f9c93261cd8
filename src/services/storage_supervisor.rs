use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{collection_store::CollectionStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a store connected, driving the online flag from connects, health checks and reconnects.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn CollectionStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_store(store.clone()).await;
                info!("storage connection established; going online");
                delay = INITIAL_DELAY;

                if !supervise(&state, store.as_ref()).await {
                    warn!("exhausted storage reconnect attempts; reconnecting from scratch");
                    state.clear_store().await;
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store until it fails and cannot be revived. Returns `false` once
/// every reconnect attempt has been used.
async fn supervise(state: &SharedState, store: &dyn CollectionStore) -> bool {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if !state.is_online() {
                    info!("storage healthy again; going online");
                    state.update_online(true);
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed; going offline");
                state.update_online(false);

                if !reconnect(store).await {
                    return false;
                }
                state.reattach_mirror().await;
                state.update_online(true);
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

async fn reconnect(store: &dyn CollectionStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "storage reconnect attempt failed");
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig, dao::collection_store::memory::MemoryCollectionStore, state::AppState,
    };

    #[tokio::test]
    async fn successful_connect_brings_the_state_online() {
        let state = AppState::new(AppConfig::default());
        let mut online = state.connectivity().watcher();
        let store = MemoryCollectionStore::new();

        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            async move { Ok(Arc::new(store) as Arc<dyn CollectionStore>) }
        }));

        tokio::time::timeout(Duration::from_secs(2), online.wait_for(|online| *online))
            .await
            .unwrap()
            .unwrap();
        assert!(state.store().await.is_some());
        supervisor.abort();
    }

    #[tokio::test]
    async fn unhealthy_store_that_recovers_is_kept() {
        let state = AppState::new(AppConfig::default());
        let store = MemoryCollectionStore::new();
        state.install_store(Arc::new(store.clone())).await;
        store.set_available(false);

        let handle = store.clone();
        let supervision = tokio::spawn({
            let state = state.clone();
            async move { supervise(&state, &handle).await }
        });

        let mut online = state.connectivity().watcher();
        tokio::time::timeout(Duration::from_secs(2), online.wait_for(|online| !*online))
            .await
            .unwrap()
            .unwrap();
        store.set_available(true);
        tokio::time::timeout(Duration::from_secs(5), online.wait_for(|online| *online))
            .await
            .unwrap()
            .unwrap();
        supervision.abort();
    }
}
