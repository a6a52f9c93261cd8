//! Shared fixtures for unit tests.

use std::{sync::Arc, time::Duration};

use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::watch;

use crate::{
    config::AppConfig,
    dao::collection_store::memory::MemoryCollectionStore,
    state::{AppState, SharedState},
};

pub(crate) fn fast_config() -> AppConfig {
    AppConfig::default().with_spin_duration(Duration::from_millis(10))
}

/// Seeded state with a memory store installed and the mirror attached.
pub(crate) async fn online_state() -> (SharedState, MemoryCollectionStore) {
    online_state_with(fast_config()).await
}

pub(crate) async fn online_state_with(config: AppConfig) -> (SharedState, MemoryCollectionStore) {
    let state = AppState::with_rng(config, StdRng::seed_from_u64(2024));
    let store = MemoryCollectionStore::new();
    state.install_store(Arc::new(store.clone())).await;
    (state, store)
}

/// Wait until the watched value satisfies `predicate`, failing after two seconds.
pub(crate) async fn wait_until<T: Clone>(
    receiver: &mut watch::Receiver<T>,
    predicate: impl Fn(&T) -> bool,
) -> T {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let current = receiver.borrow_and_update().clone();
            if predicate(&current) {
                return current;
            }
            receiver.changed().await.expect("sender dropped");
        }
    })
    .await
    .expect("value did not reach the expected state in time")
}
