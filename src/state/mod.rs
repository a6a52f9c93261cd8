pub mod connectivity;
pub mod mirror;
pub mod selection;
mod sse;
pub mod sync;

use std::sync::{Arc, Mutex, PoisonError};

use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    config::AppConfig,
    dao::{
        collection_store::CollectionStore,
        models::{Record, RestaurantEntity},
    },
    error::ServiceError,
    services::sse_events,
};

pub use self::sse::SseHub;
use self::{
    connectivity::Connectivity,
    mirror::LocalMirror,
    selection::SpinSlot,
    sync::SyncFlag,
};

pub type SharedState = Arc<AppState>;

/// Central application state: store handle, mirror, spin machines and flags.
pub struct AppState {
    store: RwLock<Option<Arc<dyn CollectionStore>>>,
    mirror: Arc<LocalMirror>,
    connectivity: Connectivity,
    syncing: SyncFlag,
    sse: SseHub,
    restaurant_spin: SpinSlot<Record<RestaurantEntity>>,
    coffee_spin: SpinSlot<Vec<String>>,
    rng: Mutex<StdRng>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts offline until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Same as [`AppState::new`] with a caller-provided generator, for reproducible draws.
    pub fn with_rng(config: AppConfig, rng: StdRng) -> SharedState {
        Arc::new(Self {
            store: RwLock::new(None),
            mirror: Arc::new(LocalMirror::new()),
            connectivity: Connectivity::new(),
            syncing: SyncFlag::new(),
            sse: SseHub::new(config.sse_capacity()),
            restaurant_spin: SpinSlot::new(),
            coffee_spin: SpinSlot::new(),
            rng: Mutex::new(rng),
            config,
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn CollectionStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Return the installed store, or [`ServiceError::Offline`] when there is none.
    pub async fn require_store(&self) -> Result<Arc<dyn CollectionStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Offline)
    }

    /// Install a store, subscribe the mirror to it and go online.
    pub async fn install_store(&self, store: Arc<dyn CollectionStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store.clone());
        }
        self.mirror.attach(store, self.sse.clone());
        self.update_online(true);
    }

    /// Re-subscribe the mirror to the installed store after a reconnect.
    pub async fn reattach_mirror(&self) {
        if let Some(store) = self.store().await {
            self.mirror.attach(store, self.sse.clone());
        }
    }

    /// Drop the store, stop the feeds and go offline.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.mirror.teardown();
        self.update_online(false);
    }

    /// Record a connectivity transition and broadcast it when the value changes.
    pub fn update_online(&self, online: bool) {
        if self.connectivity.set_online(online) {
            info!(online, "connectivity changed");
            sse_events::broadcast_connectivity(&self.sse, online);
        }
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn syncing(&self) -> &SyncFlag {
        &self.syncing
    }

    pub fn mirror(&self) -> &LocalMirror {
        &self.mirror
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        &self.sse
    }

    pub fn restaurant_spin(&self) -> &SpinSlot<Record<RestaurantEntity>> {
        &self.restaurant_spin
    }

    pub fn coffee_spin(&self) -> &SpinSlot<Vec<String>> {
        &self.coffee_spin
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run `draw` with exclusive access to the shared random generator.
    pub fn draw<R>(&self, draw: impl FnOnce(&mut StdRng) -> R) -> R {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        draw(&mut rng)
    }
}
