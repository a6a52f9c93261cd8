//! Lunch Roulette Back binary entrypoint wiring REST, SSE and the collection store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lunch_roulette_back::{
    config::AppConfig,
    dao::collection_store::{CollectionStore, memory::MemoryCollectionStore},
    routes,
    state::{AppState, SharedState},
};

#[cfg(feature = "couch-store")]
use lunch_roulette_back::dao::collection_store::couchdb::{CouchCollectionStore, CouchConfig};
#[cfg(feature = "mongo-store")]
use lunch_roulette_back::dao::collection_store::mongodb::{MongoCollectionStore, MongoConfig};
#[cfg(any(feature = "mongo-store", feature = "couch-store"))]
use lunch_roulette_back::{dao::storage::StorageError, services::storage_supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    spawn_storage(app_state.clone()).await?;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the backend from `STORAGE_BACKEND` and start supervising it.
async fn spawn_storage(state: SharedState) -> anyhow::Result<()> {
    let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| default_backend().into());

    match backend.as_str() {
        "memory" => {
            warn!("using the in-process memory store; data is lost on restart");
            state
                .install_store(Arc::new(MemoryCollectionStore::new()))
                .await;
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            let uri =
                env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
            let db_name = env::var("MONGO_DB").ok();
            let mongo = MongoConfig::from_uri(&uri, db_name.as_deref())
                .await
                .context("parsing MONGO_URI")?;

            tokio::spawn(storage_supervisor::run(state, move || {
                let mongo = mongo.clone();
                async move {
                    MongoCollectionStore::connect(mongo)
                        .await
                        .map(|store| Arc::new(store) as Arc<dyn CollectionStore>)
                        .map_err(StorageError::from)
                }
            }));
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            let couch = CouchConfig::from_env().context("reading CouchDB settings")?;

            tokio::spawn(storage_supervisor::run(state, move || {
                let couch = couch.clone();
                async move {
                    CouchCollectionStore::connect(couch)
                        .await
                        .map(|store| Arc::new(store) as Arc<dyn CollectionStore>)
                        .map_err(StorageError::from)
                }
            }));
        }
        other => bail!("unsupported STORAGE_BACKEND `{other}`"),
    }

    info!(%backend, "storage backend selected");
    Ok(())
}

fn default_backend() -> &'static str {
    if cfg!(feature = "mongo-store") {
        "mongo"
    } else if cfg!(feature = "couch-store") {
        "couch"
    } else {
        "memory"
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
