use tracing::warn;

use crate::{
    dto::{common::StatusResponse, health::HealthResponse},
    state::SharedState,
};

/// Respond with a static health payload while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (offline)"),
    }

    if state.is_online() {
        HealthResponse::ok()
    } else {
        HealthResponse::degraded()
    }
}

/// Connectivity and syncing flags as shown in every tab header.
pub fn status(state: &SharedState) -> StatusResponse {
    StatusResponse {
        online: state.is_online(),
        syncing: state.syncing().is_syncing(),
    }
}
