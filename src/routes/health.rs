use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::{common::StatusResponse, health::HealthResponse},
    services::health_service,
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
/// Return the current health status of the backend and ping the store.
pub async fn healthcheck(State(state): State<SharedState>) -> Json<HealthResponse> {
    let status = health_service::health_status(&state).await;
    Json(status)
}

#[utoipa::path(
    get,
    path = "/status",
    tag = "health",
    responses((status = 200, description = "Online and syncing flags", body = StatusResponse))
)]
/// Report whether the store is reachable and whether a write is in flight.
pub async fn status(State(state): State<SharedState>) -> Json<StatusResponse> {
    Json(health_service::status(&state))
}

/// Configure the health routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/healthcheck", get(healthcheck))
        .route("/status", get(status))
}
