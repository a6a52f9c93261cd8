use axum::{Json, Router, extract::State, http::StatusCode, routing::{get, post}};

use crate::{
    dto::roulette::{RestaurantSpinStatus, RouletteView},
    services::roulette_service,
    state::SharedState,
};

/// Lunch roulette tab.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/roulette", get(get_roulette))
        .route("/roulette/spin", post(spin_roulette))
}

#[utoipa::path(
    get,
    path = "/roulette",
    tag = "roulette",
    responses((status = 200, description = "Wheel layout and spin state", body = RouletteView))
)]
pub async fn get_roulette(State(state): State<SharedState>) -> Json<RouletteView> {
    Json(roulette_service::roulette_view(&state))
}

/// Start a spin. Ignored without restaurants or while a spin is running.
#[utoipa::path(
    post,
    path = "/roulette/spin",
    tag = "roulette",
    responses((status = 202, description = "Spin accepted; the result arrives on the SSE stream", body = RestaurantSpinStatus))
)]
pub async fn spin_roulette(
    State(state): State<SharedState>,
) -> (StatusCode, Json<RestaurantSpinStatus>) {
    (StatusCode::ACCEPTED, Json(roulette_service::spin(&state)))
}
