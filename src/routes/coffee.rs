use axum::{Json, Router, extract::State, http::StatusCode, routing::{get, post}};

use crate::{
    dto::coffee::{CoffeeSpinStatus, CoffeeView, CoffeeWinSummary},
    error::AppError,
    services::coffee_service,
    state::SharedState,
};

/// Coffee payer tab.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/coffee", get(get_coffee))
        .route("/coffee/spin", post(spin_coffee))
        .route("/coffee/confirm", post(confirm_coffee))
        .route("/coffee/history", get(coffee_history))
}

#[utoipa::path(
    get,
    path = "/coffee",
    tag = "coffee",
    responses((status = 200, description = "Member wheel and spin state", body = CoffeeView))
)]
pub async fn get_coffee(State(state): State<SharedState>) -> Json<CoffeeView> {
    Json(coffee_service::coffee_view(&state))
}

/// Start a coffee spin; needs at least two members.
#[utoipa::path(
    post,
    path = "/coffee/spin",
    tag = "coffee",
    responses(
        (status = 202, description = "Spin accepted", body = CoffeeSpinStatus),
        (status = 400, description = "Fewer than two members")
    )
)]
pub async fn spin_coffee(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<CoffeeSpinStatus>), AppError> {
    let status = coffee_service::spin(&state)?;
    Ok((StatusCode::ACCEPTED, Json(status)))
}

/// Record the displayed winners in the coffee history.
#[utoipa::path(
    post,
    path = "/coffee/confirm",
    tag = "coffee",
    responses(
        (status = 204, description = "Result recorded"),
        (status = 409, description = "No result to confirm or another write in flight"),
        (status = 503, description = "Offline")
    )
)]
pub async fn confirm_coffee(State(state): State<SharedState>) -> Result<StatusCode, AppError> {
    coffee_service::confirm(&state).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/coffee/history",
    tag = "coffee",
    responses((status = 200, description = "Confirmed results, newest first", body = [CoffeeWinSummary]))
)]
pub async fn coffee_history(State(state): State<SharedState>) -> Json<Vec<CoffeeWinSummary>> {
    Json(coffee_service::history(&state))
}
