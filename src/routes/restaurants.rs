use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use axum_valid::Valid;

use crate::{
    dao::collection_store::DocumentId,
    dto::restaurant::{
        AddReviewRequest, CreateRestaurantRequest, RankingEntry, RankingsQuery, RestaurantSummary,
    },
    error::AppError,
    services::{directory_service, gateway},
    state::SharedState,
};

/// Restaurant directory and rankings.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/restaurants",
            get(list_restaurants)
                .post(add_restaurant)
                .delete(clear_restaurants),
        )
        .route("/restaurants/{id}", delete(remove_restaurant))
        .route("/restaurants/{id}/vote", post(vote_restaurant))
        .route("/restaurants/{id}/reviews", post(add_review))
        .route("/restaurants/{id}/reviews/{index}", delete(remove_review))
        .route("/rankings", get(rankings))
}

#[utoipa::path(
    get,
    path = "/restaurants",
    tag = "restaurants",
    responses((status = 200, description = "Restaurants in creation order", body = [RestaurantSummary]))
)]
pub async fn list_restaurants(State(state): State<SharedState>) -> Json<Vec<RestaurantSummary>> {
    Json(directory_service::restaurants(&state))
}

/// Register a restaurant. An incomplete form is ignored.
#[utoipa::path(
    post,
    path = "/restaurants",
    tag = "restaurants",
    request_body = CreateRestaurantRequest,
    responses(
        (status = 204, description = "Restaurant added or input ignored"),
        (status = 409, description = "Another write in flight"),
        (status = 503, description = "Offline or store failure")
    )
)]
pub async fn add_restaurant(
    State(state): State<SharedState>,
    Json(payload): Json<CreateRestaurantRequest>,
) -> Result<StatusCode, AppError> {
    gateway::add_restaurant(&state, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/restaurants/{id}",
    tag = "restaurants",
    params(("id" = String, Path, description = "Restaurant identifier")),
    responses(
        (status = 204, description = "Restaurant removed"),
        (status = 503, description = "Offline or store failure")
    )
)]
pub async fn remove_restaurant(
    State(state): State<SharedState>,
    Path(id): Path<DocumentId>,
) -> Result<StatusCode, AppError> {
    gateway::remove_restaurant(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove every restaurant and hide a displayed roulette result.
#[utoipa::path(
    delete,
    path = "/restaurants",
    tag = "restaurants",
    responses(
        (status = 204, description = "All restaurants removed"),
        (status = 503, description = "Offline or store failure")
    )
)]
pub async fn clear_restaurants(State(state): State<SharedState>) -> Result<StatusCode, AppError> {
    gateway::clear_restaurants(&state).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/restaurants/{id}/vote",
    tag = "restaurants",
    params(("id" = String, Path, description = "Restaurant identifier")),
    responses(
        (status = 204, description = "Vote counted"),
        (status = 404, description = "Unknown restaurant"),
        (status = 503, description = "Offline or store failure")
    )
)]
pub async fn vote_restaurant(
    State(state): State<SharedState>,
    Path(id): Path<DocumentId>,
) -> Result<StatusCode, AppError> {
    gateway::vote_restaurant(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Append a review; the rating is recomputed in the same write.
#[utoipa::path(
    post,
    path = "/restaurants/{id}/reviews",
    tag = "restaurants",
    params(("id" = String, Path, description = "Restaurant identifier")),
    request_body = AddReviewRequest,
    responses(
        (status = 204, description = "Review added or input ignored"),
        (status = 404, description = "Unknown restaurant"),
        (status = 409, description = "Restaurant changed concurrently"),
        (status = 503, description = "Offline or store failure")
    )
)]
pub async fn add_review(
    State(state): State<SharedState>,
    Path(id): Path<DocumentId>,
    Json(payload): Json<AddReviewRequest>,
) -> Result<StatusCode, AppError> {
    gateway::add_review(&state, id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/restaurants/{id}/reviews/{index}",
    tag = "restaurants",
    params(
        ("id" = String, Path, description = "Restaurant identifier"),
        ("index" = usize, Path, description = "Zero-based review position")
    ),
    responses(
        (status = 204, description = "Review removed"),
        (status = 404, description = "Unknown restaurant or review"),
        (status = 409, description = "Restaurant changed concurrently"),
        (status = 503, description = "Offline or store failure")
    )
)]
pub async fn remove_review(
    State(state): State<SharedState>,
    Path((id, index)): Path<(DocumentId, usize)>,
) -> Result<StatusCode, AppError> {
    gateway::remove_review(&state, id, index).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Popularity ranking: votes first, then rating.
#[utoipa::path(
    get,
    path = "/rankings",
    tag = "restaurants",
    params(RankingsQuery),
    responses(
        (status = 200, description = "Ranked restaurants", body = [RankingEntry]),
        (status = 400, description = "Limit outside 1..=100")
    )
)]
pub async fn rankings(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<RankingsQuery>>,
) -> Json<Vec<RankingEntry>> {
    Json(directory_service::rankings(&state, query.limit))
}
