use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};

use crate::{
    dao::collection_store::DocumentId,
    dto::member::{AddMemberRequest, MemberSummary},
    error::AppError,
    services::{directory_service, gateway},
    state::SharedState,
};

/// Coffee member pool management.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/members",
            get(list_members).post(add_member).delete(clear_members),
        )
        .route("/members/{id}", delete(remove_member))
}

#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    responses((status = 200, description = "Current members", body = [MemberSummary]))
)]
pub async fn list_members(State(state): State<SharedState>) -> Json<Vec<MemberSummary>> {
    Json(directory_service::members(&state))
}

/// Add a member. Blank or duplicate names are ignored.
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    request_body = AddMemberRequest,
    responses(
        (status = 204, description = "Member added or input ignored"),
        (status = 409, description = "Another write in flight"),
        (status = 503, description = "Offline or store failure")
    )
)]
pub async fn add_member(
    State(state): State<SharedState>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<StatusCode, AppError> {
    gateway::add_member(&state, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/members/{id}",
    tag = "members",
    params(("id" = String, Path, description = "Member identifier")),
    responses(
        (status = 204, description = "Member removed"),
        (status = 503, description = "Offline or store failure")
    )
)]
pub async fn remove_member(
    State(state): State<SharedState>,
    Path(id): Path<DocumentId>,
) -> Result<StatusCode, AppError> {
    gateway::remove_member(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove every member and hide a displayed coffee result.
#[utoipa::path(
    delete,
    path = "/members",
    tag = "members",
    responses(
        (status = 204, description = "All members removed"),
        (status = 503, description = "Offline or store failure")
    )
)]
pub async fn clear_members(State(state): State<SharedState>) -> Result<StatusCode, AppError> {
    gateway::clear_members(&state).await?;
    Ok(StatusCode::NO_CONTENT)
}
