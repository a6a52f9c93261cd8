use axum::Router;

use crate::state::SharedState;

pub mod coffee;
pub mod docs;
pub mod health;
pub mod members;
pub mod restaurants;
pub mod roulette;
pub mod sse;

/// Compose all route trees and wire in the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(roulette::router())
        .merge(coffee::router())
        .merge(members::router())
        .merge(restaurants::router())
        .merge(docs::router());

    api_router.with_state(state)
}
