use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Lunch Roulette Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::health::status,
        crate::routes::sse::public_stream,
        crate::routes::roulette::get_roulette,
        crate::routes::roulette::spin_roulette,
        crate::routes::coffee::get_coffee,
        crate::routes::coffee::spin_coffee,
        crate::routes::coffee::confirm_coffee,
        crate::routes::coffee::coffee_history,
        crate::routes::members::list_members,
        crate::routes::members::add_member,
        crate::routes::members::remove_member,
        crate::routes::members::clear_members,
        crate::routes::restaurants::list_restaurants,
        crate::routes::restaurants::add_restaurant,
        crate::routes::restaurants::remove_restaurant,
        crate::routes::restaurants::clear_restaurants,
        crate::routes::restaurants::vote_restaurant,
        crate::routes::restaurants::add_review,
        crate::routes::restaurants::remove_review,
        crate::routes::restaurants::rankings,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::common::StatusResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::ConnectivityEvent,
            crate::dto::sse::SyncEvent,
            crate::dto::roulette::WheelSegment,
            crate::dto::roulette::RouletteView,
            crate::dto::roulette::RestaurantSpinStatus,
            crate::dto::coffee::CoffeeView,
            crate::dto::coffee::CoffeeSpinStatus,
            crate::dto::coffee::CoffeeWinSummary,
            crate::dto::member::AddMemberRequest,
            crate::dto::member::MemberSummary,
            crate::dto::restaurant::CreateRestaurantRequest,
            crate::dto::restaurant::AddReviewRequest,
            crate::dto::restaurant::RestaurantSummary,
            crate::dto::restaurant::ReviewSummary,
            crate::dto::restaurant::RankingEntry,
            crate::dao::models::Category,
        )
    ),
    tags(
        (name = "health", description = "Health and connectivity"),
        (name = "sse", description = "Server-sent events stream"),
        (name = "roulette", description = "Lunch restaurant wheel"),
        (name = "coffee", description = "Coffee payer wheel"),
        (name = "members", description = "Coffee member pool"),
        (name = "restaurants", description = "Restaurant directory, reviews and rankings"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_tab() {
        let doc = ApiDoc::openapi();
        for path in ["/roulette/spin", "/coffee/confirm", "/restaurants/{id}/reviews/{index}", "/rankings"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
