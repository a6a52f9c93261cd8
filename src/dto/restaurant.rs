use serde::{Deserialize, Serialize};
use serde_with::{NoneAsEmptyString, serde_as};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::{
        collection_store::DocumentId,
        models::{Category, Record, RestaurantEntity, ReviewEntity},
    },
    dto::{format_system_time, validation::validate_not_blank},
};

/// Form payload used to register a new restaurant.
#[serde_as]
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct CreateRestaurantRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
    /// One of the fixed category labels; an omitted category leaves the form incomplete.
    #[validate(required)]
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub distance: String,
    /// An empty string is treated as no link.
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    #[validate(url)]
    pub map_link: Option<String>,
}

/// Review submitted from the restaurant list.
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct AddReviewRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub user: String,
    #[serde(default = "default_review_rating")]
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    #[validate(custom(function = "validate_not_blank"))]
    pub comment: String,
}

fn default_review_rating() -> u8 {
    5
}

/// Restaurant as rendered by the directory tab.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RestaurantSummary {
    #[schema(value_type = String)]
    pub id: DocumentId,
    pub name: String,
    pub category: Category,
    pub distance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_link: Option<String>,
    pub rating: f64,
    pub votes: u32,
    pub reviews: Vec<ReviewSummary>,
}

/// Review entry; `index` addresses it for deletion.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewSummary {
    pub index: usize,
    pub user: String,
    pub rating: u8,
    pub comment: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl From<&Record<RestaurantEntity>> for RestaurantSummary {
    fn from(record: &Record<RestaurantEntity>) -> Self {
        let body = &record.body;
        Self {
            id: record.id.clone(),
            name: body.name.clone(),
            category: body.category,
            distance: body.distance.clone(),
            map_link: body.map_link.clone(),
            rating: body.rating,
            votes: body.votes,
            reviews: body
                .reviews
                .iter()
                .enumerate()
                .map(ReviewSummary::from)
                .collect(),
        }
    }
}

impl From<(usize, &ReviewEntity)> for ReviewSummary {
    fn from((index, review): (usize, &ReviewEntity)) -> Self {
        Self {
            index,
            user: review.user.clone(),
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: format_system_time(review.created_at),
        }
    }
}

/// Row of the popularity ranking.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankingEntry {
    /// 1-based position.
    pub rank: usize,
    #[schema(value_type = String)]
    pub id: DocumentId,
    pub name: String,
    pub category: Category,
    pub votes: u32,
    pub rating: f64,
}

/// Query string accepted by `GET /rankings`.
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct RankingsQuery {
    /// Maximum number of entries to return; all restaurants when omitted.
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn restaurant_form_requires_name_and_category() {
        let request: CreateRestaurantRequest =
            serde_json::from_value(json!({"name": "  ", "category": "한식"})).unwrap();
        assert!(request.validate().is_err());

        let request: CreateRestaurantRequest =
            serde_json::from_value(json!({"name": "Bibim"})).unwrap();
        assert!(request.validate().is_err());

        let request: CreateRestaurantRequest = serde_json::from_value(
            json!({"name": "Bibim", "category": "한식", "distance": "5분", "map_link": ""}),
        )
        .unwrap();
        assert!(request.validate().is_ok());
        assert!(request.map_link.is_none());
    }

    #[test]
    fn map_link_must_be_a_url() {
        let request: CreateRestaurantRequest = serde_json::from_value(
            json!({"name": "Bibim", "category": "한식", "map_link": "not a link"}),
        )
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn review_defaults_to_five_stars_and_checks_range() {
        let request: AddReviewRequest =
            serde_json::from_value(json!({"user": "jin", "comment": "tasty"})).unwrap();
        assert_eq!(request.rating, 5);
        assert!(request.validate().is_ok());

        let request: AddReviewRequest =
            serde_json::from_value(json!({"user": "jin", "comment": "meh", "rating": 0})).unwrap();
        assert!(request.validate().is_err());

        let request: AddReviewRequest =
            serde_json::from_value(json!({"user": "", "comment": "meh", "rating": 3})).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn rankings_limit_is_bounded() {
        assert!(RankingsQuery { limit: Some(0) }.validate().is_err());
        assert!(RankingsQuery { limit: Some(101) }.validate().is_err());
        assert!(RankingsQuery { limit: Some(10) }.validate().is_ok());
        assert!(RankingsQuery::default().validate().is_ok());
    }
}
