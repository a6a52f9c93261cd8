use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use serde_with::{TimestampMilliSeconds, serde_as};
use std::time::SystemTime;
use utoipa::ToSchema;

use crate::dao::collection_store::{DocumentId, Fields, Revision, StoredDocument};

/// Field names written directly by the mutation paths.
pub const NAME_FIELD: &str = "name";
pub const VOTES_FIELD: &str = "votes";
pub const REVIEWS_FIELD: &str = "reviews";
pub const RATING_FIELD: &str = "rating";

/// Fixed set of food categories offered by the restaurant form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum Category {
    #[serde(rename = "한식")]
    Korean,
    #[serde(rename = "양식")]
    Western,
    #[serde(rename = "일식")]
    Japanese,
    #[serde(rename = "중식")]
    Chinese,
    #[serde(rename = "아시안")]
    Asian,
    #[serde(rename = "패스트푸드")]
    FastFood,
    #[serde(rename = "기타")]
    Other,
}

/// Restaurant document stored in the `restaurants` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestaurantEntity {
    /// Display name.
    pub name: String,
    pub category: Category,
    /// Free-text distance hint (e.g. "5 min walk").
    #[serde(default)]
    pub distance: String,
    /// Optional link to an external map page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_link: Option<String>,
    /// Average review rating rounded to one decimal, 0 without reviews.
    #[serde(default)]
    pub rating: f64,
    /// Reviews in insertion order.
    #[serde(default)]
    pub reviews: Vec<ReviewEntity>,
    #[serde(default)]
    pub votes: u32,
}

/// Review embedded in a restaurant document.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewEntity {
    pub user: String,
    /// Integer score between 1 and 5.
    pub rating: u8,
    pub comment: String,
    /// Milliseconds since the Unix epoch on the wire.
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub created_at: SystemTime,
}

/// Member document stored in the `members` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberEntity {
    pub name: String,
}

/// Append-only record of a confirmed coffee spin.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoffeeWinEntity {
    /// Snapshot of the winners' names at confirmation time.
    pub winners: Vec<String>,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub date: SystemTime,
    pub confirmed: bool,
}

/// Typed view over a stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    pub id: DocumentId,
    pub revision: Revision,
    pub body: T,
}

impl<T: DeserializeOwned> TryFrom<StoredDocument> for Record<T> {
    type Error = serde_json::Error;

    fn try_from(document: StoredDocument) -> Result<Self, Self::Error> {
        let body = serde_json::from_value(Value::Object(document.fields))?;
        Ok(Self {
            id: document.id,
            revision: document.revision,
            body,
        })
    }
}

/// Serialize an entity into the field map sent to the store.
pub fn to_fields<T: Serialize>(entity: &T) -> serde_json::Result<Fields> {
    match serde_json::to_value(entity)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Fields::new();
            map.insert("value".into(), other);
            Ok(map)
        }
    }
}

/// Mean of the review ratings rounded to one decimal; 0 when there are none.
pub fn average_rating(reviews: &[ReviewEntity]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let sum: u32 = reviews.iter().map(|review| u32::from(review.rating)).sum();
    let mean = f64::from(sum) / reviews.len() as f64;
    (mean * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn review(rating: u8) -> ReviewEntity {
        ReviewEntity {
            user: "jin".into(),
            rating,
            comment: "good".into(),
            created_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn average_rating_rounds_to_one_decimal() {
        assert_eq!(average_rating(&[]), 0.0);
        assert_eq!(average_rating(&[review(5)]), 5.0);
        assert_eq!(average_rating(&[review(5), review(4), review(4)]), 4.3);
        assert_eq!(average_rating(&[review(1), review(2)]), 1.5);
        assert_eq!(average_rating(&[review(4), review(5), review(5)]), 4.7);
    }

    #[test]
    fn category_uses_korean_labels_on_the_wire() {
        assert_eq!(serde_json::to_value(Category::FastFood).unwrap(), json!("패스트푸드"));
        let parsed: Category = serde_json::from_value(json!("중식")).unwrap();
        assert_eq!(parsed, Category::Chinese);
    }

    #[test]
    fn timestamps_are_epoch_milliseconds_on_the_wire() {
        let win = CoffeeWinEntity {
            winners: vec!["jin".into()],
            date: SystemTime::UNIX_EPOCH + std::time::Duration::from_millis(1_700_000_000_123),
            confirmed: true,
        };
        let fields = to_fields(&win).unwrap();
        assert_eq!(fields["date"], json!(1_700_000_000_123_i64));

        let mut review = review(4);
        review.created_at = win.date;
        let value = serde_json::to_value(&review).unwrap();
        assert_eq!(value["created_at"], json!(1_700_000_000_123_i64));
        let parsed: ReviewEntity = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.created_at, win.date);
    }

    #[test]
    fn restaurant_defaults_missing_counters() {
        let document = StoredDocument {
            id: DocumentId::from("r1"),
            revision: Revision("1".into()),
            fields: to_fields(&json!({"name": "Bibim", "category": "한식"})).unwrap(),
        };
        let record: Record<RestaurantEntity> = document.try_into().unwrap();
        assert_eq!(record.body.votes, 0);
        assert!(record.body.reviews.is_empty());
        assert_eq!(record.body.rating, 0.0);
    }
}
