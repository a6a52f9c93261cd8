use std::cmp::Ordering;

use crate::{
    dto::{
        member::MemberSummary,
        restaurant::{RankingEntry, RestaurantSummary},
    },
    state::SharedState,
};

/// Restaurants in creation order.
pub fn restaurants(state: &SharedState) -> Vec<RestaurantSummary> {
    state
        .mirror()
        .restaurants()
        .iter()
        .map(RestaurantSummary::from)
        .collect()
}

pub fn members(state: &SharedState) -> Vec<MemberSummary> {
    state
        .mirror()
        .members()
        .iter()
        .map(MemberSummary::from)
        .collect()
}

/// Most voted first, ties broken by rating; the sort is stable so equal
/// entries keep creation order.
pub fn rankings(state: &SharedState, limit: Option<usize>) -> Vec<RankingEntry> {
    let mut records = state.mirror().restaurants();
    records.sort_by(|a, b| {
        b.body.votes.cmp(&a.body.votes).then_with(|| {
            b.body
                .rating
                .partial_cmp(&a.body.rating)
                .unwrap_or(Ordering::Equal)
        })
    });

    records
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(position, record)| RankingEntry {
            rank: position + 1,
            id: record.id,
            name: record.body.name,
            category: record.body.category,
            votes: record.body.votes,
            rating: record.body.rating,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        dao::{
            collection_store::{Collection, CollectionStore},
            models::to_fields,
        },
        test_support::{online_state, wait_until},
    };

    #[tokio::test]
    async fn rankings_order_by_votes_then_rating() {
        let (state, store) = online_state().await;
        for (name, votes, rating) in [("A", 1, 3.0), ("B", 4, 2.0), ("C", 1, 4.5), ("D", 0, 5.0)] {
            let fields = to_fields(&json!({
                "name": name,
                "category": "기타",
                "votes": votes,
                "rating": rating,
            }))
            .unwrap();
            store.create(Collection::Restaurants, fields).await.unwrap();
        }
        let mut watcher = state.mirror().watch_restaurants();
        wait_until(&mut watcher, |records| records.len() == 4).await;

        let names: Vec<String> = rankings(&state, None).into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["B", "C", "A", "D"]);

        let top = rankings(&state, Some(2));
        assert_eq!(top.len(), 2);
        assert_eq!(top[1].rank, 2);
        assert_eq!(top[1].name, "C");
        assert_eq!(restaurants(&state).len(), 4);
    }
}
