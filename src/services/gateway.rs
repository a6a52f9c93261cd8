//! Every write to the store goes through here: local validation, the
//! online gate, the single-writer syncing flag and error logging.

use std::{future::Future, sync::Arc, time::SystemTime};

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::{
    dao::{
        collection_store::{Collection, CollectionStore, DocumentId, Fields},
        models::{
            CoffeeWinEntity, MemberEntity, NAME_FIELD, RATING_FIELD, REVIEWS_FIELD, Record,
            RestaurantEntity, ReviewEntity, VOTES_FIELD, average_rating, to_fields,
        },
    },
    dto::{
        member::AddMemberRequest,
        restaurant::{AddReviewRequest, CreateRestaurantRequest},
    },
    error::ServiceError,
    services::{coffee_service, roulette_service, sse_events},
    state::{SharedState, SseHub, sync::SyncGuard},
};

/// What happened to a write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The store accepted the write.
    Applied,
    /// Local validation rejected the input; nothing was sent.
    Skipped,
}

/// Holds the syncing flag for one write and announces it on the SSE stream.
struct Syncing<'a> {
    guard: Option<SyncGuard<'a>>,
    hub: &'a SseHub,
}

impl<'a> Syncing<'a> {
    fn begin(state: &'a SharedState) -> Result<Self, ServiceError> {
        let guard = state.syncing().try_begin().ok_or(ServiceError::Busy)?;
        sse_events::broadcast_sync(state.public_sse(), true);
        Ok(Self {
            guard: Some(guard),
            hub: state.public_sse(),
        })
    }
}

impl Drop for Syncing<'_> {
    fn drop(&mut self) {
        self.guard.take();
        sse_events::broadcast_sync(self.hub, false);
    }
}

/// Gate and run one write. The flag is released however `work` ends.
async fn run_write<T, F, Fut>(
    state: &SharedState,
    operation: &'static str,
    work: F,
) -> Result<T, ServiceError>
where
    F: FnOnce(Arc<dyn CollectionStore>) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    if !state.is_online() {
        warn!(operation, "rejecting write while offline");
        return Err(ServiceError::Offline);
    }
    let store = state.require_store().await?;
    let syncing = Syncing::begin(state).inspect_err(|_| {
        warn!(operation, "rejecting write while another one is in flight");
    })?;

    let result = work(store).await;
    drop(syncing);

    match &result {
        Ok(_) => debug!(operation, "write applied"),
        Err(err) => error!(operation, error = %err, "write failed"),
    }
    result
}

fn is_valid(operation: &'static str, payload: &impl Validate) -> bool {
    match payload.validate() {
        Ok(()) => true,
        Err(errors) => {
            debug!(operation, %errors, "skipping invalid input");
            false
        }
    }
}

/// Register a new restaurant with zeroed counters.
pub async fn add_restaurant(
    state: &SharedState,
    request: CreateRestaurantRequest,
) -> Result<MutationOutcome, ServiceError> {
    if !is_valid("add_restaurant", &request) {
        return Ok(MutationOutcome::Skipped);
    }
    let Some(category) = request.category else {
        return Ok(MutationOutcome::Skipped);
    };

    let entity = RestaurantEntity {
        name: request.name.trim().to_owned(),
        category,
        distance: request.distance.trim().to_owned(),
        map_link: request.map_link.map(|link| link.trim().to_owned()),
        rating: 0.0,
        reviews: Vec::new(),
        votes: 0,
    };
    let fields = to_fields(&entity)?;

    run_write(state, "add_restaurant", |store| async move {
        let id = store.create(Collection::Restaurants, fields).await?;
        info!(%id, name = %entity.name, "restaurant added");
        Ok(MutationOutcome::Applied)
    })
    .await
}

pub async fn remove_restaurant(
    state: &SharedState,
    id: DocumentId,
) -> Result<MutationOutcome, ServiceError> {
    run_write(state, "remove_restaurant", |store| async move {
        store.delete(Collection::Restaurants, id).await?;
        Ok(MutationOutcome::Applied)
    })
    .await
}

/// Add one vote with the store's atomic increment.
pub async fn vote_restaurant(
    state: &SharedState,
    id: DocumentId,
) -> Result<MutationOutcome, ServiceError> {
    run_write(state, "vote_restaurant", |store| async move {
        store
            .increment(Collection::Restaurants, id, VOTES_FIELD, 1)
            .await?;
        Ok(MutationOutcome::Applied)
    })
    .await
}

/// Append a review and store the recomputed rating in the same conditional write.
pub async fn add_review(
    state: &SharedState,
    id: DocumentId,
    request: AddReviewRequest,
) -> Result<MutationOutcome, ServiceError> {
    if !is_valid("add_review", &request) {
        return Ok(MutationOutcome::Skipped);
    }

    let review = ReviewEntity {
        user: request.user.trim().to_owned(),
        rating: request.rating,
        comment: request.comment.trim().to_owned(),
        created_at: SystemTime::now(),
    };

    rewrite_reviews(state, "add_review", id, move |reviews| {
        reviews.push(review);
        Ok(())
    })
    .await
}

/// Delete the review at `index` (insertion order) and recompute the rating.
pub async fn remove_review(
    state: &SharedState,
    id: DocumentId,
    index: usize,
) -> Result<MutationOutcome, ServiceError> {
    rewrite_reviews(state, "remove_review", id, move |reviews| {
        if index >= reviews.len() {
            return Err(ServiceError::NotFound(format!(
                "review {index} does not exist"
            )));
        }
        reviews.remove(index);
        Ok(())
    })
    .await
}

async fn rewrite_reviews<F>(
    state: &SharedState,
    operation: &'static str,
    id: DocumentId,
    edit: F,
) -> Result<MutationOutcome, ServiceError>
where
    F: FnOnce(&mut Vec<ReviewEntity>) -> Result<(), ServiceError>,
{
    run_write(state, operation, |store| async move {
        // Read from the store: the mirror may not have seen our previous write yet.
        let document = store
            .get(Collection::Restaurants, id.clone())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("restaurant {id} not found")))?;
        let record = Record::<RestaurantEntity>::try_from(document)?;

        let mut reviews = record.body.reviews;
        edit(&mut reviews)?;
        let rating = average_rating(&reviews);

        let mut fields = Fields::new();
        fields.insert(REVIEWS_FIELD.into(), serde_json::to_value(&reviews)?);
        fields.insert(RATING_FIELD.into(), Value::from(rating));

        store
            .update_fields(Collection::Restaurants, id, fields, Some(record.revision))
            .await?;
        Ok(MutationOutcome::Applied)
    })
    .await
}

/// Delete every restaurant and hide a displayed roulette result.
pub async fn clear_restaurants(state: &SharedState) -> Result<MutationOutcome, ServiceError> {
    let outcome = run_write(state, "clear_restaurants", |store| {
        clear_collection(store, Collection::Restaurants)
    })
    .await?;
    if state.restaurant_spin().clear_result() {
        roulette_service::publish_status(state);
    }
    Ok(outcome)
}

/// Add a member; names are trimmed and must not already be in the pool.
///
/// The duplicate check runs against the store while the syncing flag is held,
/// so back-to-back adds of one name cannot both land.
pub async fn add_member(
    state: &SharedState,
    request: AddMemberRequest,
) -> Result<MutationOutcome, ServiceError> {
    if !is_valid("add_member", &request) {
        return Ok(MutationOutcome::Skipped);
    }
    let name = request.name.trim().to_owned();
    let fields = to_fields(&MemberEntity { name: name.clone() })?;

    run_write(state, "add_member", |store| async move {
        let taken = store
            .list(Collection::Members)
            .await?
            .iter()
            .filter_map(|document| document.fields.get(NAME_FIELD).and_then(Value::as_str))
            .any(|existing| existing.trim() == name);
        if taken {
            debug!(%name, "skipping duplicate member");
            return Ok(MutationOutcome::Skipped);
        }

        store.create(Collection::Members, fields).await?;
        Ok(MutationOutcome::Applied)
    })
    .await
}

pub async fn remove_member(
    state: &SharedState,
    id: DocumentId,
) -> Result<MutationOutcome, ServiceError> {
    run_write(state, "remove_member", |store| async move {
        store.delete(Collection::Members, id).await?;
        Ok(MutationOutcome::Applied)
    })
    .await
}

/// Delete every member and hide a displayed coffee result.
pub async fn clear_members(state: &SharedState) -> Result<MutationOutcome, ServiceError> {
    let outcome = run_write(state, "clear_members", |store| {
        clear_collection(store, Collection::Members)
    })
    .await?;
    if state.coffee_spin().clear_result() {
        coffee_service::publish_status(state);
    }
    Ok(outcome)
}

/// Append a confirmed coffee result to the history.
pub async fn record_coffee_win(
    state: &SharedState,
    winners: Vec<String>,
) -> Result<MutationOutcome, ServiceError> {
    let entity = CoffeeWinEntity {
        winners,
        date: SystemTime::now(),
        confirmed: true,
    };
    let fields = to_fields(&entity)?;

    run_write(state, "record_coffee_win", |store| async move {
        let id = store.create(Collection::CoffeeWins, fields).await?;
        info!(%id, winners = ?entity.winners, "coffee result confirmed");
        Ok(MutationOutcome::Applied)
    })
    .await
}

/// List the collection and delete everything concurrently; any failure fails the whole clear.
async fn clear_collection(
    store: Arc<dyn CollectionStore>,
    collection: Collection,
) -> Result<MutationOutcome, ServiceError> {
    let documents = store.list(collection).await?;
    let count = documents.len();
    let deletions = documents
        .into_iter()
        .map(|document| store.delete(collection, document.id));

    for result in join_all(deletions).await {
        result?;
    }
    info!(%collection, count, "collection cleared");
    Ok(MutationOutcome::Applied)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        config::AppConfig,
        state::AppState,
        test_support::{online_state, wait_until},
    };

    fn restaurant_request(name: &str) -> CreateRestaurantRequest {
        serde_json::from_value(json!({"name": name, "category": "한식", "distance": "3분"}))
            .unwrap()
    }

    fn review_request(rating: u8) -> AddReviewRequest {
        serde_json::from_value(json!({"user": "jin", "rating": rating, "comment": "ok"})).unwrap()
    }

    async fn seed_restaurants(state: &SharedState, names: &[&str]) -> Vec<Record<RestaurantEntity>> {
        for name in names {
            add_restaurant(state, restaurant_request(name)).await.unwrap();
        }
        let mut watcher = state.mirror().watch_restaurants();
        wait_until(&mut watcher, |records| records.len() == names.len()).await
    }

    #[tokio::test]
    async fn offline_writes_leave_everything_untouched() {
        let state = AppState::new(AppConfig::default());
        let result = add_restaurant(&state, restaurant_request("A")).await;
        assert!(matches!(result, Err(ServiceError::Offline)));
        assert!(!state.syncing().is_syncing());

        let (state, store) = online_state().await;
        state.update_online(false);
        let result = add_member(
            &state,
            AddMemberRequest {
                name: "jin".into(),
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::Offline)));
        assert!(!state.syncing().is_syncing());
        assert!(store.list(Collection::Members).await.unwrap().is_empty());
        assert!(state.mirror().members().is_empty());
    }

    #[tokio::test]
    async fn invalid_input_is_skipped_without_touching_the_store() {
        let (state, store) = online_state().await;
        let outcome = add_restaurant(&state, restaurant_request("   ")).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Skipped);

        let no_category: CreateRestaurantRequest =
            serde_json::from_value(json!({"name": "A"})).unwrap();
        let outcome = add_restaurant(&state, no_category).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Skipped);
        assert!(store.list(Collection::Restaurants).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn busy_flag_rejects_a_second_writer() {
        let (state, _store) = online_state().await;
        let _held = state.syncing().try_begin().unwrap();
        let result = add_restaurant(&state, restaurant_request("A")).await;
        assert!(matches!(result, Err(ServiceError::Busy)));
    }

    #[tokio::test]
    async fn failed_store_write_releases_the_flag() {
        let (state, store) = online_state().await;
        store.set_available(false);
        let result = add_restaurant(&state, restaurant_request("A")).await;
        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
        assert!(!state.syncing().is_syncing());
    }

    #[tokio::test]
    async fn members_are_trimmed_and_unique() {
        let (state, store) = online_state().await;
        let outcome = add_member(&state, AddMemberRequest { name: "  jin ".into() })
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Applied);

        let mut watcher = state.mirror().watch_members();
        wait_until(&mut watcher, |members| members.len() == 1).await;
        let outcome = add_member(&state, AddMemberRequest { name: "jin".into() })
            .await
            .unwrap();
        assert_eq!(outcome, MutationOutcome::Skipped);

        let stored = store.list(Collection::Members).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].fields["name"], json!("jin"));
    }

    #[tokio::test]
    async fn back_to_back_adds_of_one_name_store_it_once() {
        let (state, store) = online_state().await;
        let first = add_member(&state, AddMemberRequest { name: "jin".into() })
            .await
            .unwrap();
        let second = add_member(&state, AddMemberRequest { name: " jin".into() })
            .await
            .unwrap();

        assert_eq!(first, MutationOutcome::Applied);
        assert_eq!(second, MutationOutcome::Skipped);
        assert_eq!(store.list(Collection::Members).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rating_follows_review_additions_and_removals() {
        let (state, _store) = online_state().await;
        let seeded = seed_restaurants(&state, &["A"]).await;
        let id = seeded[0].id.clone();
        let mut watcher = state.mirror().watch_restaurants();

        for (count, rating) in [(1, 5), (2, 4), (3, 4)] {
            add_review(&state, id.clone(), review_request(rating))
                .await
                .unwrap();
            wait_until(&mut watcher, |records| records[0].body.reviews.len() == count).await;
        }
        assert_eq!(state.mirror().restaurants()[0].body.rating, 4.3);

        for remaining in [2, 1, 0] {
            remove_review(&state, id.clone(), 0).await.unwrap();
            wait_until(&mut watcher, |records| {
                records[0].body.reviews.len() == remaining
            })
            .await;
        }
        assert_eq!(state.mirror().restaurants()[0].body.rating, 0.0);
    }

    #[tokio::test]
    async fn removing_a_missing_review_is_not_found() {
        let (state, _store) = online_state().await;
        let seeded = seed_restaurants(&state, &["A"]).await;
        let result = remove_review(&state, seeded[0].id.clone(), 3).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert!(!state.syncing().is_syncing());
    }

    #[tokio::test]
    async fn back_to_back_review_edits_both_land() {
        let (state, store) = online_state().await;
        let seeded = seed_restaurants(&state, &["A"]).await;
        let id = seeded[0].id.clone();

        vote_restaurant(&state, id.clone()).await.unwrap();
        for rating in [5, 4] {
            let outcome = add_review(&state, id.clone(), review_request(rating))
                .await
                .unwrap();
            assert_eq!(outcome, MutationOutcome::Applied);
        }

        let stored = store
            .get(Collection::Restaurants, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.fields["reviews"].as_array().unwrap().len(), 2);
        assert_eq!(stored.fields["rating"], json!(4.5));
        assert_eq!(stored.fields["votes"], json!(1));
    }

    #[tokio::test]
    async fn review_edit_keeps_changes_the_mirror_has_not_seen() {
        let (state, store) = online_state().await;
        let seeded = seed_restaurants(&state, &["A"]).await;
        let id = seeded[0].id.clone();

        // Another client rewrites the document while our mirror is not following.
        state.mirror().teardown();
        let mut fields = Fields::new();
        fields.insert("distance".into(), json!("far"));
        store
            .update_fields(
                Collection::Restaurants,
                id.clone(),
                fields,
                Some(seeded[0].revision.clone()),
            )
            .await
            .unwrap();

        add_review(&state, id.clone(), review_request(3)).await.unwrap();
        let stored = store
            .get(Collection::Restaurants, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.fields["distance"], json!("far"));
        assert_eq!(stored.fields["rating"], json!(3.0));
    }

    #[tokio::test]
    async fn reviewing_a_missing_restaurant_is_not_found() {
        let (state, _store) = online_state().await;
        let result = add_review(&state, DocumentId::from("nope"), review_request(5)).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        assert!(!state.syncing().is_syncing());
    }

    #[tokio::test]
    async fn clearing_an_empty_collection_succeeds() {
        let (state, _store) = online_state().await;
        let outcome = clear_restaurants(&state).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Applied);
        assert!(state.mirror().restaurants().is_empty());
    }

    #[tokio::test]
    async fn clearing_restaurants_empties_store_and_result() {
        let (state, store) = online_state().await;
        let seeded = seed_restaurants(&state, &["A", "B", "C"]).await;
        let ticket = state.restaurant_spin().begin().unwrap();
        state.restaurant_spin().complete(ticket, seeded[1].clone());

        clear_restaurants(&state).await.unwrap();
        assert!(store.list(Collection::Restaurants).await.unwrap().is_empty());
        assert!(state.restaurant_spin().read(|machine| machine.result().is_none()));
        let mut watcher = state.mirror().watch_restaurants();
        wait_until(&mut watcher, |records| records.is_empty()).await;
    }

    #[tokio::test]
    async fn failed_clear_reports_the_whole_operation() {
        let (state, store) = online_state().await;
        seed_restaurants(&state, &["A", "B"]).await;
        store.set_available(false);
        let result = clear_restaurants(&state).await;
        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
    }

    #[tokio::test]
    async fn seeded_spin_then_vote_marks_the_winner() {
        let (state, _store) = online_state().await;
        let seeded = seed_restaurants(&state, &["A", "B", "C"]).await;
        assert!(seeded.iter().all(|record| record.body.votes == 0));

        roulette_service::spin(&state);
        let mut spin = state.restaurant_spin().watcher();
        let machine = wait_until(&mut spin, |machine| machine.result().is_some()).await;
        let winner = machine.result().unwrap().clone();
        let position = seeded.iter().position(|r| r.id == winner.id).unwrap();

        vote_restaurant(&state, winner.id.clone()).await.unwrap();
        let mut watcher = state.mirror().watch_restaurants();
        let records = wait_until(&mut watcher, |records| {
            records.iter().map(|r| r.body.votes).sum::<u32>() == 1
        })
        .await;
        let votes: Vec<u32> = records.iter().map(|r| r.body.votes).collect();
        let mut expected = vec![0, 0, 0];
        expected[position] = 1;
        assert_eq!(votes, expected);
    }

    #[tokio::test]
    async fn voting_for_a_missing_restaurant_is_not_found() {
        let (state, _store) = online_state().await;
        let result = vote_restaurant(&state, DocumentId::from("nope")).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn coffee_win_is_recorded_with_a_timestamp() {
        let (state, store) = online_state().await;
        record_coffee_win(&state, vec!["jin".into(), "mina".into()])
            .await
            .unwrap();
        let stored = store.list(Collection::CoffeeWins).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].fields["winners"], json!(["jin", "mina"]));
        assert_eq!(stored[0].fields["confirmed"], json!(true));
        assert!(stored[0].fields["date"].is_i64());
    }
}
