use serde::Serialize;
use tracing::warn;

use crate::{
    dao::models::{CoffeeWinEntity, MemberEntity, Record, RestaurantEntity},
    dto::{
        coffee::{CoffeeSpinStatus, CoffeeWinSummary},
        member::MemberSummary,
        restaurant::RestaurantSummary,
        roulette::RestaurantSpinStatus,
        sse::{
            CoffeeHistoryEvent, ConnectivityEvent, MembersSnapshotEvent,
            RestaurantsSnapshotEvent, ServerEvent, SyncEvent,
        },
    },
    state::SseHub,
};

const EVENT_RESTAURANTS: &str = "restaurants.snapshot";
const EVENT_MEMBERS: &str = "members.snapshot";
const EVENT_COFFEE_HISTORY: &str = "coffee.history";
const EVENT_RESTAURANT_SPIN: &str = "roulette.spin";
const EVENT_COFFEE_SPIN: &str = "coffee.spin";
const EVENT_CONNECTIVITY: &str = "connectivity";
const EVENT_SYNC: &str = "sync";

/// Restaurant list event, also sent to clients as they connect.
pub fn restaurants_event(records: &[Record<RestaurantEntity>]) -> Option<ServerEvent> {
    let payload = RestaurantsSnapshotEvent(records.iter().map(RestaurantSummary::from).collect());
    encode(EVENT_RESTAURANTS, &payload)
}

pub fn members_event(records: &[Record<MemberEntity>]) -> Option<ServerEvent> {
    let payload = MembersSnapshotEvent(records.iter().map(MemberSummary::from).collect());
    encode(EVENT_MEMBERS, &payload)
}

pub fn coffee_history_event(records: &[Record<CoffeeWinEntity>]) -> Option<ServerEvent> {
    let payload = CoffeeHistoryEvent(records.iter().map(CoffeeWinSummary::from).collect());
    encode(EVENT_COFFEE_HISTORY, &payload)
}

pub fn restaurant_spin_event(status: &RestaurantSpinStatus) -> Option<ServerEvent> {
    encode(EVENT_RESTAURANT_SPIN, status)
}

pub fn coffee_spin_event(status: &CoffeeSpinStatus) -> Option<ServerEvent> {
    encode(EVENT_COFFEE_SPIN, status)
}

/// Broadcast the restaurant list received from the change feed.
pub fn broadcast_restaurants(hub: &SseHub, records: &[Record<RestaurantEntity>]) {
    publish(hub, restaurants_event(records));
}

/// Broadcast the member list received from the change feed.
pub fn broadcast_members(hub: &SseHub, records: &[Record<MemberEntity>]) {
    publish(hub, members_event(records));
}

/// Broadcast the confirmed coffee results received from the change feed.
pub fn broadcast_coffee_history(hub: &SseHub, records: &[Record<CoffeeWinEntity>]) {
    publish(hub, coffee_history_event(records));
}

/// Broadcast a restaurant wheel transition.
pub fn broadcast_restaurant_spin(hub: &SseHub, status: &RestaurantSpinStatus) {
    publish(hub, restaurant_spin_event(status));
}

/// Broadcast a coffee wheel transition.
pub fn broadcast_coffee_spin(hub: &SseHub, status: &CoffeeSpinStatus) {
    publish(hub, coffee_spin_event(status));
}

pub fn broadcast_connectivity(hub: &SseHub, online: bool) {
    publish(hub, encode(EVENT_CONNECTIVITY, &ConnectivityEvent { online }));
}

pub fn broadcast_sync(hub: &SseHub, syncing: bool) {
    publish(hub, encode(EVENT_SYNC, &SyncEvent { syncing }));
}

fn publish(hub: &SseHub, event: Option<ServerEvent>) {
    if let Some(event) = event {
        hub.broadcast(event);
    }
}

fn encode(event: &str, payload: &impl Serialize) -> Option<ServerEvent> {
    ServerEvent::json(Some(event.to_string()), payload)
        .inspect_err(|err| warn!(event, error = %err, "failed to serialize public SSE payload"))
        .ok()
}
