use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::{
    coffee::CoffeeWinSummary, member::MemberSummary, restaurant::RestaurantSummary,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across the SSE channel.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Serialise `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First event sent to a client when it connects.
pub struct Handshake {
    pub message: String,
    /// Whether the store is reachable right now.
    pub online: bool,
    pub syncing: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the store connection comes up or drops.
pub struct ConnectivityEvent {
    pub online: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a write starts or finishes.
pub struct SyncEvent {
    pub syncing: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Full restaurant list after a change-feed update.
pub struct RestaurantsSnapshotEvent(pub Vec<RestaurantSummary>);

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Full member list after a change-feed update.
pub struct MembersSnapshotEvent(pub Vec<MemberSummary>);

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Full coffee history after a change-feed update.
pub struct CoffeeHistoryEvent(pub Vec<CoffeeWinSummary>);
