use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    services::{coffee_service, roulette_service, sse_events},
    state::SharedState,
};

const EVENT_HANDSHAKE: &str = "handshake";

/// Subscribe to the public SSE stream and build the greeting sent first: the
/// handshake, then the current lists and both wheels.
pub fn subscribe_public(state: &SharedState) -> (broadcast::Receiver<ServerEvent>, Vec<ServerEvent>) {
    let receiver = state.public_sse().subscribe();
    let handshake = Handshake {
        message: "public stream connected".into(),
        online: state.is_online(),
        syncing: state.syncing().is_syncing(),
    };

    let handshake = match ServerEvent::json(Some(EVENT_HANDSHAKE.to_string()), &handshake) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(error = %err, "failed to serialize SSE handshake");
            None
        }
    };

    let mirror = state.mirror();
    let initial = [
        handshake,
        sse_events::restaurants_event(&mirror.restaurants()),
        sse_events::members_event(&mirror.members()),
        sse_events::coffee_history_event(&mirror.coffee_wins()),
        sse_events::restaurant_spin_event(&roulette_service::spin_status(state)),
        sse_events::coffee_spin_event(&coffee_service::spin_status(state)),
    ]
    .into_iter()
    .flatten()
    .collect();
    (receiver, initial)
}

/// Convert a broadcast receiver into an SSE response, sending `initial` first
/// and forwarding events until the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    initial: Vec<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(skipped, "SSE subscriber lagged; skipping events");
                            continue;
                        }
                    }
                }
            }
        }

        info!("Public SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::{
        dao::models::Category,
        dto::{member::AddMemberRequest, restaurant::CreateRestaurantRequest},
        services::gateway,
        test_support::{online_state, wait_until},
    };

    #[tokio::test]
    async fn late_subscribers_receive_current_lists_and_wheels() {
        let (state, _store) = online_state().await;
        let request = CreateRestaurantRequest {
            name: "Pho".into(),
            category: Some(Category::Asian),
            distance: String::new(),
            map_link: None,
        };
        gateway::add_restaurant(&state, request).await.unwrap();
        gateway::add_member(&state, AddMemberRequest { name: "jin".into() })
            .await
            .unwrap();
        let mut members = state.mirror().watch_members();
        wait_until(&mut members, |records| records.len() == 1).await;
        let mut restaurants = state.mirror().watch_restaurants();
        wait_until(&mut restaurants, |records| records.len() == 1).await;

        let (_receiver, initial) = subscribe_public(&state);
        let names: Vec<&str> = initial
            .iter()
            .filter_map(|event| event.event.as_deref())
            .collect();
        assert_eq!(
            names,
            [
                "handshake",
                "restaurants.snapshot",
                "members.snapshot",
                "coffee.history",
                "roulette.spin",
                "coffee.spin",
            ]
        );

        let restaurants: Value = serde_json::from_str(&initial[1].data).unwrap();
        assert_eq!(restaurants[0]["name"], "Pho");
        let members: Value = serde_json::from_str(&initial[2].data).unwrap();
        assert_eq!(members[0]["name"], "jin");
        let spin: Value = serde_json::from_str(&initial[4].data).unwrap();
        assert_eq!(spin["spinning"], false);
    }
}
