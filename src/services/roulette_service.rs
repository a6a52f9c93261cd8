use tokio::time::sleep;
use tracing::{debug, info};

use crate::{
    dto::{
        restaurant::RestaurantSummary,
        roulette::{RestaurantSpinStatus, RouletteView},
    },
    services::{sse_events, wheel},
    state::{SharedState, selection::pick_one},
};

/// Wheel layout over the mirrored restaurants plus the spin state.
pub fn roulette_view(state: &SharedState) -> RouletteView {
    let labels: Vec<String> = state
        .mirror()
        .restaurants()
        .into_iter()
        .map(|record| record.body.name)
        .collect();

    RouletteView {
        segments: wheel::layout(labels, state.config().restaurant_palette()),
        spin: spin_status(state),
    }
}

pub fn spin_status(state: &SharedState) -> RestaurantSpinStatus {
    state.restaurant_spin().read(|machine| RestaurantSpinStatus {
        spinning: machine.is_spinning(),
        selected: machine.result().map(RestaurantSummary::from),
    })
}

/// Broadcast the current restaurant spin state.
pub fn publish_status(state: &SharedState) {
    sse_events::broadcast_restaurant_spin(state.public_sse(), &spin_status(state));
}

/// Start a spin over the current restaurants; the pick lands after the configured delay.
///
/// Does nothing when there are no restaurants or a spin is already running.
pub fn spin(state: &SharedState) -> RestaurantSpinStatus {
    let candidates = state.mirror().restaurants();
    if candidates.is_empty() {
        debug!("ignoring spin request without restaurants");
        return spin_status(state);
    }
    let Some(ticket) = state.restaurant_spin().begin() else {
        debug!("ignoring spin request while spinning");
        return spin_status(state);
    };
    publish_status(state);

    let state_for_timer = state.clone();
    let delay = state.config().spin_duration();
    tokio::spawn(async move {
        sleep(delay).await;
        let state = state_for_timer;
        let Some(chosen) = state.draw(|rng| pick_one(&candidates, rng).cloned()) else {
            return;
        };
        let name = chosen.body.name.clone();
        if state.restaurant_spin().complete(ticket, chosen) {
            info!(restaurant = %name, "roulette landed");
            publish_status(&state);
        }
    });

    spin_status(state)
}
