use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    dto::{
        coffee::{CoffeeSpinStatus, CoffeeView, CoffeeWinSummary},
        member::MemberSummary,
    },
    error::ServiceError,
    services::{
        gateway::{self, MutationOutcome},
        sse_events, wheel,
    },
    state::{
        SharedState,
        selection::{ensure_enough_members, pick_coffee_payers},
    },
};

/// Member wheel (with shortened labels), member list and spin state.
pub fn coffee_view(state: &SharedState) -> CoffeeView {
    let members = state.mirror().members();
    let labels: Vec<String> = members
        .iter()
        .map(|record| wheel::shorten_label(&record.body.name))
        .collect();

    CoffeeView {
        segments: wheel::layout(labels, state.config().coffee_palette()),
        members: members.iter().map(MemberSummary::from).collect(),
        spin: spin_status(state),
    }
}

pub fn spin_status(state: &SharedState) -> CoffeeSpinStatus {
    state.coffee_spin().read(|machine| CoffeeSpinStatus {
        spinning: machine.is_spinning(),
        winners: machine.result().cloned().unwrap_or_default(),
    })
}

/// Broadcast the current coffee spin state.
pub fn publish_status(state: &SharedState) {
    sse_events::broadcast_coffee_spin(state.public_sse(), &spin_status(state));
}

/// Start a coffee spin over the current members.
///
/// Fails with [`ServiceError::InvalidInput`] below two members; a request while
/// spinning is ignored.
pub fn spin(state: &SharedState) -> Result<CoffeeSpinStatus, ServiceError> {
    let names: Vec<String> = state
        .mirror()
        .members()
        .into_iter()
        .map(|record| record.body.name)
        .collect();
    ensure_enough_members(names.len())?;

    let Some(ticket) = state.coffee_spin().begin() else {
        debug!("ignoring coffee spin request while spinning");
        return Ok(spin_status(state));
    };
    publish_status(state);

    let state_for_timer = state.clone();
    let delay = state.config().spin_duration();
    tokio::spawn(async move {
        sleep(delay).await;
        let state = state_for_timer;
        match state.draw(|rng| pick_coffee_payers(&names, rng)) {
            Ok(winners) => {
                info!(?winners, "coffee wheel landed");
                if state.coffee_spin().complete(ticket, winners) {
                    publish_status(&state);
                }
            }
            Err(err) => warn!(error = %err, "coffee draw failed"),
        }
    });

    Ok(spin_status(state))
}

/// Persist the displayed coffee result, then hide it so it cannot be recorded twice.
pub async fn confirm(state: &SharedState) -> Result<MutationOutcome, ServiceError> {
    let Some(winners) = state.coffee_spin().read(|machine| machine.result().cloned()) else {
        return Err(ServiceError::InvalidState(
            "there is no coffee result to confirm".into(),
        ));
    };

    let outcome = gateway::record_coffee_win(state, winners).await?;
    if state.coffee_spin().clear_result() {
        publish_status(state);
    }
    Ok(outcome)
}

/// Confirmed results, newest first.
pub fn history(state: &SharedState) -> Vec<CoffeeWinSummary> {
    state
        .mirror()
        .coffee_wins()
        .iter()
        .rev()
        .map(CoffeeWinSummary::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dao::collection_store::{Collection, CollectionStore},
        dto::member::AddMemberRequest,
        test_support::{fast_config, online_state, online_state_with, wait_until},
    };

    async fn add_members(state: &SharedState, names: &[&str]) {
        for name in names {
            gateway::add_member(state, AddMemberRequest { name: (*name).into() })
                .await
                .unwrap();
        }
        let mut members = state.mirror().watch_members();
        wait_until(&mut members, |records| records.len() == names.len()).await;
    }

    #[tokio::test]
    async fn spin_needs_two_members_and_leaves_machine_idle() {
        let (state, _store) = online_state().await;
        add_members(&state, &["jin"]).await;

        let result = spin(&state);
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
        let status = spin_status(&state);
        assert!(!status.spinning);
        assert!(status.winners.is_empty());
    }

    #[tokio::test]
    async fn spin_draws_distinct_members_and_confirm_records_them() {
        let (state, store) = online_state().await;
        let pool = ["jin", "mina", "soo", "hyun"];
        add_members(&state, &pool).await;

        assert!(spin(&state).unwrap().spinning);
        let mut machine = state.coffee_spin().watcher();
        wait_until(&mut machine, |machine| machine.result().is_some()).await;

        let winners = spin_status(&state).winners;
        assert!((1..=3).contains(&winners.len()));
        assert!(winners.iter().all(|name| pool.contains(&name.as_str())));

        assert_eq!(confirm(&state).await.unwrap(), MutationOutcome::Applied);
        assert!(spin_status(&state).winners.is_empty());

        let stored = store.list(Collection::CoffeeWins).await.unwrap();
        assert_eq!(stored.len(), 1);
        let mut wins = state.mirror().watch_coffee_wins();
        wait_until(&mut wins, |records| records.len() == 1).await;
        assert_eq!(history(&state)[0].winners, winners);
    }

    #[tokio::test]
    async fn confirm_without_result_is_rejected() {
        let (state, _store) = online_state().await;
        assert!(matches!(
            confirm(&state).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn clearing_members_hides_the_coffee_result() {
        let (state, _store) = online_state().await;
        add_members(&state, &["jin", "mina"]).await;
        spin(&state).unwrap();
        let mut machine = state.coffee_spin().watcher();
        wait_until(&mut machine, |machine| machine.result().is_some()).await;

        gateway::clear_members(&state).await.unwrap();
        assert!(spin_status(&state).winners.is_empty());
    }

    #[tokio::test]
    async fn view_shortens_long_member_names() {
        let (state, _store) = online_state().await;
        add_members(&state, &["Christopher", "mina"]).await;
        let view = coffee_view(&state);
        assert_eq!(view.segments[0].label, "Christ..");
        assert_eq!(view.members[0].name, "Christopher");
        assert_eq!(view.segments[0].color, "#fb923c");
    }

    #[tokio::test]
    async fn members_added_mid_spin_are_never_drawn() {
        let config = fast_config().with_spin_duration(Duration::from_millis(150));
        let (state, _store) = online_state_with(config).await;
        add_members(&state, &["jin", "mina"]).await;
        let mut members = state.mirror().watch_members();
        let mut machine = state.coffee_spin().watcher();

        for round in 0..8 {
            let at_start = wait_until(&mut members, |records| records.len() == 2 + round).await;
            let pool: Vec<String> = at_start.into_iter().map(|record| record.body.name).collect();
            assert!(spin(&state).unwrap().spinning);

            let late = format!("late-{round}");
            gateway::add_member(&state, AddMemberRequest { name: late.clone() })
                .await
                .unwrap();
            wait_until(&mut members, |records| records.len() == 3 + round).await;
            assert!(state.coffee_spin().read(|machine| machine.is_spinning()));

            let landed = wait_until(&mut machine, |machine| machine.result().is_some()).await;
            let winners = landed.result().unwrap();
            assert!(winners.iter().all(|name| pool.contains(name)));
            assert!(!winners.contains(&late));
        }
    }
}
