//! Random draws and the `{Idle, Spinning, Result}` machine shared by both wheels.

use rand::{
    Rng,
    seq::{IndexedRandom, SliceRandom},
};
use thiserror::Error;
use tokio::sync::watch;

/// Fewest members a coffee spin accepts.
pub const MIN_COFFEE_MEMBERS: usize = 2;
/// Most payers a single coffee spin can pick.
pub const MAX_COFFEE_WINNERS: usize = 3;

/// Guard failures raised before a spin starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("at least {required} members are needed for a coffee spin (got {actual})")]
    NotEnoughMembers { required: usize, actual: usize },
}

/// Uniformly pick one element.
pub fn pick_one<'a, T, R>(items: &'a [T], rng: &mut R) -> Option<&'a T>
where
    R: Rng + ?Sized,
{
    items.choose(rng)
}

/// Shuffle the names uniformly and keep a prefix of `1..=min(3, n - 1)` of them.
pub fn pick_coffee_payers<R>(names: &[String], rng: &mut R) -> Result<Vec<String>, SelectionError>
where
    R: Rng + ?Sized,
{
    ensure_enough_members(names.len())?;

    let mut shuffled = names.to_vec();
    shuffled.shuffle(rng);
    let upper = MAX_COFFEE_WINNERS.min(names.len() - 1);
    let count = rng.random_range(1..=upper);
    shuffled.truncate(count);
    Ok(shuffled)
}

/// Check the coffee guard without drawing.
pub fn ensure_enough_members(actual: usize) -> Result<(), SelectionError> {
    if actual < MIN_COFFEE_MEMBERS {
        return Err(SelectionError::NotEnoughMembers {
            required: MIN_COFFEE_MEMBERS,
            actual,
        });
    }
    Ok(())
}

/// Identifies one spin so a late timer cannot overwrite a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinTicket(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum SpinPhase<T> {
    Idle,
    Spinning { ticket: SpinTicket },
    Result(T),
}

/// State of one wheel. Spinning and a displayed result exclude each other.
#[derive(Debug, Clone)]
pub struct SpinMachine<T> {
    phase: SpinPhase<T>,
    issued: u64,
}

impl<T> SpinMachine<T> {
    pub fn new() -> Self {
        Self {
            phase: SpinPhase::Idle,
            issued: 0,
        }
    }

    pub fn phase(&self) -> &SpinPhase<T> {
        &self.phase
    }

    pub fn is_spinning(&self) -> bool {
        matches!(self.phase, SpinPhase::Spinning { .. })
    }

    pub fn result(&self) -> Option<&T> {
        match &self.phase {
            SpinPhase::Result(value) => Some(value),
            _ => None,
        }
    }

    /// Start spinning and drop any displayed result. `None` while already spinning.
    pub fn begin(&mut self) -> Option<SpinTicket> {
        if self.is_spinning() {
            return None;
        }
        self.issued += 1;
        let ticket = SpinTicket(self.issued);
        self.phase = SpinPhase::Spinning { ticket };
        Some(ticket)
    }

    /// Land the spin identified by `ticket`; stale tickets are ignored.
    pub fn complete(&mut self, ticket: SpinTicket, value: T) -> bool {
        match self.phase {
            SpinPhase::Spinning { ticket: current } if current == ticket => {
                self.phase = SpinPhase::Result(value);
                true
            }
            _ => false,
        }
    }

    /// Hide a displayed result. Leaves a running spin alone.
    pub fn clear_result(&mut self) -> bool {
        if matches!(self.phase, SpinPhase::Result(_)) {
            self.phase = SpinPhase::Idle;
            true
        } else {
            false
        }
    }
}

impl<T> Default for SpinMachine<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared [`SpinMachine`] whose transitions can be watched.
pub struct SpinSlot<T> {
    machine: watch::Sender<SpinMachine<T>>,
}

impl<T> SpinSlot<T> {
    pub fn new() -> Self {
        let (machine, _rx) = watch::channel(SpinMachine::new());
        Self { machine }
    }

    /// Read the machine under the watch lock.
    pub fn read<R>(&self, f: impl FnOnce(&SpinMachine<T>) -> R) -> R {
        f(&self.machine.borrow())
    }

    pub fn begin(&self) -> Option<SpinTicket> {
        let mut ticket = None;
        self.machine.send_if_modified(|machine| {
            ticket = machine.begin();
            ticket.is_some()
        });
        ticket
    }

    pub fn complete(&self, ticket: SpinTicket, value: T) -> bool {
        self.machine
            .send_if_modified(|machine| machine.complete(ticket, value))
    }

    pub fn clear_result(&self) -> bool {
        self.machine.send_if_modified(SpinMachine::clear_result)
    }

    pub fn watcher(&self) -> watch::Receiver<SpinMachine<T>> {
        self.machine.subscribe()
    }
}

impl<T> Default for SpinSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn names(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("member-{i}")).collect()
    }

    #[test]
    fn pick_one_returns_an_element_of_the_input() {
        let mut rng = StdRng::seed_from_u64(7);
        let items = ["A", "B", "C"];
        for _ in 0..50 {
            let picked = pick_one(&items, &mut rng).unwrap();
            assert!(items.contains(picked));
        }
        assert!(pick_one::<&str, _>(&[], &mut rng).is_none());
    }

    #[test]
    fn coffee_payers_are_distinct_members_within_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for size in 2..=7 {
            let pool = names(size);
            let upper = MAX_COFFEE_WINNERS.min(size - 1);
            for _ in 0..100 {
                let winners = pick_coffee_payers(&pool, &mut rng).unwrap();
                assert!((1..=upper).contains(&winners.len()));
                let unique: HashSet<_> = winners.iter().collect();
                assert_eq!(unique.len(), winners.len());
                assert!(winners.iter().all(|name| pool.contains(name)));
            }
        }
    }

    #[test]
    fn two_members_always_yield_a_single_payer() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            assert_eq!(pick_coffee_payers(&names(2), &mut rng).unwrap().len(), 1);
        }
    }

    #[test]
    fn every_prefix_length_eventually_occurs() {
        let mut rng = StdRng::seed_from_u64(11);
        let seen: HashSet<usize> = (0..300)
            .map(|_| pick_coffee_payers(&names(5), &mut rng).unwrap().len())
            .collect();
        assert_eq!(seen, HashSet::from([1, 2, 3]));
    }

    #[test]
    fn coffee_requires_two_members() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            pick_coffee_payers(&names(1), &mut rng),
            Err(SelectionError::NotEnoughMembers {
                required: 2,
                actual: 1
            })
        );
        assert!(pick_coffee_payers(&[], &mut rng).is_err());
    }

    #[test]
    fn begin_is_not_reentrant_and_clears_previous_result() {
        let mut machine = SpinMachine::new();
        let first = machine.begin().unwrap();
        assert!(machine.begin().is_none());
        assert!(machine.complete(first, "A"));
        assert_eq!(machine.result(), Some(&"A"));

        let second = machine.begin().unwrap();
        assert!(machine.result().is_none());
        assert!(machine.is_spinning());
        assert_ne!(first, second);
    }

    #[test]
    fn stale_ticket_is_ignored() {
        let mut machine = SpinMachine::new();
        let stale = machine.begin().unwrap();
        assert!(machine.complete(stale, 1));
        let current = machine.begin().unwrap();
        assert!(!machine.complete(stale, 2));
        assert!(machine.is_spinning());
        assert!(machine.complete(current, 3));
        assert_eq!(machine.phase(), &SpinPhase::Result(3));
    }

    #[test]
    fn clear_result_only_touches_results() {
        let mut machine = SpinMachine::new();
        assert!(!machine.clear_result());
        let ticket = machine.begin().unwrap();
        assert!(!machine.clear_result());
        machine.complete(ticket, "B");
        assert!(machine.clear_result());
        assert_eq!(machine.phase(), &SpinPhase::Idle);
    }

    #[tokio::test]
    async fn slot_notifies_watchers_on_transitions() {
        let slot = SpinSlot::new();
        let mut watcher = slot.watcher();
        let ticket = slot.begin().unwrap();
        watcher.changed().await.unwrap();
        assert!(watcher.borrow_and_update().is_spinning());

        assert!(slot.begin().is_none());
        assert!(slot.complete(ticket, "C"));
        watcher.changed().await.unwrap();
        assert_eq!(watcher.borrow().result(), Some(&"C"));
    }
}
