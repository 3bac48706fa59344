//! Per-entity cooldown for state-advancing upkeep calls.
//!
//! After the scheduler fires a call for a task or game it marks the entity
//! as working; until the wait elapses further upkeep calls for it are
//! skipped. This is an advisory throttle: the ledger rejects stale calls
//! anyway, the cooldown only avoids paying for them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use vsolve_types::EntityId;

use crate::Clock;

pub struct CooldownTable {
    wait: Duration,
    clock: Arc<dyn Clock>,
    until: Mutex<HashMap<EntityId, u64>>,
}

impl CooldownTable {
    pub fn new(wait: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            wait,
            clock,
            until: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `id` is still cooling down. Always `false` when the wait is zero.
    pub fn busy(&self, id: impl Into<EntityId>) -> bool {
        let id = id.into();
        let now = self.clock.now_ms();
        let until = self.until.lock().unwrap_or_else(PoisonError::into_inner);
        until.get(&id).is_some_and(|deadline| now < *deadline)
    }

    /// Start the cooldown for `id`.
    pub fn working(&self, id: impl Into<EntityId>) {
        let deadline = self
            .clock
            .now_ms()
            .saturating_add(self.wait.as_millis() as u64);
        self.until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), deadline);
    }

    pub fn forget(&self, id: impl Into<EntityId>) {
        self.until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id.into());
    }

    /// Drop entries whose deadline has passed.
    pub fn prune(&self) {
        let now = self.clock.now_ms();
        self.until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, deadline| now < *deadline);
    }

    pub fn len(&self) -> usize {
        self.until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use vsolve_types::{GameId, TaskId};

    struct ManualClock(AtomicU64);

    impl Clock for ManualClock {
        fn now_ms(&self) -> u64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn table(wait_ms: u64) -> (CooldownTable, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock(AtomicU64::new(1_000)));
        let table = CooldownTable::new(Duration::from_millis(wait_ms), clock.clone());
        (table, clock)
    }

    #[test]
    fn busy_after_working_until_wait_elapses() {
        let (table, clock) = table(500);
        let task = TaskId::from_u64(1);
        assert!(!table.busy(task));

        table.working(task);
        assert!(table.busy(task));

        clock.0.store(1_499, Ordering::SeqCst);
        assert!(table.busy(task));

        clock.0.store(1_500, Ordering::SeqCst);
        assert!(!table.busy(task));
    }

    #[test]
    fn zero_wait_never_throttles() {
        let (table, _clock) = table(0);
        let game = GameId::from_u64(1);
        table.working(game);
        assert!(!table.busy(game));
    }

    #[test]
    fn tasks_and_games_do_not_share_entries() {
        let (table, _clock) = table(500);
        table.working(TaskId::from_u64(7));
        assert!(!table.busy(GameId::from_u64(7)));
    }

    #[test]
    fn prune_drops_expired_entries() {
        let (table, clock) = table(100);
        table.working(TaskId::from_u64(1));
        clock.0.store(1_050, Ordering::SeqCst);
        table.working(TaskId::from_u64(2));
        clock.0.store(1_120, Ordering::SeqCst);
        table.prune();
        assert_eq!(table.len(), 1);
        assert!(table.busy(TaskId::from_u64(2)));

        table.forget(TaskId::from_u64(2));
        assert!(table.is_empty());
    }
}
