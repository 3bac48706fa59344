//! Crash recovery by replaying a window of historical events.
//!
//! On startup in recovery mode every delivered record is buffered together
//! with its handler. The first upkeep tick takes the buffer, orders it by
//! emission position and replays it sequentially through the same handlers
//! used live.
//!
//! Before replay the log is analysed into a [`RecoveryPlan`]: events of
//! tasks and games that already closed inside the window are skipped, and
//! events whose ledger effect a later event proves are replayed with
//! suppressed effects, so local state is rebuilt without issuing duplicate
//! calls.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn, Instrument};

use vsolve_types::{Account, EventRecord, GameId, LedgerEvent, TaskId};

use crate::tracing_spans::{event_span, recovery_span};
use crate::{Effects, EventHandler};

/// A buffered record and the handler it was destined for.
pub struct BufferedEvent {
    pub record: EventRecord,
    pub handler: Arc<dyn EventHandler>,
}

/// Holds records delivered while recovery is active. Consumed exactly once.
pub struct RecoveryBuffer {
    pending: Mutex<Option<Vec<BufferedEvent>>>,
}

impl RecoveryBuffer {
    pub fn new(active: bool) -> Self {
        Self {
            pending: Mutex::new(active.then(Vec::new)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Buffer `record` while recovering; otherwise hand it back for live
    /// delivery.
    pub fn offer(
        &self,
        record: EventRecord,
        handler: &Arc<dyn EventHandler>,
    ) -> Option<EventRecord> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match pending.as_mut() {
            Some(buffer) => {
                buffer.push(BufferedEvent {
                    record,
                    handler: handler.clone(),
                });
                None
            }
            None => Some(record),
        }
    }

    /// End recovery and take the buffered events in emission order. Returns
    /// `None` once recovery has already ended.
    pub fn take(&self) -> Option<Vec<BufferedEvent>> {
        let mut batch = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        batch.sort_by_key(|event| event.record.position);
        Some(batch)
    }
}

/// How one buffered event is replayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayAction {
    /// Run the handler with live effects.
    Apply,
    /// Run the handler to rebuild state, suppressing ledger writes and uploads.
    Quiet,
    /// Do not run the handler.
    Skip,
}

/// Per-event replay decisions for a window of events, in emission order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryPlan {
    pub actions: Vec<ReplayAction>,
    /// Tasks still open at the end of the window that this solver was selected for.
    pub open_tasks: BTreeSet<TaskId>,
    /// Games still open at the end of the window in which this solver defends.
    pub open_games: BTreeSet<GameId>,
}

impl RecoveryPlan {
    /// Analyse `records`, which must already be in emission order.
    pub fn analyze(account: Account, records: &[EventRecord]) -> Self {
        let mut closed_tasks = HashSet::new();
        let mut closed_games = HashSet::new();
        for record in records {
            match &record.event {
                LedgerEvent::TaskFinalized { task_id } | LedgerEvent::TaskTimeout { task_id } => {
                    closed_tasks.insert(*task_id);
                }
                LedgerEvent::WinnerSelected { game_id } => {
                    closed_games.insert(*game_id);
                }
                _ => {}
            }
        }

        // Anchors seen strictly after the event being decided.
        let mut selected_us = HashSet::new();
        let mut selected_other = HashSet::new();
        let mut committed = HashSet::new();
        let mut revealed = HashSet::new();
        let mut reported_games = HashSet::new();
        let mut reported_bounds = HashSet::new();
        let mut phase_selected = HashSet::new();

        let mut actions = vec![ReplayAction::Apply; records.len()];
        let mut open_tasks = BTreeSet::new();
        let mut open_games = BTreeSet::new();

        for (i, record) in records.iter().enumerate().rev() {
            let quiet_if = |proven: bool| {
                if proven {
                    ReplayAction::Quiet
                } else {
                    ReplayAction::Apply
                }
            };

            actions[i] = match &record.event {
                LedgerEvent::TaskCreated { task_id, .. } => {
                    if closed_tasks.contains(task_id) || selected_other.contains(task_id) {
                        ReplayAction::Skip
                    } else {
                        quiet_if(selected_us.contains(task_id))
                    }
                }
                LedgerEvent::SolverSelected { task_id, solver } => {
                    if closed_tasks.contains(task_id) {
                        ReplayAction::Skip
                    } else if *solver == account {
                        open_tasks.insert(*task_id);
                        quiet_if(committed.contains(task_id))
                    } else {
                        ReplayAction::Apply
                    }
                }
                LedgerEvent::EndRevealPeriod { task_id } => {
                    if closed_tasks.contains(task_id) {
                        ReplayAction::Skip
                    } else {
                        quiet_if(revealed.contains(task_id))
                    }
                }
                LedgerEvent::TaskFinalized { .. } | LedgerEvent::TaskTimeout { .. } => {
                    ReplayAction::Skip
                }
                LedgerEvent::StartChallenge { solver, game_id } => {
                    if closed_games.contains(game_id) {
                        ReplayAction::Skip
                    } else {
                        if *solver == account {
                            open_games.insert(*game_id);
                        }
                        quiet_if(reported_games.contains(game_id))
                    }
                }
                LedgerEvent::Queried { game_id, low, high } => {
                    if closed_games.contains(game_id) {
                        ReplayAction::Skip
                    } else if low.checked_add(1) == Some(*high) {
                        quiet_if(phase_selected.contains(&(*game_id, *low)))
                    } else {
                        quiet_if(reported_bounds.contains(&(*game_id, *low, *high)))
                    }
                }
                LedgerEvent::SelectedPhase { game_id, .. } => {
                    if closed_games.contains(game_id) {
                        ReplayAction::Skip
                    } else {
                        ReplayAction::Apply
                    }
                }
                LedgerEvent::WinnerSelected { .. } => ReplayAction::Skip,
                LedgerEvent::SolutionsCommitted { task_id }
                | LedgerEvent::SolutionRevealed { task_id } => {
                    if closed_tasks.contains(task_id) {
                        ReplayAction::Skip
                    } else {
                        ReplayAction::Apply
                    }
                }
                LedgerEvent::Reported { game_id, .. } => {
                    if closed_games.contains(game_id) {
                        ReplayAction::Skip
                    } else {
                        ReplayAction::Apply
                    }
                }
                LedgerEvent::SlashedDeposit { .. } => ReplayAction::Apply,
            };

            match &record.event {
                LedgerEvent::SolverSelected { task_id, solver } => {
                    if *solver == account {
                        selected_us.insert(*task_id);
                    } else {
                        selected_other.insert(*task_id);
                    }
                }
                LedgerEvent::SolutionsCommitted { task_id } => {
                    committed.insert(*task_id);
                }
                LedgerEvent::SolutionRevealed { task_id } => {
                    revealed.insert(*task_id);
                }
                LedgerEvent::Reported { game_id, low, high } => {
                    reported_games.insert(*game_id);
                    reported_bounds.insert((*game_id, *low, *high));
                }
                LedgerEvent::SelectedPhase { game_id, low, .. } => {
                    phase_selected.insert((*game_id, *low));
                }
                _ => {}
            }
        }

        Self {
            actions,
            open_tasks,
            open_games,
        }
    }

    pub fn count(&self, action: ReplayAction) -> usize {
        self.actions.iter().filter(|a| **a == action).count()
    }
}

/// Replay a buffered window sequentially through its handlers.
pub async fn replay(account: Account, batch: Vec<BufferedEvent>) -> RecoveryPlan {
    let records: Vec<EventRecord> = batch.iter().map(|e| e.record.clone()).collect();
    let plan = RecoveryPlan::analyze(account, &records);

    async {
        info!(
            apply = plan.count(ReplayAction::Apply),
            quiet = plan.count(ReplayAction::Quiet),
            skip = plan.count(ReplayAction::Skip),
            "replaying historical events"
        );
        for (event, action) in batch.iter().zip(plan.actions.iter()) {
            let effects = match action {
                ReplayAction::Skip => {
                    debug!(kind = %event.record.kind(), "skipping closed entity event");
                    continue;
                }
                ReplayAction::Apply => Effects::Live,
                ReplayAction::Quiet => Effects::Suppressed,
            };
            let span = event_span(event.record.kind(), event.record.position);
            if let Err(e) = event
                .handler
                .handle(&event.record, effects)
                .instrument(span)
                .await
            {
                warn!(kind = %event.record.kind(), error = %e, "replayed event failed");
            }
        }
        info!(
            tasks = plan.open_tasks.len(),
            games = plan.open_games.len(),
            "recovery complete"
        );
    }
    .instrument(recovery_span(batch.len()))
    .await;

    plan
}
