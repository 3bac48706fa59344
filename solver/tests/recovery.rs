//! Restart recovery: replaying a window of history rebuilds the same local
//! state a solver that saw the events live would have, without repeating
//! calls the ledger already recorded.

mod common;

use common::*;
use vsolve_solver::{ReplayAction, RecoveryPlan, Solver, TaskState, TickOutcome};
use vsolve_types::{EventRecord, LedgerEvent};

/// Window starting at block 910. With the null ledger at block 1000 and a
/// recovery depth of 100, subscriptions start at block 900.
fn history() -> Vec<EventRecord> {
    vec![
        // t1: revealed and still open.
        record(910, created(t(1), 100)),
        record(911, selected(t(1), me())),
        record(912, LedgerEvent::SolutionsCommitted { task_id: t(1) }),
        record(913, LedgerEvent::EndRevealPeriod { task_id: t(1) }),
        record(914, LedgerEvent::SolutionRevealed { task_id: t(1) }),
        // t2: lost to another solver.
        record(915, created(t(2), 100)),
        record(916, selected(t(2), other())),
        // t3: finished inside the window.
        record(917, created(t(3), 100)),
        record(918, selected(t(3), me())),
        record(919, LedgerEvent::SolutionsCommitted { task_id: t(3) }),
        record(920, LedgerEvent::TaskFinalized { task_id: t(3) }),
        // t4: posted, not yet assigned.
        record(921, created(t(4), 100)),
        // t5: committed and challenged, bisection under way.
        record(922, created(t(5), 100)),
        record(923, selected(t(5), me())),
        record(924, LedgerEvent::SolutionsCommitted { task_id: t(5) }),
        record(925, challenge(g(1))),
        record(
            926,
            LedgerEvent::Reported {
                game_id: g(1),
                low: 0,
                high: 8,
            },
        ),
        record(927, queried(g(1), 4, 8)),
    ]
}

fn harness() -> Harness {
    let h = Harness::new();
    h.ledger.set_game(g(1), t(5), (0, 8));
    h
}

async fn recovered(h: &Harness) -> Solver {
    for record in history() {
        h.ledger.push_history(record);
    }
    let mut settings = settings();
    settings.recovery_blocks = 100;
    let solver = h.start(settings).await;
    assert!(solver.status().await.recovering);

    wait_for_events(&solver, history().len() as u64).await;
    // Nothing is handled until the first tick takes the buffer.
    assert!(solver.list_tasks().await.is_empty());

    solver.tick().await;
    solver.settle().await;
    solver
}

#[tokio::test]
async fn subscriptions_start_at_the_recovery_depth() {
    let h = harness();
    let mut settings = settings();
    settings.recovery_blocks = 100;
    let _solver = h.start(settings).await;
    assert!(h
        .ledger
        .subscriptions()
        .iter()
        .all(|(_, from, _)| *from == vsolve_types::SubscribeFrom::Block(900)));
}

#[tokio::test]
async fn replay_matches_live_processing() {
    let live_h = harness();
    let live = live_h.start(settings()).await;
    for record in history() {
        live.deliver(record).await.unwrap();
    }

    let h = harness();
    let solver = recovered(&h).await;

    assert_eq!(solver.list_tasks().await, live.list_tasks().await);
    assert_eq!(solver.list_games().await, live.list_games().await);
    assert!(!solver.status().await.recovering);

    let states: Vec<_> = solver
        .list_tasks()
        .await
        .into_iter()
        .map(|s| (s.id, s.state))
        .collect();
    assert_eq!(
        states,
        vec![
            (t(1), TaskState::Revealed),
            (t(4), TaskState::Candidate),
            (t(5), TaskState::Committed),
        ]
    );
    let game = solver.list_games().await[0];
    assert_eq!((game.low, game.high), (4, 8));
}

#[tokio::test]
async fn replay_does_not_repeat_recorded_calls() {
    let h = harness();
    let solver = recovered(&h).await;

    // Selected tasks are re-executed so their solutions are available again.
    assert_eq!(h.engine.executions(), vec![t(1), t(5)]);

    for name in ["commitSolution", "revealSolution", "initialize", "unbondDeposit"] {
        assert!(h.ledger.calls_named(name).is_empty(), "{name} was repeated");
    }
    assert!(h.stager.published().is_empty());

    // Only the unassigned task is registered for, and only the open query
    // is answered.
    assert_eq!(h.ledger.calls_named("registerForTask").len(), 1);
    assert_eq!(h.ledger.calls_named("report").len(), 1);
    assert!(solver.metrics().calls_suppressed.get() > 0);
}

#[tokio::test]
async fn live_events_after_recovery_are_handled_immediately() {
    let h = harness();
    let solver = recovered(&h).await;

    h.ledger
        .emit(record(950, LedgerEvent::EndRevealPeriod { task_id: t(5) }));
    wait_for_state(&solver, t(5), Some(TaskState::Revealed)).await;
    assert_eq!(h.ledger.calls_named("revealSolution").len(), 1);
}

#[tokio::test]
async fn exit_before_the_first_tick_ends_recovery() {
    let h = harness();
    for record in history() {
        h.ledger.push_history(record);
    }
    let mut settings = settings();
    settings.recovery_blocks = 100;
    let solver = h.start(settings).await;
    wait_for_events(&solver, history().len() as u64).await;

    solver.exit();
    assert_eq!(solver.tick().await, TickOutcome::Drained);
    solver.settle().await;

    let status = solver.status().await;
    assert!(!status.recovering);
    assert!(status.exited);
    assert!(status.tasks.is_empty());
    assert!(h.ledger.calls().is_empty());
    assert!(h.engine.executions().is_empty());
}

#[test]
fn plan_for_the_window() {
    use ReplayAction::*;
    let plan = RecoveryPlan::analyze(me(), &history());
    assert_eq!(
        plan.actions,
        vec![
            Quiet, Quiet, Apply, Quiet, Apply, // t1
            Skip, Apply, // t2
            Skip, Skip, Skip, Skip, // t3
            Apply, // t4
            Quiet, Quiet, Apply, Quiet, Apply, Apply, // t5 and its game
        ]
    );
    assert_eq!(
        plan.open_tasks.into_iter().collect::<Vec<_>>(),
        vec![t(1), t(5)]
    );
    assert_eq!(plan.open_games.into_iter().collect::<Vec<_>>(), vec![g(1)]);
}
