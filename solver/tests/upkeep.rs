//! Upkeep ticks: eligibility predicates, cooldowns, game ending and the
//! working lists.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use vsolve_nullables::Predicate;
use vsolve_solver::{LedgerCall, RecoveryBuffer, ShutdownController, UpkeepScheduler};
use vsolve_types::LedgerEvent;

fn with_wait(ms: u64) -> vsolve_solver::SolverSettings {
    let mut settings = settings();
    settings.wait_time = Duration::from_millis(ms);
    settings
}

// ---------------------------------------------------------------------------
// 1. Task predicates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn eligible_transitions_fire_once_per_tick() {
    let h = Harness::new();
    let solver = h.start(settings()).await;
    commit_task(&solver, t(1), 10).await;
    h.ledger.clear_calls();

    solver.tick().await;
    solver.settle().await;
    assert!(h.ledger.calls().is_empty());

    h.ledger.set_predicate(Predicate::EndChallengePeriod, t(1), true);
    h.ledger.set_predicate(Predicate::FinalizeTask, t(1), true);
    solver.tick().await;
    solver.settle().await;
    assert_eq!(
        h.ledger.calls(),
        vec![
            LedgerCall::EndChallengePeriod { task_id: t(1) },
            LedgerCall::FinalizeTask { task_id: t(1) },
        ]
    );
}

#[tokio::test]
async fn every_predicate_maps_to_its_call() {
    let h = Harness::new();
    let solver = h.start(settings()).await;
    commit_task(&solver, t(1), 10).await;
    h.ledger.clear_calls();

    for predicate in [
        Predicate::EndChallengePeriod,
        Predicate::EndRevealPeriod,
        Predicate::RunVerificationGame,
        Predicate::FinalizeTask,
    ] {
        h.ledger.set_predicate(predicate, t(1), true);
    }
    solver.tick().await;
    solver.settle().await;
    let names: Vec<_> = h.ledger.calls().iter().map(|c| c.name()).collect();
    assert_eq!(
        names,
        vec![
            "endChallengePeriod",
            "endRevealPeriod",
            "runVerificationGame",
            "finalizeTask"
        ]
    );
}

#[tokio::test]
async fn cooldown_holds_back_repeat_calls() {
    let h = Harness::new();
    let solver = h.start(with_wait(1_000)).await;
    commit_task(&solver, t(1), 10).await;
    h.ledger.clear_calls();
    h.ledger.set_predicate(Predicate::EndRevealPeriod, t(1), true);

    solver.tick().await;
    solver.settle().await;
    assert_eq!(h.ledger.calls_named("endRevealPeriod").len(), 1);

    h.clock.advance(999);
    solver.tick().await;
    solver.settle().await;
    assert_eq!(h.ledger.calls_named("endRevealPeriod").len(), 1);

    h.clock.advance(1);
    solver.tick().await;
    solver.settle().await;
    assert_eq!(h.ledger.calls_named("endRevealPeriod").len(), 2);
}

#[tokio::test]
async fn zero_wait_never_cools_down() {
    let h = Harness::new();
    let solver = h.start(settings()).await;
    commit_task(&solver, t(1), 10).await;
    h.ledger.clear_calls();
    h.ledger.set_predicate(Predicate::RunVerificationGame, t(1), true);

    for _ in 0..3 {
        solver.tick().await;
        solver.settle().await;
    }
    assert_eq!(h.ledger.calls_named("runVerificationGame").len(), 3);
}

#[tokio::test]
async fn failing_step_does_not_block_the_others() {
    let h = Harness::new();
    let solver = h.start(settings()).await;
    commit_task(&solver, t(1), 10).await;
    h.ledger.clear_calls();
    h.ledger.fail_call("endChallengePeriod");
    h.ledger.set_predicate(Predicate::EndChallengePeriod, t(1), true);
    h.ledger.set_predicate(Predicate::FinalizeTask, t(1), true);

    solver.tick().await;
    solver.settle().await;
    assert_eq!(
        h.ledger.calls(),
        vec![LedgerCall::FinalizeTask { task_id: t(1) }]
    );
    assert_eq!(solver.metrics().handler_failures.get(), 1);
}

// ---------------------------------------------------------------------------
// 2. Games
// ---------------------------------------------------------------------------

#[tokio::test]
async fn finished_game_is_ended() {
    let h = Harness::new();
    let solver = h.start(with_wait(500)).await;
    commit_task(&solver, t(1), 10).await;
    h.ledger.set_game(g(1), t(1), (0, 8));
    solver.deliver(record(20, challenge(g(1)))).await.unwrap();
    h.ledger.clear_calls();

    solver.tick().await;
    solver.settle().await;
    assert!(h.ledger.calls_named("gameOver").is_empty());

    h.ledger.set_game_over(g(1), true);
    solver.tick().await;
    solver.settle().await;
    solver.tick().await;
    solver.settle().await;
    assert_eq!(
        h.ledger.calls_named("gameOver"),
        vec![LedgerCall::GameOver { game_id: g(1) }]
    );
}

// ---------------------------------------------------------------------------
// 3. Working lists
// ---------------------------------------------------------------------------

#[tokio::test]
async fn working_lists_follow_the_registries() {
    let h = Harness::new();
    let solver = h.start(settings()).await;
    let mut scheduler = UpkeepScheduler::new(
        solver.context().clone(),
        Arc::new(RecoveryBuffer::new(false)),
        Arc::new(ShutdownController::new()),
    );

    commit_task(&solver, t(1), 10).await;
    solver.deliver(record(12, created(t(2), 100))).await.unwrap();
    h.ledger.set_game(g(1), t(1), (0, 8));
    solver.deliver(record(13, challenge(g(1)))).await.unwrap();

    scheduler.tick().await;
    let mut tasks = scheduler.working_tasks().to_vec();
    tasks.sort();
    assert_eq!(tasks, vec![t(1), t(2)]);
    assert_eq!(scheduler.working_games(), &[g(1)]);
    assert_eq!(solver.metrics().tracked_tasks.get(), 2);

    solver
        .deliver(record(14, LedgerEvent::TaskTimeout { task_id: t(2) }))
        .await
        .unwrap();
    solver
        .deliver(record(15, LedgerEvent::WinnerSelected { game_id: g(1) }))
        .await
        .unwrap();
    scheduler.tick().await;
    assert_eq!(scheduler.working_tasks(), &[t(1)]);
    assert!(scheduler.working_games().is_empty());
    assert_eq!(solver.metrics().tracked_games.get(), 0);
    solver.settle().await;
}
