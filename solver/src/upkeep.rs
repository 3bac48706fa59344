//! Periodic upkeep: advance tracked tasks and games through their timeouts.
//!
//! Each tick syncs the working lists with the registries, then spawns one
//! supervised check per task and per game. A check fires a call only when
//! the ledger's eligibility predicate holds and the entity is not cooling
//! down. The first tick of a recovering solver also kicks off replay of the
//! buffered history.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, Instrument};

use vsolve_types::{GameId, TaskId};

use crate::recovery::replay;
use crate::tracing_spans::{game_span, task_span, upkeep_span};
use crate::{
    Effects, LedgerCall, LedgerError, RecoveryBuffer, ShutdownController, SolverContext,
    SolverError,
};

/// One state-advancing transition of a tracked task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStep {
    EndChallengePeriod,
    EndRevealPeriod,
    RunVerificationGame,
    Finalize,
}

impl TaskStep {
    pub const ALL: [TaskStep; 4] = [
        TaskStep::EndChallengePeriod,
        TaskStep::EndRevealPeriod,
        TaskStep::RunVerificationGame,
        TaskStep::Finalize,
    ];

    async fn is_eligible(&self, ctx: &SolverContext, task_id: TaskId) -> Result<bool, LedgerError> {
        match self {
            Self::EndChallengePeriod => ctx.ledger.can_end_challenge_period(task_id).await,
            Self::EndRevealPeriod => ctx.ledger.can_end_reveal_period(task_id).await,
            Self::RunVerificationGame => ctx.ledger.can_run_verification_game(task_id).await,
            Self::Finalize => ctx.ledger.can_finalize_task(task_id).await,
        }
    }

    fn call(&self, task_id: TaskId) -> LedgerCall {
        match self {
            Self::EndChallengePeriod => LedgerCall::EndChallengePeriod { task_id },
            Self::EndRevealPeriod => LedgerCall::EndRevealPeriod { task_id },
            Self::RunVerificationGame => LedgerCall::RunVerificationGame { task_id },
            Self::Finalize => LedgerCall::FinalizeTask { task_id },
        }
    }
}

/// Result of one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// Exit was requested and no tasks remain; subscriptions and the tick
    /// loop have been told to stop.
    Drained,
}

pub struct UpkeepScheduler {
    ctx: Arc<SolverContext>,
    recovery: Arc<RecoveryBuffer>,
    shutdown: Arc<ShutdownController>,
    working_tasks: Vec<TaskId>,
    working_games: Vec<GameId>,
    ticks: u64,
}

impl UpkeepScheduler {
    pub fn new(
        ctx: Arc<SolverContext>,
        recovery: Arc<RecoveryBuffer>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            ctx,
            recovery,
            shutdown,
            working_tasks: Vec::new(),
            working_games: Vec::new(),
            ticks: 0,
        }
    }

    pub fn working_tasks(&self) -> &[TaskId] {
        &self.working_tasks
    }

    pub fn working_games(&self) -> &[GameId] {
        &self.working_games
    }

    /// Prune entities no longer tracked, then append newly tracked ones.
    async fn sync_working_lists(&mut self) {
        let tasks = self.ctx.tasks.ids().await;
        self.working_tasks.retain(|id| tasks.contains(id));
        for id in tasks {
            if !self.working_tasks.contains(&id) {
                self.working_tasks.push(id);
            }
        }

        let games = self.ctx.games.ids().await;
        self.working_games.retain(|id| games.contains(id));
        for id in games {
            if !self.working_games.contains(&id) {
                self.working_games.push(id);
            }
        }

        self.ctx.cooldown.prune();
        self.ctx.metrics.tracked_tasks.set(self.working_tasks.len() as i64);
        self.ctx.metrics.tracked_games.set(self.working_games.len() as i64);
    }

    /// Run one upkeep pass. Checks are spawned, not awaited.
    pub async fn tick(&mut self) -> TickOutcome {
        self.ticks += 1;
        let span = upkeep_span(self.ticks);
        self.tick_inner().instrument(span).await
    }

    async fn tick_inner(&mut self) -> TickOutcome {
        self.sync_working_lists().await;

        if self.ctx.is_exiting() && self.working_tasks.is_empty() {
            if let Some(batch) = self.recovery.take() {
                info!(events = batch.len(), "exiting before replay, discarding buffered history");
            }
            if !self.ctx.is_exited() {
                info!("all tasks drained, stopping");
                self.shutdown.shutdown();
                self.ctx.mark_exited();
            }
            return TickOutcome::Drained;
        }

        for task_id in self.working_tasks.iter().copied() {
            let ctx = self.ctx.clone();
            self.ctx
                .supervisor
                .spawn("task-upkeep", task_span(task_id), async move {
                    check_task(&ctx, task_id).await
                });
        }
        for game_id in self.working_games.iter().copied() {
            let ctx = self.ctx.clone();
            self.ctx
                .supervisor
                .spawn("game-upkeep", game_span(game_id), async move {
                    check_game(&ctx, game_id).await
                });
        }

        if let Some(batch) = self.recovery.take() {
            let account = self.ctx.account();
            self.ctx.supervisor.spawn(
                "recovery",
                tracing::Span::current(),
                async move {
                    replay(account, batch).await;
                    Ok(())
                },
            );
        }
        TickOutcome::Continue
    }
}

/// Try every task transition independently; one failing does not stop the
/// others.
async fn check_task(ctx: &SolverContext, task_id: TaskId) -> Result<(), SolverError> {
    if ctx.cooldown.busy(task_id) {
        debug!("task cooling down");
        return Ok(());
    }
    let mut failures = 0;
    for step in TaskStep::ALL {
        match try_advance(ctx, task_id, step).await {
            Ok(true) => info!(?step, "advanced task"),
            Ok(false) => {}
            Err(e) => {
                failures += 1;
                debug!(?step, error = %e, "task step failed");
            }
        }
    }
    if failures > 0 {
        return Err(SolverError::Other(format!(
            "{failures} upkeep step(s) failed for task {task_id}"
        )));
    }
    Ok(())
}

async fn try_advance(ctx: &SolverContext, task_id: TaskId, step: TaskStep) -> Result<bool, LedgerError> {
    if !step.is_eligible(ctx, task_id).await? {
        return Ok(false);
    }
    ctx.cooldown.working(task_id);
    ctx.submit(step.call(task_id), Effects::Live).await?;
    Ok(true)
}

async fn check_game(ctx: &SolverContext, game_id: GameId) -> Result<(), SolverError> {
    if ctx.cooldown.busy(game_id) {
        debug!("game cooling down");
        return Ok(());
    }
    if ctx.ledger.is_game_over(game_id).await? {
        ctx.cooldown.working(game_id);
        ctx.submit(LedgerCall::GameOver { game_id }, Effects::Live)
            .await?;
        info!("ended game");
    }
    Ok(())
}

/// Tick every `interval` until shutdown or drained exit.
pub async fn run_upkeep(
    scheduler: Arc<Mutex<UpkeepScheduler>>,
    interval: Duration,
    shutdown: Arc<ShutdownController>,
) {
    let mut shutdown_rx: broadcast::Receiver<()> = shutdown.subscribe();
    if shutdown.is_triggered() {
        return;
    }
    let start = tokio::time::Instant::now() + interval;
    let mut interval = tokio::time::interval_at(start, interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                if scheduler.lock().await.tick().await == TickOutcome::Drained {
                    break;
                }
            }
        }
    }
    debug!("upkeep loop stopped");
}
