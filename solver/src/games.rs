//! Defending a committed solution in a bisection verification game.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, Instrument};

use vsolve_types::{Account, EventRecord, GameId, LedgerEvent, Phase};

use crate::bisection::{judge_call, midpoint};
use crate::tracing_spans::game_span;
use crate::{Effects, EventHandler, GameRecord, LedgerCall, Solution, SolverContext, SolverError};

#[derive(Clone)]
pub struct DisputeEngine {
    ctx: Arc<SolverContext>,
}

impl DisputeEngine {
    pub fn new(ctx: Arc<SolverContext>) -> Self {
        Self { ctx }
    }

    /// Solution of the task a tracked game defends.
    async fn defended_solution(&self, game: &GameRecord) -> Result<Solution, SolverError> {
        self.ctx
            .tasks
            .solution(game.task_id)
            .await
            .ok_or(SolverError::MissingSolution(game.task_id))
    }

    async fn on_start_challenge(
        &self,
        solver: Account,
        game_id: GameId,
        effects: Effects,
    ) -> Result<(), SolverError> {
        if solver != self.ctx.account() {
            return Ok(());
        }
        let task_id = self.ctx.ledger.game_task(game_id).await?;
        info!(task = %task_id, "solution challenged");

        let solution = self
            .ctx
            .tasks
            .solution(task_id)
            .await
            .ok_or(SolverError::TaskNotRecovered {
                task: task_id,
                game: game_id,
            })?;
        let game = GameRecord::new(game_id, task_id, solution.steps)?;
        let steps = game.high;
        self.ctx.games.insert(game).await;
        self.ctx.metrics.games_started.inc();

        let initial = solution.trace.initial_state().await?;
        let final_state = solution.trace.final_state().await?;
        self.ctx
            .submit(
                LedgerCall::Initialize {
                    game_id,
                    initial: initial.summary(),
                    steps,
                    final_state: final_state.summary(),
                },
                effects,
            )
            .await?;
        info!(steps = solution.steps, "game initialized");

        let (low, high) = self.ctx.ledger.game_indices(game_id).await?;
        if self.ctx.games.set_bounds(game_id, low, high).await?.is_none() {
            return Ok(());
        }
        self.report_midpoint(game_id, &solution, low, high, effects)
            .await
    }

    async fn report_midpoint(
        &self,
        game_id: GameId,
        solution: &Solution,
        low: u64,
        high: u64,
        effects: Effects,
    ) -> Result<(), SolverError> {
        let mid = midpoint(low, high);
        let state_hash = solution.trace.state_hash_at(mid).await?;
        self.ctx
            .submit(
                LedgerCall::Report {
                    game_id,
                    low,
                    high,
                    state_hashes: vec![state_hash],
                },
                effects,
            )
            .await?;
        info!(low, high, step = mid, "reported state hash");
        Ok(())
    }

    async fn on_queried(
        &self,
        game_id: GameId,
        low: u64,
        high: u64,
        effects: Effects,
    ) -> Result<(), SolverError> {
        let Some(game) = self.ctx.games.set_bounds(game_id, low, high).await? else {
            return Ok(());
        };
        info!(low, high, "queried");
        let solution = self.defended_solution(&game).await?;

        if !game.is_terminal() {
            return self
                .report_midpoint(game_id, &solution, low, high, effects)
                .await;
        }

        let proof = solution.trace.step_proof(low).await?;
        self.ctx
            .submit(
                LedgerCall::PostPhases {
                    game_id,
                    low,
                    states: proof.states,
                },
                effects,
            )
            .await?;
        info!(step = low, "posted phase states");
        Ok(())
    }

    async fn on_selected_phase(
        &self,
        game_id: GameId,
        low: u64,
        phase: u64,
        effects: Effects,
    ) -> Result<(), SolverError> {
        let Some(game) = self.ctx.games.get(game_id).await else {
            return Ok(());
        };
        let phase = Phase::from_index(phase)?;
        let solution = self.defended_solution(&game).await?;
        let proof = solution.trace.step_proof(low).await?;

        let call = judge_call(game_id, low, phase, &proof);
        let judge = call.name();
        self.ctx.submit(call, effects).await?;
        info!(step = low, ?phase, judge, "judge called");
        Ok(())
    }

    async fn on_winner_selected(&self, game_id: GameId) {
        if self.ctx.games.remove(game_id).await.is_some() {
            self.ctx.cooldown.forget(game_id);
            info!("game over, winner selected");
        }
    }
}

#[async_trait]
impl EventHandler for DisputeEngine {
    async fn handle(&self, record: &EventRecord, effects: Effects) -> Result<(), SolverError> {
        match &record.event {
            LedgerEvent::StartChallenge { solver, game_id } => {
                self.on_start_challenge(*solver, *game_id, effects)
                    .instrument(game_span(*game_id))
                    .await
            }
            LedgerEvent::Queried { game_id, low, high } => {
                self.on_queried(*game_id, *low, *high, effects)
                    .instrument(game_span(*game_id))
                    .await
            }
            LedgerEvent::SelectedPhase {
                game_id,
                low,
                phase,
            } => {
                self.on_selected_phase(*game_id, *low, *phase, effects)
                    .instrument(game_span(*game_id))
                    .await
            }
            LedgerEvent::WinnerSelected { game_id } => {
                self.on_winner_selected(*game_id)
                    .instrument(game_span(*game_id))
                    .await;
                Ok(())
            }
            LedgerEvent::Reported { game_id, low, high } => {
                debug!(game = %game_id, low, high, "report recorded");
                Ok(())
            }
            other => Err(SolverError::UnexpectedEvent(format!(
                "{} is not a dispute event",
                other.kind()
            ))),
        }
    }
}
