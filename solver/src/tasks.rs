//! Task lifecycle: registration, selection, execution, commit, reveal and
//! release of collateral.
//!
//! ```text
//! Candidate ──selected──▶ Selected ──execute──▶ Solving ──commit──▶ Committed
//!     │                                                                │
//!     └──other solver──▶ (dropped)              EndRevealPeriod ──▶ Revealed
//!                                          TaskFinalized / TaskTimeout ──▶ (removed)
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

use vsolve_crypto::{hash_secret, solution_commitment};
use vsolve_types::{Account, Amount, EventRecord, LedgerEvent, TaskId};

use crate::tracing_spans::task_span;
use crate::{Effects, EventHandler, LedgerCall, SolverContext, SolverError, TaskState};

/// Outcome of evaluating a posted task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Accept,
    RewardTooLow,
    Throttled,
    AlreadyTaken,
    /// Lost the random admission draw.
    NotDrawn,
}

#[derive(Clone)]
pub struct TaskController {
    ctx: Arc<SolverContext>,
}

impl TaskController {
    pub fn new(ctx: Arc<SolverContext>) -> Self {
        Self { ctx }
    }

    /// Decide whether to register for a posted task.
    pub async fn evaluate(&self, task_id: TaskId, reward: Amount) -> Result<Admission, SolverError> {
        let settings = &self.ctx.settings;
        if reward < settings.reward_limit {
            return Ok(Admission::RewardTooLow);
        }
        if let Some(limit) = settings.throttle {
            if self.ctx.tasks.len().await > limit {
                return Ok(Admission::Throttled);
            }
        }
        if self.ctx.ledger.solution_info(task_id).await?.is_taken() {
            return Ok(Admission::AlreadyTaken);
        }
        if let Some(rate) = settings.solving_rate {
            if rate < self.ctx.random.sample() {
                return Ok(Admission::NotDrawn);
            }
        }
        Ok(Admission::Accept)
    }

    async fn on_task_created(
        &self,
        task_id: TaskId,
        min_deposit: Amount,
        reward: Amount,
        effects: Effects,
    ) -> Result<(), SolverError> {
        if self.ctx.is_exiting() {
            debug!(task = %task_id, "exiting, ignoring new task");
            return Ok(());
        }
        info!(task = %task_id, %reward, %min_deposit, "task posted");

        if effects == Effects::Suppressed {
            // Registration is already on the ledger; only rebuild the record.
            self.ctx
                .tasks
                .insert_candidate(task_id, min_deposit, reward)
                .await;
            return Ok(());
        }

        match self.evaluate(task_id, reward).await? {
            Admission::Accept => self.register(task_id, min_deposit, reward, effects).await,
            Admission::NotDrawn if !self.ctx.settings.wait_time.is_zero() => {
                self.schedule_retry(task_id, min_deposit, reward, effects);
                Ok(())
            }
            declined => {
                info!(task = %task_id, reason = ?declined, "declined task");
                Ok(())
            }
        }
    }

    /// Re-run the whole evaluation once after `WAIT_TIME`.
    fn schedule_retry(&self, task_id: TaskId, min_deposit: Amount, reward: Amount, effects: Effects) {
        let wait = self.ctx.settings.wait_time;
        debug!(task = %task_id, wait_ms = wait.as_millis() as u64, "admission draw lost, retrying later");
        let controller = self.clone();
        self.ctx
            .supervisor
            .spawn("admission-retry", task_span(task_id), async move {
                tokio::time::sleep(wait).await;
                if controller.ctx.is_exiting() {
                    return Ok(());
                }
                match controller.evaluate(task_id, reward).await? {
                    Admission::Accept => {
                        controller
                            .register(task_id, min_deposit, reward, effects)
                            .await
                    }
                    declined => {
                        info!(reason = ?declined, "declined task after retry");
                        Ok(())
                    }
                }
            });
    }

    async fn register(
        &self,
        task_id: TaskId,
        min_deposit: Amount,
        reward: Amount,
        effects: Effects,
    ) -> Result<(), SolverError> {
        let secret = self.ctx.secret_key().task_secret(&task_id)?;
        if self.ctx.settings.auto_deposit {
            self.ctx
                .submit(LedgerCall::Deposit { amount: min_deposit }, effects)
                .await?;
        }
        self.ctx
            .submit(
                LedgerCall::RegisterForTask {
                    task_id,
                    secret_hash: hash_secret(&secret),
                },
                effects,
            )
            .await?;

        if self
            .ctx
            .tasks
            .insert_candidate(task_id, min_deposit, reward)
            .await
        {
            self.ctx.metrics.tasks_registered.inc();
        }
        info!(task = %task_id, "registered for task");
        Ok(())
    }

    async fn on_solver_selected(
        &self,
        task_id: TaskId,
        solver: Account,
        effects: Effects,
    ) -> Result<(), SolverError> {
        if solver != self.ctx.account() {
            if self.ctx.tasks.remove(task_id).await.is_some() {
                self.ctx.cooldown.forget(task_id);
                info!(task = %task_id, %solver, "another solver was selected, dropping task");
            }
            return Ok(());
        }

        let info = self.ctx.ledger.task_info(task_id).await?;
        info!(task = %task_id, code_type = ?info.code_type, "selected, solving task");
        self.ctx.tasks.mark_selected(task_id, info.clone()).await;

        let started = Instant::now();
        let solution = self.ctx.engine.execute(task_id, &info).await?;
        self.ctx
            .metrics
            .solve_time_ms
            .observe(started.elapsed().as_secs_f64() * 1_000.0);

        let commitment = solution_commitment(&solution.result_hash);
        let steps = solution.steps;
        if !self.ctx.tasks.attach_solution(task_id, solution).await {
            warn!(task = %task_id, "task closed while executing, discarding solution");
            return Ok(());
        }
        info!(task = %task_id, steps, "execution finished");

        match self
            .ctx
            .submit(
                LedgerCall::CommitSolution {
                    task_id,
                    commitment,
                },
                effects,
            )
            .await
        {
            Ok(()) => {
                self.ctx.tasks.set_state(task_id, TaskState::Committed).await;
                info!(task = %task_id, "committed solution");
            }
            Err(e) => {
                error!(task = %task_id, error = %e, "solution commit failed");
            }
        }
        Ok(())
    }

    async fn on_end_reveal_period(&self, task_id: TaskId, effects: Effects) -> Result<(), SolverError> {
        match self.ctx.tasks.state(task_id).await {
            None => return Ok(()),
            Some(TaskState::Revealed) => {
                debug!(task = %task_id, "already revealed");
                return Ok(());
            }
            Some(_) => {}
        }
        let solution = self
            .ctx
            .tasks
            .solution(task_id)
            .await
            .ok_or(SolverError::MissingSolution(task_id))?;
        let secret = self.ctx.secret_key().task_secret(&task_id)?;

        self.ctx
            .submit(
                LedgerCall::RevealSolution {
                    task_id,
                    secret: (*secret.as_bytes()).into(),
                    payload: solution.final_vm.reveal_payload(),
                },
                effects,
            )
            .await?;
        self.ctx.tasks.set_state(task_id, TaskState::Revealed).await;
        info!(task = %task_id, "revealed solution");

        if effects == Effects::Live {
            if let Err(e) = self.ctx.stager.publish_outputs(task_id, &solution).await {
                error!(task = %task_id, error = %e, "output staging failed after reveal");
                return Err(e.into());
            }
        }
        Ok(())
    }

    async fn on_task_closed(&self, task_id: TaskId, outcome: &'static str, effects: Effects) {
        if !self.ctx.tasks.contains(task_id).await {
            return;
        }
        if let Err(e) = self
            .ctx
            .submit(LedgerCall::UnbondDeposit { task_id }, effects)
            .await
        {
            warn!(task = %task_id, error = %e, "unbonding deposit failed");
        }
        self.ctx.tasks.remove(task_id).await;
        self.ctx.cooldown.forget(task_id);
        info!(task = %task_id, outcome, "task closed");
    }
}

#[async_trait]
impl EventHandler for TaskController {
    async fn handle(&self, record: &EventRecord, effects: Effects) -> Result<(), SolverError> {
        match &record.event {
            LedgerEvent::TaskCreated {
                task_id,
                min_deposit,
                reward,
            } => {
                self.on_task_created(*task_id, *min_deposit, *reward, effects)
                    .instrument(task_span(*task_id))
                    .await
            }
            LedgerEvent::SolverSelected { task_id, solver } => {
                self.on_solver_selected(*task_id, *solver, effects)
                    .instrument(task_span(*task_id))
                    .await
            }
            LedgerEvent::EndRevealPeriod { task_id } => {
                self.on_end_reveal_period(*task_id, effects)
                    .instrument(task_span(*task_id))
                    .await
            }
            LedgerEvent::TaskFinalized { task_id } => {
                self.on_task_closed(*task_id, "finalized", effects).await;
                Ok(())
            }
            LedgerEvent::TaskTimeout { task_id } => {
                self.on_task_closed(*task_id, "timed out", effects).await;
                Ok(())
            }
            LedgerEvent::SolutionsCommitted { task_id } => {
                info!(task = %task_id, "solutions committed");
                Ok(())
            }
            LedgerEvent::SolutionRevealed { task_id } => {
                info!(task = %task_id, "solution revealed");
                Ok(())
            }
            LedgerEvent::SlashedDeposit { account } => {
                if *account == self.ctx.account() {
                    warn!(%account, "deposit slashed");
                }
                Ok(())
            }
            other => Err(SolverError::UnexpectedEvent(format!(
                "{} is not a task event",
                other.kind()
            ))),
        }
    }
}
