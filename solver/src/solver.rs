//! The solver instance: owns the registries, subscriptions and upkeep loop.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use vsolve_crypto::SecretKey;
use vsolve_types::{Account, EventKind, EventRecord, SubscribeFrom};

use crate::upkeep::run_upkeep;
use crate::{
    ContractsDocument, Dispatcher, DisputeEngine, Effects, EventHandler, GameRecord,
    RecoveryBuffer, ShutdownController, SolverContext, SolverDeps, SolverError, SolverMetrics,
    SolverSettings, TaskController, TaskSummary, TickOutcome, UpkeepScheduler,
};

/// Point-in-time view of a running solver.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverStatus {
    pub account: Account,
    pub tasks: Vec<TaskSummary>,
    pub games: Vec<GameRecord>,
    pub recovering: bool,
    pub exiting: bool,
    pub exited: bool,
}

pub struct Solver {
    ctx: Arc<SolverContext>,
    dispatcher: Dispatcher,
    scheduler: Arc<Mutex<UpkeepScheduler>>,
    recovery: Arc<RecoveryBuffer>,
    shutdown: Arc<ShutdownController>,
    upkeep: Option<JoinHandle<()>>,
}

impl Solver {
    /// Subscribe to every event kind and start the upkeep loop.
    ///
    /// With `recovery_blocks > 0` subscriptions start that many blocks back
    /// and the history is buffered until the first tick replays it.
    pub async fn start(
        settings: SolverSettings,
        secret_key: SecretKey,
        contracts: ContractsDocument,
        deps: SolverDeps,
    ) -> Result<Self, SolverError> {
        let ctx = Arc::new(SolverContext::new(settings, secret_key, deps));
        let height = ctx.ledger.block_number().await?;
        let from = match ctx.settings.recovery_blocks {
            0 => SubscribeFrom::Live,
            depth => SubscribeFrom::Block(height.saturating_sub(depth)),
        };
        info!(account = %ctx.account(), block = height, ?from, "starting solver");
        if let Err(e) = contracts.validate() {
            tracing::warn!(error = %e, "contracts document is incomplete");
        }

        let recovery = Arc::new(RecoveryBuffer::new(from != SubscribeFrom::Live));
        let shutdown = Arc::new(ShutdownController::new());
        let mut dispatcher = Dispatcher::new(
            ctx.clone(),
            contracts,
            from,
            recovery.clone(),
            shutdown.clone(),
        );

        let tasks: Arc<dyn EventHandler> = Arc::new(TaskController::new(ctx.clone()));
        let games: Arc<dyn EventHandler> = Arc::new(DisputeEngine::new(ctx.clone()));
        let mut subscribed = 0;
        for kind in EventKind::ALL {
            let handler = if kind.is_dispute() {
                games.clone()
            } else {
                tasks.clone()
            };
            if dispatcher.subscribe(kind, handler).await {
                subscribed += 1;
            }
        }
        info!(subscribed, total = EventKind::ALL.len(), "event subscriptions open");

        let scheduler = Arc::new(Mutex::new(UpkeepScheduler::new(
            ctx.clone(),
            recovery.clone(),
            shutdown.clone(),
        )));
        let upkeep = tokio::spawn(run_upkeep(
            scheduler.clone(),
            ctx.settings.tick_interval,
            shutdown.clone(),
        ));

        Ok(Self {
            ctx,
            dispatcher,
            scheduler,
            recovery,
            shutdown,
            upkeep: Some(upkeep),
        })
    }

    pub fn account(&self) -> Account {
        self.ctx.account()
    }

    pub fn context(&self) -> &Arc<SolverContext> {
        &self.ctx
    }

    pub fn metrics(&self) -> &SolverMetrics {
        &self.ctx.metrics
    }

    /// Run one upkeep pass now, independent of the tick loop.
    pub async fn tick(&self) -> TickOutcome {
        self.scheduler.lock().await.tick().await
    }

    /// Handle one event to completion with live effects, bypassing the
    /// subscriptions.
    pub async fn deliver(&self, record: EventRecord) -> Result<(), SolverError> {
        let kind = record.kind();
        let handler = self
            .dispatcher
            .handler(kind)
            .ok_or_else(|| SolverError::UnexpectedEvent(format!("no handler for {kind}")))?;
        handler.handle(&record, Effects::Live).await
    }

    /// Wait until all spawned handlers and checks have finished.
    pub async fn settle(&self) {
        self.ctx.supervisor.drain().await;
    }

    /// Stop taking new tasks; keep servicing tracked ones until they drain.
    pub fn exit(&self) {
        if !self.ctx.is_exiting() {
            info!("exit requested, draining tracked tasks");
            self.ctx.begin_exit();
        }
    }

    pub fn is_exited(&self) -> bool {
        self.ctx.is_exited()
    }

    pub async fn wait_exited(&self) {
        self.ctx.wait_exited().await;
    }

    pub async fn list_tasks(&self) -> Vec<TaskSummary> {
        self.ctx.tasks.snapshot().await
    }

    pub async fn list_games(&self) -> Vec<GameRecord> {
        self.ctx.games.snapshot().await
    }

    pub async fn status(&self) -> SolverStatus {
        SolverStatus {
            account: self.ctx.account(),
            tasks: self.list_tasks().await,
            games: self.list_games().await,
            recovering: self.recovery.is_active(),
            exiting: self.ctx.is_exiting(),
            exited: self.ctx.is_exited(),
        }
    }

    /// Stop subscriptions and the tick loop immediately, without draining.
    pub async fn stop(&mut self) {
        self.shutdown.shutdown();
        self.dispatcher.close().await;
        if let Some(upkeep) = self.upkeep.take() {
            let _ = upkeep.await;
        }
        info!("solver stopped");
    }
}
