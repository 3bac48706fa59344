//! State and collaborators shared by the handlers and the upkeep loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, warn};

use vsolve_crypto::SecretKey;
use vsolve_types::Account;

use crate::{
    Clock, CooldownTable, ExecutionEngine, GameRegistry, Ledger, LedgerCall, LedgerError,
    OutputStager, RandomSource, SolverMetrics, SolverSettings, Supervisor, TaskRegistry,
};

/// External collaborators a solver is built from.
#[derive(Clone)]
pub struct SolverDeps {
    pub ledger: Arc<dyn Ledger>,
    pub engine: Arc<dyn ExecutionEngine>,
    pub stager: Arc<dyn OutputStager>,
    pub clock: Arc<dyn Clock>,
    pub random: Arc<dyn RandomSource>,
}

/// Whether a handler's ledger writes and uploads actually happen.
///
/// Replayed events whose effect is already recorded on the ledger run with
/// `Suppressed` so local state is rebuilt without repeating the calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effects {
    Live,
    Suppressed,
}

pub struct SolverContext {
    pub settings: SolverSettings,
    secret_key: SecretKey,
    pub ledger: Arc<dyn Ledger>,
    pub engine: Arc<dyn ExecutionEngine>,
    pub stager: Arc<dyn OutputStager>,
    pub random: Arc<dyn RandomSource>,
    pub tasks: TaskRegistry,
    pub games: GameRegistry,
    pub cooldown: CooldownTable,
    pub metrics: SolverMetrics,
    pub supervisor: Supervisor,
    exiting: AtomicBool,
    exited: AtomicBool,
    exited_notify: Notify,
}

impl SolverContext {
    pub fn new(settings: SolverSettings, secret_key: SecretKey, deps: SolverDeps) -> Self {
        let metrics = SolverMetrics::new();
        let supervisor = Supervisor::new(metrics.handler_failures.clone());
        let cooldown = CooldownTable::new(settings.wait_time, deps.clock);
        Self {
            settings,
            secret_key,
            ledger: deps.ledger,
            engine: deps.engine,
            stager: deps.stager,
            random: deps.random,
            tasks: TaskRegistry::new(),
            games: GameRegistry::new(),
            cooldown,
            metrics,
            supervisor,
            exiting: AtomicBool::new(false),
            exited: AtomicBool::new(false),
            exited_notify: Notify::new(),
        }
    }

    pub fn account(&self) -> Account {
        self.settings.account
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Submit a ledger call, or only log it when effects are suppressed.
    pub async fn submit(&self, call: LedgerCall, effects: Effects) -> Result<(), LedgerError> {
        let name = call.name();
        if effects == Effects::Suppressed {
            self.metrics.calls_suppressed.inc();
            debug!(call = name, "skipping call already recorded on the ledger");
            return Ok(());
        }
        self.metrics.calls_submitted.inc();
        match self.ledger.submit(self.account(), call).await {
            Ok(()) => {
                debug!(call = name, "call submitted");
                Ok(())
            }
            Err(e) => {
                self.metrics.calls_failed.inc();
                warn!(call = name, error = %e, "call failed");
                Err(e)
            }
        }
    }

    pub fn begin_exit(&self) {
        self.exiting.store(true, Ordering::SeqCst);
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }

    pub fn mark_exited(&self) {
        self.exited.store(true, Ordering::SeqCst);
        self.exited_notify.notify_waiters();
    }

    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Resolve once the solver has drained and stopped.
    pub async fn wait_exited(&self) {
        loop {
            let notified = self.exited_notify.notified();
            if self.is_exited() {
                return;
            }
            notified.await;
        }
    }
}
