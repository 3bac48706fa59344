//! Shared harness for solver integration tests.
//!
//! Every collaborator is a nullable kept behind an `Arc` so tests can script
//! and inspect it while the solver holds its own handle.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use vsolve_crypto::SecretKey;
use vsolve_nullables::{NullClock, NullEngine, NullLedger, NullRandom, NullStager};
use vsolve_solver::{
    ContractEntry, ContractsDocument, Solver, SolverDeps, SolverSettings, TaskState,
    REQUIRED_CONTRACTS,
};
use vsolve_types::{Account, Amount, EventPosition, EventRecord, GameId, LedgerEvent, TaskId};

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

pub fn me() -> Account {
    Account::repeat_byte(0xAA)
}

pub fn other() -> Account {
    Account::repeat_byte(0xBB)
}

pub fn key() -> SecretKey {
    SecretKey::from_bytes([7u8; 32])
}

pub fn t(n: u64) -> TaskId {
    TaskId::from_u64(n)
}

pub fn g(n: u64) -> GameId {
    GameId::from_u64(n)
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Contracts document with every required contract at a distinct address.
pub fn contracts() -> ContractsDocument {
    contracts_without(&[])
}

pub fn contracts_without(skip: &[&str]) -> ContractsDocument {
    let contracts = REQUIRED_CONTRACTS
        .iter()
        .enumerate()
        .filter(|(_, name)| !skip.contains(name))
        .map(|(i, name)| {
            (
                name.to_string(),
                ContractEntry {
                    address: Account::repeat_byte(0x10 + i as u8),
                    abi: serde_json::Value::Array(Vec::new()),
                },
            )
        })
        .collect::<BTreeMap<_, _>>();
    ContractsDocument {
        contracts,
        ..ContractsDocument::default()
    }
}

/// Defaults with a tick interval long enough that tests drive every tick.
pub fn settings() -> SolverSettings {
    let mut settings = SolverSettings::new(me());
    settings.tick_interval = Duration::from_secs(3_600);
    settings
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub ledger: Arc<NullLedger>,
    pub engine: Arc<NullEngine>,
    pub stager: Arc<NullStager>,
    pub clock: Arc<NullClock>,
    pub random: Arc<NullRandom>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_engine(NullEngine::default())
    }

    pub fn with_engine(engine: NullEngine) -> Self {
        Self {
            ledger: Arc::new(NullLedger::new()),
            engine: Arc::new(engine),
            stager: Arc::new(NullStager::new()),
            clock: Arc::new(NullClock::new(0)),
            random: Arc::new(NullRandom::constant(0.0)),
        }
    }

    pub fn with_random(mut self, random: NullRandom) -> Self {
        self.random = Arc::new(random);
        self
    }

    pub fn deps(&self) -> SolverDeps {
        SolverDeps {
            ledger: self.ledger.clone(),
            engine: self.engine.clone(),
            stager: self.stager.clone(),
            clock: self.clock.clone(),
            random: self.random.clone(),
        }
    }

    pub async fn start(&self, settings: SolverSettings) -> Solver {
        self.start_with(settings, contracts()).await
    }

    pub async fn start_with(&self, settings: SolverSettings, contracts: ContractsDocument) -> Solver {
        Solver::start(settings, key(), contracts, self.deps())
            .await
            .expect("solver starts")
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

pub fn record(block: u64, event: LedgerEvent) -> EventRecord {
    EventRecord::new(EventPosition::new(block, 0), event)
}

pub fn created(task: TaskId, reward: u128) -> LedgerEvent {
    LedgerEvent::TaskCreated {
        task_id: task,
        min_deposit: Amount::new(5),
        reward: Amount::new(reward),
    }
}

pub fn selected(task: TaskId, solver: Account) -> LedgerEvent {
    LedgerEvent::SolverSelected {
        task_id: task,
        solver,
    }
}

pub fn challenge(game: GameId) -> LedgerEvent {
    LedgerEvent::StartChallenge {
        solver: me(),
        game_id: game,
    }
}

pub fn queried(game: GameId, low: u64, high: u64) -> LedgerEvent {
    LedgerEvent::Queried {
        game_id: game,
        low,
        high,
    }
}

// ---------------------------------------------------------------------------
// Assertions
// ---------------------------------------------------------------------------

pub async fn state_of(solver: &Solver, task: TaskId) -> Option<TaskState> {
    solver
        .list_tasks()
        .await
        .into_iter()
        .find(|summary| summary.id == task)
        .map(|summary| summary.state)
}

/// Walk `task` through creation and selection so it ends up committed.
pub async fn commit_task(solver: &Solver, task: TaskId, block: u64) {
    solver
        .deliver(record(block, created(task, 100)))
        .await
        .expect("task created");
    solver
        .deliver(record(block + 1, selected(task, me())))
        .await
        .expect("solver selected");
}

/// Poll until `task` reaches `expected`.
pub async fn wait_for_state(solver: &Solver, task: TaskId, expected: Option<TaskState>) {
    for _ in 0..500 {
        if state_of(solver, task).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("{task} never reached {expected:?}");
}

/// Poll until the dispatcher has received `count` events.
pub async fn wait_for_events(solver: &Solver, count: u64) {
    for _ in 0..500 {
        if solver.metrics().events_received.get() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!(
        "only {} of {count} events arrived",
        solver.metrics().events_received.get()
    );
}
