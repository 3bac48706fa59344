//! vsolve solver agent.
//!
//! A [`Solver`] registers for tasks posted to the incentive layer, executes
//! the ones it is selected for, commits and reveals the result, and defends
//! it in bisection verification games when challenged. It reacts to ledger
//! events through the [`Dispatcher`] and advances timeouts from the
//! [`UpkeepScheduler`]. The ledger, execution engine and output storage are
//! collaborators behind the [`Ledger`], [`ExecutionEngine`] and
//! [`OutputStager`] traits.

pub mod bisection;
pub mod clock;
pub mod config;
pub mod context;
pub mod contracts;
pub mod cooldown;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod games;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod recovery;
pub mod registry;
pub mod shutdown;
pub mod solver;
pub mod supervisor;
pub mod tasks;
pub mod tracing_spans;
pub mod upkeep;

pub use clock::{Clock, RandomSource, SystemClock, ThreadRandom};
pub use config::{SettingsOverrides, SolverConfig, SolverSettings};
pub use context::{Effects, SolverContext, SolverDeps};
pub use contracts::{ContractEntry, ContractHandle, ContractsDocument, REQUIRED_CONTRACTS};
pub use cooldown::CooldownTable;
pub use dispatcher::{Dispatcher, EventHandler};
pub use engine::{ExecutionEngine, ExecutionTrace, OutputStager, Solution};
pub use error::{EngineError, LedgerError, SolverError, StagingError};
pub use games::DisputeEngine;
pub use ledger::{EventStream, Ledger, LedgerCall};
pub use logging::{init_logging, LogFormat};
pub use metrics::SolverMetrics;
pub use recovery::{RecoveryBuffer, RecoveryPlan, ReplayAction};
pub use registry::{GameRecord, GameRegistry, TaskRecord, TaskRegistry, TaskState, TaskSummary};
pub use shutdown::ShutdownController;
pub use solver::{Solver, SolverStatus};
pub use supervisor::Supervisor;
pub use tasks::{Admission, TaskController};
pub use upkeep::{TaskStep, TickOutcome, UpkeepScheduler};
