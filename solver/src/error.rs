use thiserror::Error;
use vsolve_types::{GameId, TaskId};

/// Failure of a ledger read, write or subscription.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("{call} reverted: {reason}")]
    Reverted { call: &'static str, reason: String },

    #[error("no event source for {0}")]
    NoEventSource(String),

    #[error("{0}")]
    Other(String),
}

/// Failure reported by the external execution engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("execution failed: {0}")]
    Execution(String),

    #[error("step {step} is outside the trace ({steps} steps)")]
    StepOutOfRange { step: u64, steps: u64 },

    #[error("trace of {0} steps is too long to bisect")]
    TooManySteps(u64),

    #[error("{0}")]
    Other(String),
}

/// Failure publishing task outputs to content-addressed storage.
#[derive(Debug, Error)]
#[error("output staging failed: {0}")]
pub struct StagingError(pub String);

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("crypto error: {0}")]
    Crypto(#[from] vsolve_crypto::CryptoError),

    #[error("invalid data: {0}")]
    Types(#[from] vsolve_types::TypesError),

    #[error("no solution computed for task {0}")]
    MissingSolution(TaskId),

    #[error("task {task} for game {game} has not been recovered")]
    TaskNotRecovered { task: TaskId, game: GameId },

    #[error("bounds [{low}, {high}] for game {game} violate 0 <= low < high <= {limit}")]
    InvalidBounds {
        game: GameId,
        low: u64,
        high: u64,
        limit: u64,
    },

    #[error("unexpected event payload: {0}")]
    UnexpectedEvent(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("contracts document error: {0}")]
    Contracts(String),

    #[error("{0}")]
    Other(String),
}

impl SolverError {
    /// Transport-level ledger failures clear up on their own; the next event
    /// or upkeep tick retries the same transition.
    pub fn is_transient(&self) -> bool {
        matches!(self, SolverError::Ledger(LedgerError::Transport(_)))
    }
}
