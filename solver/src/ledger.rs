//! The solver's view of the ledger.
//!
//! Transaction signing, submission and log transport live behind the
//! [`Ledger`] trait. Reads and subscriptions are individual methods; every
//! ledger-mutating call is one [`LedgerCall`] value passed to
//! [`Ledger::submit`], which keeps recording, suppression and logging of
//! writes in one place.

use async_trait::async_trait;
use tokio::sync::mpsc;

use vsolve_types::{
    Account, Amount, EventKind, EventRecord, GameId, Hash32, MachineSummary, Opcode,
    RevealPayload, SolutionInfo, SubscribeFrom, TaskId, TaskInfo, Word,
};

use crate::{ContractHandle, LedgerError};

/// Decoded events of one kind, in emission order.
pub type EventStream = mpsc::Receiver<EventRecord>;

/// One ledger-mutating call issued by the solver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerCall {
    /// Collateral posted ahead of registration.
    Deposit { amount: Amount },
    RegisterForTask {
        task_id: TaskId,
        secret_hash: Hash32,
    },
    CommitSolution {
        task_id: TaskId,
        commitment: Hash32,
    },
    RevealSolution {
        task_id: TaskId,
        secret: Hash32,
        payload: RevealPayload,
    },
    UnbondDeposit { task_id: TaskId },
    EndChallengePeriod { task_id: TaskId },
    EndRevealPeriod { task_id: TaskId },
    RunVerificationGame { task_id: TaskId },
    FinalizeTask { task_id: TaskId },
    GameOver { game_id: GameId },
    Initialize {
        game_id: GameId,
        initial: MachineSummary,
        steps: u64,
        final_state: MachineSummary,
    },
    Report {
        game_id: GameId,
        low: u64,
        high: u64,
        state_hashes: Vec<Hash32>,
    },
    PostPhases {
        game_id: GameId,
        low: u64,
        states: Vec<Hash32>,
    },
    CallJudge {
        game_id: GameId,
        low: u64,
        phase: u64,
        proof: Vec<Hash32>,
        proof2: Vec<Hash32>,
        vm_hash: Hash32,
        opcode: Opcode,
        registers: [Word; 4],
        vm: MachineSummary,
    },
    CallCustomJudge {
        game_id: GameId,
        low: u64,
        opcode: Opcode,
        registers: [Word; 4],
        result_state: Hash32,
        result_size: u64,
        proof: Vec<Hash32>,
        vm: MachineSummary,
    },
}

impl LedgerCall {
    /// Contract method name, for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::RegisterForTask { .. } => "registerForTask",
            Self::CommitSolution { .. } => "commitSolution",
            Self::RevealSolution { .. } => "revealSolution",
            Self::UnbondDeposit { .. } => "unbondDeposit",
            Self::EndChallengePeriod { .. } => "endChallengePeriod",
            Self::EndRevealPeriod { .. } => "endRevealPeriod",
            Self::RunVerificationGame { .. } => "runVerificationGame",
            Self::FinalizeTask { .. } => "finalizeTask",
            Self::GameOver { .. } => "gameOver",
            Self::Initialize { .. } => "initialize",
            Self::Report { .. } => "report",
            Self::PostPhases { .. } => "postPhases",
            Self::CallJudge { .. } => "callJudge",
            Self::CallCustomJudge { .. } => "callCustomJudge",
        }
    }
}

/// Reads, writes and event subscriptions against the ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn block_number(&self) -> Result<u64, LedgerError>;

    async fn solution_info(&self, task_id: TaskId) -> Result<SolutionInfo, LedgerError>;

    async fn task_info(&self, task_id: TaskId) -> Result<TaskInfo, LedgerError>;

    /// Task a verification game was opened for.
    async fn game_task(&self, game_id: GameId) -> Result<TaskId, LedgerError>;

    /// Current `(low, high)` bisection bounds the ledger holds for a game.
    async fn game_indices(&self, game_id: GameId) -> Result<(u64, u64), LedgerError>;

    async fn can_end_challenge_period(&self, task_id: TaskId) -> Result<bool, LedgerError>;

    async fn can_end_reveal_period(&self, task_id: TaskId) -> Result<bool, LedgerError>;

    async fn can_run_verification_game(&self, task_id: TaskId) -> Result<bool, LedgerError>;

    async fn can_finalize_task(&self, task_id: TaskId) -> Result<bool, LedgerError>;

    async fn is_game_over(&self, game_id: GameId) -> Result<bool, LedgerError>;

    /// Submit a ledger-mutating call as `from`.
    async fn submit(&self, from: Account, call: LedgerCall) -> Result<(), LedgerError>;

    /// Open a stream of `kind` events emitted by `contract`.
    async fn subscribe(
        &self,
        contract: &ContractHandle,
        kind: EventKind,
        from: SubscribeFrom,
    ) -> Result<EventStream, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_names_match_contract_methods() {
        let game_id = GameId::from_u64(1);
        assert_eq!(LedgerCall::GameOver { game_id }.name(), "gameOver");
        assert_eq!(
            LedgerCall::Report {
                game_id,
                low: 0,
                high: 8,
                state_hashes: vec![]
            }
            .name(),
            "report"
        );
        assert_eq!(
            LedgerCall::Deposit {
                amount: Amount::ZERO
            }
            .name(),
            "deposit"
        );
    }
}
