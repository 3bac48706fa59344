//! Ledger events consumed by the solver.
//!
//! The set of events is closed: [`EventKind`] enumerates every stream the
//! solver subscribes to and [`LedgerEvent`] carries the decoded payload.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::{Account, Amount, GameId, TaskId, TypesError};

/// Contracts that emit the events the solver listens to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Contract {
    IncentiveLayer,
    Interactive,
}

impl Contract {
    /// Name of the contract in the provisioning document.
    pub fn document_name(&self) -> &'static str {
        match self {
            Self::IncentiveLayer => "incentiveLayer",
            Self::Interactive => "interactive",
        }
    }
}

/// Every event stream the solver subscribes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    TaskCreated,
    SolverSelected,
    SolutionsCommitted,
    SolutionRevealed,
    EndRevealPeriod,
    TaskFinalized,
    TaskTimeout,
    SlashedDeposit,
    StartChallenge,
    Queried,
    SelectedPhase,
    WinnerSelected,
    Reported,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        EventKind::TaskCreated,
        EventKind::SolverSelected,
        EventKind::SolutionsCommitted,
        EventKind::SolutionRevealed,
        EventKind::EndRevealPeriod,
        EventKind::TaskFinalized,
        EventKind::TaskTimeout,
        EventKind::SlashedDeposit,
        EventKind::StartChallenge,
        EventKind::Queried,
        EventKind::SelectedPhase,
        EventKind::WinnerSelected,
        EventKind::Reported,
    ];

    /// Event name as emitted by the contract.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskCreated => "TaskCreated",
            Self::SolverSelected => "SolverSelected",
            Self::SolutionsCommitted => "SolutionsCommitted",
            Self::SolutionRevealed => "SolutionRevealed",
            Self::EndRevealPeriod => "EndRevealPeriod",
            Self::TaskFinalized => "TaskFinalized",
            Self::TaskTimeout => "TaskTimeout",
            Self::SlashedDeposit => "SlashedDeposit",
            Self::StartChallenge => "StartChallenge",
            Self::Queried => "Queried",
            Self::SelectedPhase => "SelectedPhase",
            Self::WinnerSelected => "WinnerSelected",
            Self::Reported => "Reported",
        }
    }

    /// Contract that emits this event.
    pub fn contract(&self) -> Contract {
        match self {
            Self::StartChallenge
            | Self::Queried
            | Self::SelectedPhase
            | Self::WinnerSelected
            | Self::Reported => Contract::Interactive,
            _ => Contract::IncentiveLayer,
        }
    }

    /// Whether the event belongs to the dispute game rather than the task lifecycle.
    pub fn is_dispute(&self) -> bool {
        self.contract() == Contract::Interactive
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| TypesError::UnknownEvent(s.to_string()))
    }
}

/// Where a subscription starts delivering from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeFrom {
    /// Only events emitted after the subscription is established.
    Live,
    /// Historical events from this block height onward, then live ones.
    Block(u64),
}

/// Emission position of an event on the ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPosition {
    pub block: u64,
    #[serde(default)]
    pub log_index: u64,
}

impl EventPosition {
    pub fn new(block: u64, log_index: u64) -> Self {
        Self { block, log_index }
    }
}

impl PartialOrd for EventPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.block, self.log_index).cmp(&(other.block, other.log_index))
    }
}

/// Decoded payload of a ledger event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum LedgerEvent {
    TaskCreated {
        task_id: TaskId,
        min_deposit: Amount,
        reward: Amount,
    },
    SolverSelected {
        task_id: TaskId,
        solver: Account,
    },
    SolutionsCommitted {
        task_id: TaskId,
    },
    SolutionRevealed {
        task_id: TaskId,
    },
    EndRevealPeriod {
        task_id: TaskId,
    },
    TaskFinalized {
        task_id: TaskId,
    },
    TaskTimeout {
        task_id: TaskId,
    },
    SlashedDeposit {
        account: Account,
    },
    StartChallenge {
        solver: Account,
        game_id: GameId,
    },
    Queried {
        game_id: GameId,
        low: u64,
        high: u64,
    },
    SelectedPhase {
        game_id: GameId,
        low: u64,
        phase: u64,
    },
    WinnerSelected {
        game_id: GameId,
    },
    Reported {
        game_id: GameId,
        low: u64,
        high: u64,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TaskCreated { .. } => EventKind::TaskCreated,
            Self::SolverSelected { .. } => EventKind::SolverSelected,
            Self::SolutionsCommitted { .. } => EventKind::SolutionsCommitted,
            Self::SolutionRevealed { .. } => EventKind::SolutionRevealed,
            Self::EndRevealPeriod { .. } => EventKind::EndRevealPeriod,
            Self::TaskFinalized { .. } => EventKind::TaskFinalized,
            Self::TaskTimeout { .. } => EventKind::TaskTimeout,
            Self::SlashedDeposit { .. } => EventKind::SlashedDeposit,
            Self::StartChallenge { .. } => EventKind::StartChallenge,
            Self::Queried { .. } => EventKind::Queried,
            Self::SelectedPhase { .. } => EventKind::SelectedPhase,
            Self::WinnerSelected { .. } => EventKind::WinnerSelected,
            Self::Reported { .. } => EventKind::Reported,
        }
    }

    /// Task the event refers to, if it is a task-lifecycle event.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::TaskCreated { task_id, .. }
            | Self::SolverSelected { task_id, .. }
            | Self::SolutionsCommitted { task_id }
            | Self::SolutionRevealed { task_id }
            | Self::EndRevealPeriod { task_id }
            | Self::TaskFinalized { task_id }
            | Self::TaskTimeout { task_id } => Some(*task_id),
            _ => None,
        }
    }

    /// Game the event refers to, if it is a dispute event.
    pub fn game_id(&self) -> Option<GameId> {
        match self {
            Self::StartChallenge { game_id, .. }
            | Self::Queried { game_id, .. }
            | Self::SelectedPhase { game_id, .. }
            | Self::WinnerSelected { game_id }
            | Self::Reported { game_id, .. } => Some(*game_id),
            _ => None,
        }
    }
}

/// An event together with where it was emitted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(flatten)]
    pub position: EventPosition,
    #[serde(flatten)]
    pub event: LedgerEvent,
}

impl EventRecord {
    pub fn new(position: EventPosition, event: LedgerEvent) -> Self {
        Self { position, event }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}
