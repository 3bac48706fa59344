//! Fundamental types for the vsolve solver agent.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! ledger identifiers, token amounts, ledger events, task descriptors and the
//! proof fragments exchanged during a verification game.

pub mod amount;
pub mod error;
pub mod event;
pub mod ids;
pub mod network;
pub mod proof;
pub mod task;

pub use alloy_primitives::{Address as Account, B256 as Hash32};

pub use amount::Amount;
pub use error::TypesError;
pub use event::{
    Contract, EventKind, EventPosition, EventRecord, LedgerEvent, SubscribeFrom,
};
pub use ids::{EntityId, GameId, TaskId};
pub use network::NetworkId;
pub use proof::{
    MachineSnapshot, MachineSummary, MerkleWitness, Opcode, Phase, PhaseProof, StepProof,
    VmSnapshot, Word,
};
pub use task::{CodeType, RevealPayload, SolutionInfo, StorageType, TaskInfo};
