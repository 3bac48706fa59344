//! Task descriptors read from the incentive layer.

use serde::{Deserialize, Serialize};

use crate::{Account, Hash32};

/// Format of the program a task asks to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeType {
    Wast,
    Wasm,
    Internal,
}

impl TryFrom<u8> for CodeType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Wast),
            1 => Ok(Self::Wasm),
            2 => Ok(Self::Internal),
            other => Err(other),
        }
    }
}

/// Where the program and its input files are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Ipfs,
    Blockchain,
}

impl TryFrom<u8> for StorageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ipfs),
            1 => Ok(Self::Blockchain),
            other => Err(other),
        }
    }
}

/// Computation descriptor fetched once this solver is selected for a task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    pub giver: Account,
    pub init_state_hash: Hash32,
    pub code_type: CodeType,
    pub storage_type: StorageType,
    /// Content address or on-ledger file id of the program bundle.
    pub storage_address: String,
}

/// Solution bookkeeping the incentive layer keeps per task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionInfo {
    /// Solver recorded for the task, `None` while unassigned.
    pub solver: Option<Account>,
    pub solution_hash: Hash32,
}

impl SolutionInfo {
    pub fn is_taken(&self) -> bool {
        self.solver.is_some_and(|s| !s.is_zero())
    }
}

/// Fields of the final machine state that a reveal must disclose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealPayload {
    pub code: Hash32,
    pub input_size: Hash32,
    pub input_name: Hash32,
    pub input_data: Hash32,
}
