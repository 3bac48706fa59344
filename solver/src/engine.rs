//! Collaborators the solver delegates computation and storage to.
//!
//! The deterministic execution engine runs a task's program and exposes the
//! resulting step-indexed trace; the stager publishes the outputs of a
//! revealed solution to content-addressed storage.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use vsolve_types::{Hash32, StepProof, TaskId, TaskInfo, VmSnapshot};

use crate::{EngineError, StagingError};

/// Read access to one execution of a task's program.
#[async_trait]
pub trait ExecutionTrace: Send + Sync {
    async fn initial_state(&self) -> Result<VmSnapshot, EngineError>;

    async fn final_state(&self) -> Result<VmSnapshot, EngineError>;

    /// Hash of the machine state after `step` steps.
    async fn state_hash_at(&self, step: u64) -> Result<Hash32, EngineError>;

    /// Intermediate phase states and per-phase sub-proofs for `step`.
    async fn step_proof(&self, step: u64) -> Result<StepProof, EngineError>;
}

#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn execute(&self, task_id: TaskId, info: &TaskInfo) -> Result<Solution, EngineError>;
}

#[async_trait]
pub trait OutputStager: Send + Sync {
    async fn publish_outputs(&self, task_id: TaskId, solution: &Solution)
        -> Result<(), StagingError>;
}

/// Result of executing a task: the committed hash and the trace backing it.
#[derive(Clone)]
pub struct Solution {
    pub result_hash: Hash32,
    /// Number of executed steps.
    pub steps: u64,
    pub final_vm: VmSnapshot,
    pub trace: Arc<dyn ExecutionTrace>,
}

impl fmt::Debug for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solution")
            .field("result_hash", &self.result_hash)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}
