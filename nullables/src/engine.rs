//! Nullable execution engine with a synthetic, fully deterministic trace.
//!
//! Every hash in the trace is derived from the task id and step number, so
//! tests can recompute what the solver should have submitted.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use vsolve_crypto::keccak;
use vsolve_solver::{EngineError, ExecutionEngine, ExecutionTrace, Solution};
use vsolve_types::{
    Hash32, MachineSnapshot, MerkleWitness, Opcode, Phase, PhaseProof, StepProof, TaskId,
    TaskInfo, VmSnapshot, Word,
};

/// Opcode byte used for ordinary instructions in synthetic traces.
const PLAIN_OPCODE_BYTE: u8 = 0x01;

pub struct NullEngine {
    steps: AtomicU64,
    custom_judge: AtomicBool,
    failing: Mutex<HashSet<TaskId>>,
    executions: Mutex<Vec<TaskId>>,
}

impl NullEngine {
    /// Engine whose executions all run for `steps` steps.
    pub fn new(steps: u64) -> Self {
        Self {
            steps: AtomicU64::new(steps),
            custom_judge: AtomicBool::new(false),
            failing: Mutex::new(HashSet::new()),
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Make every step's instruction a custom-judge instruction.
    pub fn with_custom_judge(self) -> Self {
        self.custom_judge.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_task(&self, task_id: TaskId) {
        self.failing.lock().unwrap().insert(task_id);
    }

    /// Tasks executed so far, in order.
    pub fn executions(&self) -> Vec<TaskId> {
        self.executions.lock().unwrap().clone()
    }

    /// Result hash the engine reports for `task_id`.
    pub fn result_hash(task_id: TaskId) -> Hash32 {
        keccak(&[task_id.as_bytes().as_slice(), &b"result"[..]].concat())
    }
}

impl Default for NullEngine {
    fn default() -> Self {
        Self::new(7)
    }
}

#[async_trait]
impl ExecutionEngine for NullEngine {
    async fn execute(&self, task_id: TaskId, _info: &TaskInfo) -> Result<Solution, EngineError> {
        self.executions.lock().unwrap().push(task_id);
        if self.failing.lock().unwrap().contains(&task_id) {
            return Err(EngineError::Execution(format!("scripted failure for {task_id}")));
        }
        let trace = NullTrace {
            task_id,
            steps: self.steps.load(Ordering::SeqCst),
            custom_judge: self.custom_judge.load(Ordering::SeqCst),
        };
        Ok(Solution {
            result_hash: Self::result_hash(task_id),
            steps: trace.steps,
            final_vm: trace.vm_at(trace.steps),
            trace: Arc::new(trace),
        })
    }
}

/// Synthetic trace of `steps` steps.
#[derive(Clone, Debug)]
pub struct NullTrace {
    pub task_id: TaskId,
    pub steps: u64,
    pub custom_judge: bool,
}

impl NullTrace {
    fn derive(&self, step: u64, label: &[u8]) -> Hash32 {
        keccak(&[self.task_id.as_bytes().as_slice(), &step.to_be_bytes()[..], label].concat())
    }

    /// Hash of the state after `step` steps of `task_id`.
    pub fn state_hash(task_id: TaskId, step: u64) -> Hash32 {
        keccak(&[task_id.as_bytes().as_slice(), &step.to_be_bytes()[..], &b"state"[..]].concat())
    }

    pub fn vm_at(&self, step: u64) -> VmSnapshot {
        VmSnapshot {
            code: self.derive(0, b"code"),
            stack: self.derive(step, b"stack"),
            memory: self.derive(step, b"memory"),
            call_stack: self.derive(step, b"call_stack"),
            globals: self.derive(step, b"globals"),
            calltable: self.derive(0, b"calltable"),
            calltypes: self.derive(0, b"calltypes"),
            input_size: self.derive(0, b"input_size"),
            input_name: self.derive(0, b"input_name"),
            input_data: self.derive(step, b"input_data"),
            pc: step,
            stack_ptr: step % 16,
            call_ptr: 0,
            memsize: 1,
        }
    }

    fn check_step(&self, step: u64) -> Result<(), EngineError> {
        if step > self.steps {
            return Err(EngineError::StepOutOfRange {
                step,
                steps: self.steps,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionTrace for NullTrace {
    async fn initial_state(&self) -> Result<VmSnapshot, EngineError> {
        Ok(self.vm_at(0))
    }

    async fn final_state(&self) -> Result<VmSnapshot, EngineError> {
        Ok(self.vm_at(self.steps))
    }

    async fn state_hash_at(&self, step: u64) -> Result<Hash32, EngineError> {
        self.check_step(step)?;
        Ok(Self::state_hash(self.task_id, step))
    }

    async fn step_proof(&self, step: u64) -> Result<StepProof, EngineError> {
        self.check_step(step)?;
        let states = (0..=Phase::TABLE.len() as u8)
            .map(|i| self.derive(step, &[b'p', i]))
            .collect();

        let op = if self.custom_judge {
            Opcode::with_marker_byte(vsolve_types::proof::CUSTOM_JUDGE_MARKER)
        } else {
            Opcode::with_marker_byte(PLAIN_OPCODE_BYTE)
        };
        let machine = MachineSnapshot {
            reg1: Word::from(step),
            reg2: Word::from(step + 1),
            reg3: Word::ZERO,
            ireg: Word::from(7u64),
            vm: self.derive(step, b"vm"),
            op,
        };

        let phases = Phase::TABLE
            .iter()
            .map(|phase| {
                let merkle = (self.custom_judge && phase.writes_result()).then(|| MerkleWitness {
                    list: Some(vec![self.derive(step, b"result_path")]),
                    result_state: Some(self.derive(step, b"result_state")),
                    result_size: Some(32),
                    ..MerkleWitness::default()
                });
                let proof = PhaseProof {
                    location: Some(vec![self.derive(step, &[b'l', phase.index() as u8])]),
                    merkle,
                    machine: Some(machine),
                    vm: Some(self.vm_at(step)),
                };
                (*phase, proof)
            })
            .collect::<BTreeMap<_, _>>();

        Ok(StepProof { states, phases })
    }
}
