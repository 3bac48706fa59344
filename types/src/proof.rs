//! Machine-state commitments and per-step proof fragments.
//!
//! These are produced by the execution engine and submitted to the
//! dispute resolution layer. Every field the engine may leave out is an
//! `Option`; the `*_or_zero` accessors supply the canonical empty witness
//! the judge contract expects for resources a step did not touch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Hash32, RevealPayload, TypesError};

/// A 256-bit machine register value.
pub type Word = alloy_primitives::U256;

/// Number of merkle roots in a machine-state summary.
pub const ROOT_COUNT: usize = 10;
/// Number of structural pointers in a machine-state summary.
pub const POINTER_COUNT: usize = 4;

/// Opcode byte position, counted from the least-significant end of the
/// opcode word, that identifies the custom-judge instruction family
/// (bits 40..48).
pub const CUSTOM_JUDGE_BYTE_FROM_END: usize = 6;
/// Value of that byte for custom-judge instructions.
pub const CUSTOM_JUDGE_MARKER: u8 = 0x10;

/// Merkle roots and pointers committing to one machine state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSummary {
    pub roots: [Hash32; ROOT_COUNT],
    pub pointers: [u64; POINTER_COUNT],
}

/// Snapshot of the interpreter state at one step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmSnapshot {
    pub code: Hash32,
    pub stack: Hash32,
    pub memory: Hash32,
    pub call_stack: Hash32,
    pub globals: Hash32,
    pub calltable: Hash32,
    pub calltypes: Hash32,
    pub input_size: Hash32,
    pub input_name: Hash32,
    pub input_data: Hash32,
    pub pc: u64,
    pub stack_ptr: u64,
    pub call_ptr: u64,
    pub memsize: u64,
}

impl VmSnapshot {
    pub fn roots(&self) -> [Hash32; ROOT_COUNT] {
        [
            self.code,
            self.stack,
            self.memory,
            self.call_stack,
            self.globals,
            self.calltable,
            self.calltypes,
            self.input_size,
            self.input_name,
            self.input_data,
        ]
    }

    pub fn pointers(&self) -> [u64; POINTER_COUNT] {
        [self.pc, self.stack_ptr, self.call_ptr, self.memsize]
    }

    pub fn summary(&self) -> MachineSummary {
        MachineSummary {
            roots: self.roots(),
            pointers: self.pointers(),
        }
    }

    pub fn reveal_payload(&self) -> RevealPayload {
        RevealPayload {
            code: self.code,
            input_size: self.input_size,
            input_name: self.input_name,
            input_data: self.input_data,
        }
    }
}

/// A 32-byte encoded instruction as the judge contract decodes it.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opcode(pub Hash32);

impl Opcode {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(Hash32::new(bytes))
    }

    /// Opcode word with a single byte set at `CUSTOM_JUDGE_BYTE_FROM_END`.
    pub fn with_marker_byte(byte: u8) -> Self {
        let mut bytes = [0u8; 32];
        bytes[32 - CUSTOM_JUDGE_BYTE_FROM_END] = byte;
        Self::new(bytes)
    }

    /// The byte inspected for custom-judge detection.
    pub fn marker_byte(&self) -> u8 {
        self.0 .0[32 - CUSTOM_JUDGE_BYTE_FROM_END]
    }

    pub fn is_custom_judge(&self) -> bool {
        self.marker_byte() == CUSTOM_JUDGE_MARKER
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opcode({})", self.0)
    }
}

/// Register file and decoded instruction at one phase of a step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSnapshot {
    pub reg1: Word,
    pub reg2: Word,
    pub reg3: Word,
    pub ireg: Word,
    /// Hash of the VM state the registers were read from.
    pub vm: Hash32,
    pub op: Opcode,
}

impl MachineSnapshot {
    pub fn registers(&self) -> [Word; 4] {
        [self.reg1, self.reg2, self.reg3, self.ireg]
    }
}

/// Merkle witnesses for a phase that reads or writes a merkleized resource.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MerkleWitness {
    pub list: Option<Vec<Hash32>>,
    pub list1: Option<Vec<Hash32>>,
    pub list2: Option<Vec<Hash32>>,
    /// Result state root, present for custom-judge instructions.
    pub result_state: Option<Hash32>,
    /// Result size, present for custom-judge instructions.
    pub result_size: Option<u64>,
}

/// Sub-proof for one phase of a single execution step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseProof {
    /// Location proof for phases that only address a resource.
    pub location: Option<Vec<Hash32>>,
    pub merkle: Option<MerkleWitness>,
    pub machine: Option<MachineSnapshot>,
    pub vm: Option<VmSnapshot>,
}

impl PhaseProof {
    /// Primary and secondary merkle paths for the generic judge.
    ///
    /// A merkle witness takes precedence over a bare location proof; missing
    /// lists become empty paths.
    pub fn merkle_paths(&self) -> (Vec<Hash32>, Vec<Hash32>) {
        match &self.merkle {
            Some(m) => (
                m.list
                    .clone()
                    .or_else(|| m.list1.clone())
                    .unwrap_or_default(),
                m.list2.clone().unwrap_or_default(),
            ),
            None => (self.location.clone().unwrap_or_default(), Vec::new()),
        }
    }

    pub fn machine_or_zero(&self) -> MachineSnapshot {
        self.machine.unwrap_or_default()
    }

    pub fn vm_or_zero(&self) -> VmSnapshot {
        self.vm.unwrap_or_default()
    }

    pub fn result_state_or_zero(&self) -> Hash32 {
        self.merkle
            .as_ref()
            .and_then(|m| m.result_state)
            .unwrap_or_default()
    }

    pub fn result_size_or_zero(&self) -> u64 {
        self.merkle.as_ref().and_then(|m| m.result_size).unwrap_or(0)
    }
}

/// Structural phases a single step is decomposed into for judging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    FetchCode,
    InitRegisters,
    ReadRegister1,
    ReadRegister2,
    ReadRegister3,
    Alu,
    WriteRegister1,
    WriteRegister2,
    UpdatePc,
    UpdateStackPtr,
    UpdateCallPtr,
    UpdateMemsize,
}

impl Phase {
    /// Phase table, indexed by the phase number the challenger selects.
    pub const TABLE: [Phase; 12] = [
        Phase::FetchCode,
        Phase::InitRegisters,
        Phase::ReadRegister1,
        Phase::ReadRegister2,
        Phase::ReadRegister3,
        Phase::Alu,
        Phase::WriteRegister1,
        Phase::WriteRegister2,
        Phase::UpdatePc,
        Phase::UpdateStackPtr,
        Phase::UpdateCallPtr,
        Phase::UpdateMemsize,
    ];

    pub fn from_index(index: u64) -> Result<Self, TypesError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::TABLE.get(i).copied())
            .ok_or(TypesError::UnknownPhase(index))
    }

    pub fn index(&self) -> u64 {
        Self::TABLE
            .iter()
            .position(|p| p == self)
            .map(|i| i as u64)
            .unwrap_or_default()
    }

    /// Whether this phase can route to the custom judge.
    pub fn writes_result(&self) -> bool {
        *self == Phase::WriteRegister1
    }
}

/// Everything the engine can prove about one execution step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepProof {
    /// Intermediate state hashes between phases, posted when the bisection
    /// collapses onto this step.
    pub states: Vec<Hash32>,
    pub phases: BTreeMap<Phase, PhaseProof>,
}

impl StepProof {
    /// Sub-proof for `phase`, or the empty proof if the step has none.
    pub fn phase(&self, phase: Phase) -> PhaseProof {
        self.phases.get(&phase).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u8) -> Hash32 {
        Hash32::repeat_byte(n)
    }

    #[test]
    fn phase_table_round_trips() {
        for (i, phase) in Phase::TABLE.iter().enumerate() {
            assert_eq!(Phase::from_index(i as u64).unwrap(), *phase);
            assert_eq!(phase.index(), i as u64);
        }
        assert!(matches!(
            Phase::from_index(12),
            Err(TypesError::UnknownPhase(12))
        ));
    }

    #[test]
    fn write_register1_is_phase_six() {
        assert_eq!(Phase::from_index(6).unwrap(), Phase::WriteRegister1);
        assert!(Phase::WriteRegister1.writes_result());
        assert!(!Phase::Alu.writes_result());
    }

    #[test]
    fn marker_byte_sits_at_bits_40_to_48() {
        let op = Opcode::with_marker_byte(CUSTOM_JUDGE_MARKER);
        let as_word = Word::from_be_bytes(op.0 .0);
        assert_eq!(as_word >> 40, Word::from(CUSTOM_JUDGE_MARKER));
        assert!(op.is_custom_judge());
        assert!(!Opcode::default().is_custom_judge());
    }

    #[test]
    fn merkle_witness_takes_precedence_over_location() {
        let proof = PhaseProof {
            location: Some(vec![h(1)]),
            merkle: Some(MerkleWitness {
                list1: Some(vec![h(2)]),
                list2: Some(vec![h(3)]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(proof.merkle_paths(), (vec![h(2)], vec![h(3)]));
    }

    #[test]
    fn location_used_without_merkle() {
        let proof = PhaseProof {
            location: Some(vec![h(1), h(4)]),
            ..Default::default()
        };
        assert_eq!(proof.merkle_paths(), (vec![h(1), h(4)], vec![]));
    }

    #[test]
    fn absent_fields_yield_zero_witness() {
        let proof = PhaseProof::default();
        assert_eq!(proof.merkle_paths(), (vec![], vec![]));
        assert_eq!(proof.machine_or_zero().registers(), [Word::ZERO; 4]);
        assert_eq!(proof.vm_or_zero().summary(), MachineSummary::default());
        assert_eq!(proof.result_state_or_zero(), Hash32::ZERO);
        assert_eq!(proof.result_size_or_zero(), 0);
    }

    #[test]
    fn missing_phase_is_empty_proof() {
        let step = StepProof::default();
        assert_eq!(step.phase(Phase::UpdatePc), PhaseProof::default());
    }

    #[test]
    fn vm_summary_orders_roots_and_pointers() {
        let vm = VmSnapshot {
            code: h(1),
            input_data: h(9),
            pc: 7,
            memsize: 3,
            ..Default::default()
        };
        let summary = vm.summary();
        assert_eq!(summary.roots[0], h(1));
        assert_eq!(summary.roots[9], h(9));
        assert_eq!(summary.pointers, [7, 0, 0, 3]);
        assert_eq!(vm.reveal_payload().input_data, h(9));
    }
}
