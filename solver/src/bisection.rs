//! Bisection arithmetic and judge-call selection for verification games.
//!
//! The challenger narrows the disputed interval `[low, high)` by querying
//! the state hash at its midpoint; once `low + 1 == high` the defender posts
//! the intermediate phase states of step `low` and the challenger picks one
//! phase to be judged.

use vsolve_types::{GameId, Phase, PhaseProof, StepProof};

use crate::LedgerCall;

/// Midpoint of `[low, high)`, rounded down, without overflow.
pub fn midpoint(low: u64, high: u64) -> u64 {
    low + (high - low) / 2
}

/// Rounds needed to isolate one step of a `total_steps` execution when every
/// query lands in the larger half: `ceil(log2(total_steps + 1))`.
pub fn rounds_to_isolate(total_steps: u64) -> u32 {
    let width = total_steps.saturating_add(1);
    if width <= 1 {
        0
    } else {
        u64::BITS - (width - 1).leading_zeros()
    }
}

/// The two halves a query at the midpoint can narrow `[low, high)` to.
pub fn split(low: u64, high: u64) -> ((u64, u64), (u64, u64)) {
    let mid = midpoint(low, high);
    ((low, mid), (mid, high))
}

/// Build the judge call for a selected phase of step `low`.
///
/// Register writes of custom-judge instructions go to the custom judge
/// together with the result witnesses; everything else goes to the generic
/// judge. Proof fields the engine left out are sent as zero witnesses.
pub fn judge_call(game_id: GameId, low: u64, phase: Phase, proof: &StepProof) -> LedgerCall {
    let sub = proof.phase(phase);
    let machine = sub.machine_or_zero();
    let vm = sub.vm_or_zero().summary();

    if phase.writes_result() && machine.op.is_custom_judge() {
        let (path, _) = sub.merkle_paths();
        LedgerCall::CallCustomJudge {
            game_id,
            low,
            opcode: machine.op,
            registers: machine.registers(),
            result_state: sub.result_state_or_zero(),
            result_size: sub.result_size_or_zero(),
            proof: path,
            vm,
        }
    } else {
        generic_judge_call(game_id, low, phase, &sub)
    }
}

fn generic_judge_call(game_id: GameId, low: u64, phase: Phase, sub: &PhaseProof) -> LedgerCall {
    let machine = sub.machine_or_zero();
    let (proof, proof2) = sub.merkle_paths();
    LedgerCall::CallJudge {
        game_id,
        low,
        phase: phase.index(),
        proof,
        proof2,
        vm_hash: machine.vm,
        opcode: machine.op,
        registers: machine.registers(),
        vm: sub.vm_or_zero().summary(),
    }
}
