//! Local optimization: single-qubit run fusion and two-qubit cancellation.

use std::sync::Arc;

use tracing::debug;

use qpipe_ir::{Circuit, Instruction, ParameterExpression, QubitId, StandardGate};

use crate::equivalence::BasisTranslator;
use crate::error::CompileResult;
use crate::pass::{Pass, Stage};
use crate::property::PropertySet;
use crate::unitary::{Unitary2x2, normalize_angle};

/// Bound on optimization sweeps; each sweep strictly lowers the cost.
const MAX_SWEEPS: usize = 100;

/// Collapses single-qubit runs and cancels self-inverse two-qubit pairs.
///
/// A run is a maximal sequence of concrete single-qubit gates on one qubit
/// with no other operation on that qubit in between. The run's product is
/// re-synthesised as nothing (identity), a single `rz` (diagonal), or a
/// single `u`, then translated to the basis; the result replaces the run
/// only when it is strictly cheaper or the run held non-native gates.
/// Adjacent identical `cx`, `cz` or `swap` pairs on the same operands are
/// removed. Sweeps repeat until nothing changes, so the pass is idempotent.
pub struct LocalOptimization {
    translator: Arc<BasisTranslator>,
}

impl LocalOptimization {
    /// Create the pass.
    pub fn new(translator: Arc<BasisTranslator>) -> Self {
        Self { translator }
    }

    /// Optimize an operation list over `num_qubits` qubits.
    pub fn optimize(&self, ops: Vec<Instruction>, num_qubits: u32, tol: f64) -> Vec<Instruction> {
        let mut ops = ops;
        for sweep in 0..MAX_SWEEPS {
            let (fused, fused_changed) = self.fuse_runs(ops, num_qubits, tol);
            let (cancelled, cancel_changed) = cancel_pairs(fused, num_qubits);
            ops = cancelled;
            if !fused_changed && !cancel_changed {
                debug!("Local optimization converged after {} sweeps", sweep + 1);
                break;
            }
        }
        ops
    }

    fn fuse_runs(&self, ops: Vec<Instruction>, num_qubits: u32, tol: f64) -> (Vec<Instruction>, bool) {
        let mut runs: Vec<Vec<usize>> = Vec::new();
        let mut open: Vec<Vec<usize>> = vec![Vec::new(); num_qubits as usize];

        for (idx, op) in ops.iter().enumerate() {
            if fusable(op).is_some() {
                open[op.qubits[0].index()].push(idx);
            } else {
                for q in &op.qubits {
                    let run = std::mem::take(&mut open[q.index()]);
                    if !run.is_empty() {
                        runs.push(run);
                    }
                }
            }
        }
        runs.extend(open.into_iter().filter(|r| !r.is_empty()));

        // Run start -> replacement; other run members are dropped.
        let mut replacement: Vec<Option<Vec<Instruction>>> = vec![None; ops.len()];
        let mut dropped = vec![false; ops.len()];
        let mut changed = false;

        for run in runs {
            let run_ops: Vec<Instruction> = run.iter().map(|&i| ops[i].clone()).collect();
            let qubit = run_ops[0].qubits[0];
            let Some(synth) = self.resynthesize(&run_ops, qubit, tol) else {
                continue;
            };
            let has_foreign = run_ops.iter().any(|op| !self.translator.is_native(op.name()));
            let old_cost = self.translator.sequence_cost(&run_ops);
            let new_cost = self.translator.sequence_cost(&synth);
            if has_foreign || new_cost < old_cost - 1e-12 {
                replacement[run[0]] = Some(synth);
                for &i in &run[1..] {
                    dropped[i] = true;
                }
                changed = true;
            }
        }

        if !changed {
            return (ops, false);
        }
        let mut out = Vec::with_capacity(ops.len());
        for (idx, op) in ops.into_iter().enumerate() {
            if let Some(synth) = replacement[idx].take() {
                out.extend(synth);
            } else if !dropped[idx] {
                out.push(op);
            }
        }
        (out, true)
    }

    fn resynthesize(&self, run: &[Instruction], qubit: QubitId, tol: f64) -> Option<Vec<Instruction>> {
        let product = run
            .iter()
            .filter_map(fusable)
            .fold(Unitary2x2::identity(), |acc, m| m * acc);

        if product.is_identity(tol) {
            return Some(vec![]);
        }
        let (theta, phi, lambda) = product.u_angles();
        let gate = if normalize_angle(theta).abs() < tol {
            StandardGate::Rz(ParameterExpression::constant(normalize_angle(phi + lambda)))
        } else {
            StandardGate::U(
                ParameterExpression::constant(theta),
                ParameterExpression::constant(phi),
                ParameterExpression::constant(lambda),
            )
        };
        self.translator.translate(&gate, &[qubit], tol)
    }
}

/// Matrix of a single-qubit gate that may join a run.
fn fusable(op: &Instruction) -> Option<Unitary2x2> {
    if op.qubits.len() != 1 {
        return None;
    }
    op.as_standard_gate().and_then(Unitary2x2::from_gate)
}

fn cancels(a: &Instruction, b: &Instruction) -> bool {
    let (Some(ga), Some(gb)) = (a.as_standard_gate(), b.as_standard_gate()) else {
        return false;
    };
    if ga != gb || !matches!(ga, StandardGate::CX | StandardGate::CZ | StandardGate::Swap) {
        return false;
    }
    a.qubits == b.qubits
        || (ga.is_symmetric() && a.qubits[0] == b.qubits[1] && a.qubits[1] == b.qubits[0])
}

/// Remove adjacent self-inverse two-qubit pairs.
fn cancel_pairs(ops: Vec<Instruction>, num_qubits: u32) -> (Vec<Instruction>, bool) {
    let mut last_on: Vec<Option<usize>> = vec![None; num_qubits as usize];
    let mut removed = vec![false; ops.len()];
    let mut changed = false;

    for (idx, op) in ops.iter().enumerate() {
        if op.is_two_qubit_gate() {
            let (q0, q1) = (op.qubits[0].index(), op.qubits[1].index());
            if let (Some(a), Some(b)) = (last_on[q0], last_on[q1]) {
                if a == b && cancels(&ops[a], op) {
                    removed[a] = true;
                    removed[idx] = true;
                    last_on[q0] = None;
                    last_on[q1] = None;
                    changed = true;
                    continue;
                }
            }
        }
        for q in &op.qubits {
            last_on[q.index()] = Some(idx);
        }
    }

    if !changed {
        return (ops, false);
    }
    let out = ops
        .into_iter()
        .zip(removed)
        .filter_map(|(op, gone)| (!gone).then_some(op))
        .collect();
    (out, true)
}

impl Pass for LocalOptimization {
    fn name(&self) -> &'static str {
        "LocalOptimization"
    }

    fn stage(&self) -> Stage {
        Stage::LocallyOptimized
    }

    fn run(&self, circuit: Circuit, properties: &mut PropertySet) -> CompileResult<Circuit> {
        let before = circuit.len();
        let ops = self.optimize(
            circuit.ops().to_vec(),
            circuit.num_qubits(),
            properties.tolerance(),
        );
        debug!("Local optimization: {} -> {} ops", before, ops.len());
        Ok(Circuit::from_ops(
            circuit.name(),
            circuit.num_qubits(),
            circuit.num_clbits(),
            ops,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BasisGates, CouplingMap, Device};
    use crate::equivalence::EquivalenceLibrary;
    use crate::unitary::{circuit_unitary, equal_up_to_global_phase};
    use qpipe_ir::{CircuitBuilder, ClbitId};

    fn pass(basis: BasisGates) -> (LocalOptimization, PropertySet) {
        let device = Arc::new(Device::new("d", basis, CouplingMap::linear(3)));
        let translator = BasisTranslator::new(EquivalenceLibrary::standard(), &device);
        (LocalOptimization::new(Arc::new(translator)), PropertySet::new(device))
    }

    #[test]
    fn test_inverse_pair_removed() {
        let mut b = CircuitBuilder::new("rz_pair", 1, 0);
        b.rz(0.4, QubitId(0)).unwrap().rz(-0.4, QubitId(0)).unwrap();
        let (opt, mut props) = pass(BasisGates::ibm());
        let out = opt.run(b.build(), &mut props).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_rz_run_merged() {
        let mut b = CircuitBuilder::new("rz", 1, 0);
        b.rz(0.1, QubitId(0))
            .unwrap()
            .rz(0.2, QubitId(0))
            .unwrap()
            .rz(0.3, QubitId(0))
            .unwrap();
        let (opt, mut props) = pass(BasisGates::ibm());
        let out = opt.run(b.build(), &mut props).unwrap();
        assert_eq!(out.len(), 1);
        let angle = out.ops()[0].as_standard_gate().unwrap().parameters()[0]
            .as_f64()
            .unwrap();
        assert!((angle - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_measurement_breaks_run() {
        let mut b = CircuitBuilder::new("m", 1, 1);
        b.rz(0.5, QubitId(0))
            .unwrap()
            .measure(QubitId(0), ClbitId(0))
            .unwrap()
            .rz(-0.5, QubitId(0))
            .unwrap();
        let (opt, mut props) = pass(BasisGates::ibm());
        let out = opt.run(b.build(), &mut props).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_cx_pair_cancelled() {
        let mut b = CircuitBuilder::new("cxcx", 2, 0);
        b.cx(QubitId(0), QubitId(1))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap();
        let (opt, mut props) = pass(BasisGates::ibm());
        assert!(opt.run(b.build(), &mut props).unwrap().is_empty());
    }

    #[test]
    fn test_reversed_cx_not_cancelled() {
        let mut b = CircuitBuilder::new("cxxc", 2, 0);
        b.cx(QubitId(0), QubitId(1))
            .unwrap()
            .cx(QubitId(1), QubitId(0))
            .unwrap();
        let (opt, mut props) = pass(BasisGates::ibm());
        assert_eq!(opt.run(b.build(), &mut props).unwrap().len(), 2);
    }

    #[test]
    fn test_cancellation_exposes_new_run() {
        // rz, cx, cx, rz collapses to nothing.
        let mut b = CircuitBuilder::new("nested", 2, 0);
        b.rz(0.7, QubitId(0))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap()
            .rz(-0.7, QubitId(0))
            .unwrap();
        let (opt, mut props) = pass(BasisGates::ibm());
        assert!(opt.run(b.build(), &mut props).unwrap().is_empty());
    }

    #[test]
    fn test_unitary_preserved_and_idempotent() {
        let mut b = CircuitBuilder::new("mix", 2, 0);
        b.rz(0.3, QubitId(0))
            .unwrap()
            .sx(QubitId(0))
            .unwrap()
            .rz(1.1, QubitId(0))
            .unwrap()
            .sx(QubitId(0))
            .unwrap()
            .rz(-0.2, QubitId(0))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap()
            .x(QubitId(1))
            .unwrap()
            .x(QubitId(1))
            .unwrap();
        let circuit = b.build();
        let (opt, mut props) = pass(BasisGates::ibm());
        let once = opt.run(circuit.clone(), &mut props).unwrap();
        let twice = opt.run(once.clone(), &mut props).unwrap();
        assert_eq!(once, twice);
        let before = circuit_unitary(&circuit).unwrap();
        let after = circuit_unitary(&once).unwrap();
        assert!(equal_up_to_global_phase(&before, &after, 1e-9));
        assert!(once.len() < circuit.len());
    }

    #[test]
    fn test_approximation_drops_tiny_rotation() {
        let mut b = CircuitBuilder::new("tiny", 1, 0);
        b.rz(1e-4, QubitId(0)).unwrap();
        let (opt, mut props) = pass(BasisGates::ibm());
        assert_eq!(opt.run(b.build(), &mut props).unwrap().len(), 1);
        props.approximation_degree = 0.0;
        let mut b = CircuitBuilder::new("tiny", 1, 0);
        b.rz(1e-4, QubitId(0)).unwrap();
        assert!(opt.run(b.build(), &mut props).unwrap().is_empty());
    }
}
