//! Dynamical decoupling for idle qubits.

use std::sync::Arc;

use tracing::{debug, warn};

use qpipe_ir::{Circuit, Instruction, InstructionKind, QubitId, StandardGate};

use crate::device::Device;
use crate::equivalence::BasisTranslator;
use crate::error::CompileResult;
use crate::pass::{Pass, Stage};
use crate::property::PropertySet;

/// Start and end time of every operation under as-soon-as-possible timing.
///
/// Barriers take no time but align all their qubits to the latest one.
pub fn schedule_asap(circuit: &Circuit, device: &Device) -> Vec<(u64, u64)> {
    let mut qubit_free = vec![0u64; circuit.num_qubits() as usize];
    let mut clbit_free = vec![0u64; circuit.num_clbits() as usize];
    circuit
        .ops()
        .iter()
        .map(|op| {
            let start = op
                .qubits
                .iter()
                .map(|q| qubit_free[q.index()])
                .chain(op.clbits.iter().map(|c| clbit_free[c.index()]))
                .max()
                .unwrap_or(0);
            let end = start + op_duration(op, device);
            for q in &op.qubits {
                qubit_free[q.index()] = end;
            }
            for c in &op.clbits {
                clbit_free[c.index()] = end;
            }
            (start, end)
        })
        .collect()
}

/// Device time an operation occupies.
pub fn op_duration(op: &Instruction, device: &Device) -> u64 {
    match &op.kind {
        InstructionKind::Delay { duration } => *duration,
        InstructionKind::Barrier => 0,
        InstructionKind::Measure => device.duration("measure").unwrap_or(0),
        InstructionKind::Gate { gate } => device.duration(gate.name()).unwrap_or(0),
    }
}

/// Fills idle windows with an X-X echo.
///
/// An idle window is either a gap between two consecutive operations on a
/// qubit or an explicit delay. A window of length `W` that fits two X pulses
/// of duration `d` becomes `delay(τ/4) X delay(τ/2) X delay(τ/4)` with
/// `τ = W - 2d`, rounded so the pieces sum to exactly `W`. The sequence is
/// placed on the window's qubit just before the operation that ends the
/// window, so every other operation keeps its start time.
pub struct DynamicalDecoupling {
    translator: Arc<BasisTranslator>,
}

impl DynamicalDecoupling {
    /// Create the pass.
    pub fn new(translator: Arc<BasisTranslator>) -> Self {
        Self { translator }
    }

    /// The X pulse in native gates, if the basis can express it.
    fn x_pulse(&self, qubit: QubitId) -> Option<Vec<Instruction>> {
        self.translator.translate(&StandardGate::X, &[qubit], 0.0)
    }

    /// Build the echo for a window, or `None` if it does not fit.
    fn sequence(&self, qubit: QubitId, window: u64, device: &Device) -> Option<Vec<Instruction>> {
        let pulse = self.x_pulse(qubit)?;
        let pulse_len: u64 = pulse.iter().map(|op| op_duration(op, device)).sum();
        if pulse_len == 0 || window < 2 * pulse_len {
            return None;
        }
        let tau = window - 2 * pulse_len;
        let first = tau / 4;
        let middle = tau / 2;
        let last = tau - first - middle;

        let mut seq = Vec::new();
        let mut delay = |seq: &mut Vec<Instruction>, d: u64| {
            if d > 0 {
                seq.push(Instruction::delay(qubit, d));
            }
        };
        delay(&mut seq, first);
        seq.extend(pulse.iter().cloned());
        delay(&mut seq, middle);
        seq.extend(pulse);
        delay(&mut seq, last);
        Some(seq)
    }
}

impl Pass for DynamicalDecoupling {
    fn name(&self) -> &'static str {
        "DynamicalDecoupling"
    }

    fn stage(&self) -> Stage {
        Stage::ErrorSuppressed
    }

    fn should_run(&self, _circuit: &Circuit, properties: &PropertySet) -> bool {
        if properties.device.has_durations() {
            true
        } else {
            warn!(
                "Device '{}' has no gate durations; skipping dynamical decoupling",
                properties.device.name()
            );
            false
        }
    }

    fn run(&self, circuit: Circuit, properties: &mut PropertySet) -> CompileResult<Circuit> {
        let device = properties.device.clone();
        let schedule = schedule_asap(&circuit, &device);
        let ops = circuit.ops();

        // Sequences to emit right before op `i`, and delays to replace.
        let mut before: Vec<Vec<Instruction>> = vec![Vec::new(); ops.len()];
        let mut replace: Vec<Option<Vec<Instruction>>> = vec![None; ops.len()];
        let mut last_end: Vec<Option<u64>> = vec![None; circuit.num_qubits() as usize];
        let mut inserted = 0usize;

        for (idx, op) in ops.iter().enumerate() {
            let (start, end) = schedule[idx];
            if let InstructionKind::Delay { duration } = op.kind {
                if let Some(seq) = self.sequence(op.qubits[0], duration, &device) {
                    replace[idx] = Some(seq);
                    inserted += 1;
                }
            } else {
                for &q in &op.qubits {
                    if let Some(prev_end) = last_end[q.index()] {
                        if start > prev_end {
                            if let Some(seq) = self.sequence(q, start - prev_end, &device) {
                                before[idx].extend(seq);
                                inserted += 1;
                            }
                        }
                    }
                }
            }
            for q in &op.qubits {
                last_end[q.index()] = Some(end);
            }
        }

        if inserted == 0 {
            return Ok(circuit);
        }

        let mut out = Vec::with_capacity(ops.len() + inserted * 5);
        for (idx, op) in ops.iter().enumerate() {
            out.append(&mut before[idx]);
            match replace[idx].take() {
                Some(seq) => out.extend(seq),
                None => out.push(op.clone()),
            }
        }

        debug!("Inserted {} decoupling sequences", inserted);
        properties.report.dd_sequences += inserted;
        Ok(Circuit::from_ops(
            circuit.name(),
            circuit.num_qubits(),
            circuit.num_clbits(),
            out,
        )?)
    }
}
