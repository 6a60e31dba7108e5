//! Input validation and multi-qubit unrolling.

use std::sync::Arc;

use tracing::debug;

use qpipe_ir::{Circuit, GateKind, InstructionKind};

use crate::equivalence::EquivalenceLibrary;
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, Stage};
use crate::property::PropertySet;

/// Checks the input and expands every gate on three or more qubits.
///
/// After this pass the router only ever sees one- and two-qubit gates.
/// Barriers may still span many qubits; they impose ordering but need no
/// connectivity.
pub struct Validate {
    library: Arc<EquivalenceLibrary>,
}

impl Validate {
    /// Create the pass over a rule library.
    pub fn new(library: Arc<EquivalenceLibrary>) -> Self {
        Self { library }
    }
}

impl Pass for Validate {
    fn name(&self) -> &'static str {
        "Validate"
    }

    fn stage(&self) -> Stage {
        Stage::Validated
    }

    fn run(&self, circuit: Circuit, properties: &mut PropertySet) -> CompileResult<Circuit> {
        let needs_unroll = circuit.ops().iter().any(|op| op.is_gate() && op.qubits.len() > 2);
        if !needs_unroll {
            return Ok(circuit);
        }

        let mut ops = Vec::with_capacity(circuit.len());
        let mut sources = Vec::with_capacity(circuit.len());
        let mut unrolled = 0usize;
        for (op_index, op) in circuit.ops().iter().enumerate() {
            let InstructionKind::Gate { gate } = &op.kind else {
                ops.push(op.clone());
                sources.push(Some(op_index));
                continue;
            };
            if op.qubits.len() <= 2 {
                ops.push(op.clone());
                sources.push(Some(op_index));
                continue;
            }
            let expanded = match gate {
                GateKind::Standard(g) => self.library.unroll(g, &op.qubits),
                GateKind::Custom(_) => None,
            };
            let Some(expanded) = expanded else {
                return Err(CompileError::UnsupportedGate {
                    op_index,
                    gate: gate.name().to_string(),
                    stage: Stage::Validated,
                });
            };
            unrolled += 1;
            sources.extend(std::iter::repeat_n(Some(op_index), expanded.len()));
            ops.extend(expanded);
        }

        debug!("Unrolled {} multi-qubit gates", unrolled);
        properties.remap_origins(&sources);
        Ok(Circuit::from_ops(
            circuit.name(),
            circuit.num_qubits(),
            circuit.num_clbits(),
            ops,
        )?)
    }
}
