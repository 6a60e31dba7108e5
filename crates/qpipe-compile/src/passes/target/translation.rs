//! Basis translation pass.

use std::sync::Arc;

use tracing::debug;

use qpipe_ir::{Circuit, GateKind, InstructionKind};

use crate::equivalence::BasisTranslator;
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, Stage};
use crate::property::PropertySet;

/// Rewrites every non-native gate into the device basis.
///
/// Native gates, measurements, barriers and delays pass through untouched.
/// Custom gates are only accepted when the device lists them as native.
pub struct BasisTranslation {
    translator: Arc<BasisTranslator>,
}

impl BasisTranslation {
    /// Create the pass.
    pub fn new(translator: Arc<BasisTranslator>) -> Self {
        Self { translator }
    }
}

impl Pass for BasisTranslation {
    fn name(&self) -> &'static str {
        "BasisTranslation"
    }

    fn stage(&self) -> Stage {
        Stage::Translated
    }

    fn run(&self, circuit: Circuit, properties: &mut PropertySet) -> CompileResult<Circuit> {
        let tol = properties.tolerance();
        let mut ops = Vec::with_capacity(circuit.len());
        let mut sources = Vec::with_capacity(circuit.len());
        let mut rewritten = 0usize;

        for (idx, op) in circuit.ops().iter().enumerate() {
            let InstructionKind::Gate { gate } = &op.kind else {
                ops.push(op.clone());
                sources.push(Some(idx));
                continue;
            };
            if self.translator.is_native(gate.name()) {
                ops.push(op.clone());
                sources.push(Some(idx));
                continue;
            }
            let translated = match gate {
                GateKind::Standard(g) => self.translator.translate(g, &op.qubits, tol),
                GateKind::Custom(_) => None,
            };
            let Some(translated) = translated else {
                // Router-inserted swaps have no input op; report their
                // position in the routed circuit instead.
                return Err(CompileError::UnsupportedGate {
                    op_index: properties.origin_of(idx).unwrap_or(idx),
                    gate: gate.name().to_string(),
                    stage: Stage::Translated,
                });
            };
            rewritten += 1;
            sources.extend(std::iter::repeat_n(Some(idx), translated.len()));
            ops.extend(translated);
        }

        debug!("Translated {} gates into the native basis", rewritten);
        properties.remap_origins(&sources);
        Ok(Circuit::from_ops(
            circuit.name(),
            circuit.num_qubits(),
            circuit.num_clbits(),
            ops,
        )?)
    }
}
