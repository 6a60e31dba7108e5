//! Circuit operations combining gates with operands.

use serde::{Deserialize, Serialize};

use crate::gate::{GateKind, StandardGate};
use crate::parameter::ParameterBindings;
use crate::qubit::{ClbitId, QubitId};

/// The kind of operation in a circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InstructionKind {
    /// A quantum gate.
    Gate {
        /// The gate applied.
        gate: GateKind,
    },
    /// Measurement of one qubit into one classical bit.
    Measure,
    /// Barrier across the listed qubits.
    Barrier,
    /// Idle for a fixed number of device time units.
    Delay {
        /// Duration in device time units.
        duration: u64,
    },
}

/// A complete operation with operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The kind of operation.
    #[serde(flatten)]
    pub kind: InstructionKind,
    /// Qubit operands, in order.
    pub qubits: Vec<QubitId>,
    /// Classical-bit operands (measurement only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clbits: Vec<ClbitId>,
}

impl Instruction {
    /// Create a gate operation.
    pub fn gate(gate: impl Into<GateKind>, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Gate { gate: gate.into() },
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a single-qubit gate operation.
    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::gate(gate, [qubit])
    }

    /// Create a two-qubit gate operation.
    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(gate, [q1, q2])
    }

    /// Create a measurement.
    pub fn measure(qubit: QubitId, clbit: ClbitId) -> Self {
        Self {
            kind: InstructionKind::Measure,
            qubits: vec![qubit],
            clbits: vec![clbit],
        }
    }

    /// Create a barrier.
    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self {
            kind: InstructionKind::Barrier,
            qubits: qubits.into_iter().collect(),
            clbits: vec![],
        }
    }

    /// Create a delay on one qubit.
    pub fn delay(qubit: QubitId, duration: u64) -> Self {
        Self {
            kind: InstructionKind::Delay { duration },
            qubits: vec![qubit],
            clbits: vec![],
        }
    }

    /// The gate, if this operation is one.
    #[inline]
    pub fn as_gate(&self) -> Option<&GateKind> {
        match &self.kind {
            InstructionKind::Gate { gate } => Some(gate),
            _ => None,
        }
    }

    /// The standard gate, if this operation is one.
    #[inline]
    pub fn as_standard_gate(&self) -> Option<&StandardGate> {
        self.as_gate().and_then(GateKind::as_standard)
    }

    /// Check if this is a gate.
    #[inline]
    pub fn is_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate { .. })
    }

    /// Check if this is a measurement.
    #[inline]
    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure)
    }

    /// Check if this is a barrier.
    #[inline]
    pub fn is_barrier(&self) -> bool {
        matches!(self.kind, InstructionKind::Barrier)
    }

    /// Check if this is a delay.
    #[inline]
    pub fn is_delay(&self) -> bool {
        matches!(self.kind, InstructionKind::Delay { .. })
    }

    /// A gate acting on exactly one qubit.
    #[inline]
    pub fn is_single_qubit_gate(&self) -> bool {
        self.is_gate() && self.qubits.len() == 1
    }

    /// A gate acting on exactly two qubits.
    #[inline]
    pub fn is_two_qubit_gate(&self) -> bool {
        self.is_gate() && self.qubits.len() == 2
    }

    /// Get the name of this operation.
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Gate { gate } => gate.name(),
            InstructionKind::Measure => "measure",
            InstructionKind::Barrier => "barrier",
            InstructionKind::Delay { .. } => "delay",
        }
    }

    /// Same operation with qubit operands remapped through `f`.
    #[must_use]
    pub fn remap_qubits(&self, f: impl Fn(QubitId) -> QubitId) -> Self {
        Self {
            kind: self.kind.clone(),
            qubits: self.qubits.iter().map(|&q| f(q)).collect(),
            clbits: self.clbits.clone(),
        }
    }

    /// Same operation with bound parameters substituted.
    #[must_use]
    pub fn bind(&self, bindings: &ParameterBindings) -> Self {
        match &self.kind {
            InstructionKind::Gate { gate } => Self {
                kind: InstructionKind::Gate {
                    gate: gate.bind(bindings),
                },
                qubits: self.qubits.clone(),
                clbits: self.clbits.clone(),
            },
            _ => self.clone(),
        }
    }
}
