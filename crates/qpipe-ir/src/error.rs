//! Error types for the IR crate.
//!
//! Every variant that comes from validating an operation carries the index of
//! that operation in the circuit, so a malformed circuit can be reproduced and
//! the offending operation located.

use crate::qubit::{ClbitId, QubitId};
use thiserror::Error;

/// Errors raised while building or querying a circuit.
///
/// All operand-validation variants are instances of the malformed-circuit
/// class: the circuit is rejected at construction time and never frozen.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum IrError {
    /// An operation references a qubit outside the circuit's register.
    #[error(
        "Operation {op_index}{}: qubit {qubit} out of range (circuit has {num_qubits} qubits)",
        format_gate_context(.gate_name)
    )]
    QubitOutOfRange {
        /// Index of the offending operation.
        op_index: usize,
        /// The out-of-range qubit.
        qubit: QubitId,
        /// Number of qubits in the circuit.
        num_qubits: u32,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// An operation references a classical bit outside the circuit's register.
    #[error(
        "Operation {op_index}{}: classical bit {clbit} out of range (circuit has {num_clbits} bits)",
        format_gate_context(.gate_name)
    )]
    ClbitOutOfRange {
        /// Index of the offending operation.
        op_index: usize,
        /// The out-of-range classical bit.
        clbit: ClbitId,
        /// Number of classical bits in the circuit.
        num_clbits: u32,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// Gate applied to the wrong number of qubits.
    #[error("Operation {op_index}: gate '{gate_name}' requires {expected} qubits, got {got}")]
    ArityMismatch {
        /// Index of the offending operation.
        op_index: usize,
        /// Name of the gate.
        gate_name: String,
        /// Expected number of qubits.
        expected: u32,
        /// Actual number of qubits provided.
        got: u32,
    },

    /// The same qubit appears twice in one operation.
    #[error("Operation {op_index}{}: duplicate qubit {qubit}", format_gate_context(.gate_name))]
    DuplicateQubit {
        /// Index of the offending operation.
        op_index: usize,
        /// The duplicated qubit.
        qubit: QubitId,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// A measurement without a target classical bit, or with mismatched operands.
    #[error("Operation {op_index}: measurement needs exactly one qubit and one classical bit")]
    MissingClbit {
        /// Index of the offending operation.
        op_index: usize,
    },

    /// A gate, barrier or delay names classical bits.
    #[error(
        "Operation {op_index}{}: only measurements take classical bits",
        format_gate_context(.gate_name)
    )]
    UnexpectedClbit {
        /// Index of the offending operation.
        op_index: usize,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// Parameter is unbound.
    #[error("Parameter '{0}' is unbound")]
    UnboundParameter(String),
}

impl IrError {
    /// Index of the operation that failed validation, if any.
    pub fn op_index(&self) -> Option<usize> {
        match self {
            IrError::QubitOutOfRange { op_index, .. }
            | IrError::ClbitOutOfRange { op_index, .. }
            | IrError::ArityMismatch { op_index, .. }
            | IrError::DuplicateQubit { op_index, .. }
            | IrError::UnexpectedClbit { op_index, .. }
            | IrError::MissingClbit { op_index } => Some(*op_index),
            IrError::UnboundParameter(_) => None,
        }
    }
}

#[allow(clippy::ref_option)]
fn format_gate_context(gate_name: &Option<String>) -> String {
    match gate_name {
        Some(name) => format!(" ({name})"),
        None => String::new(),
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
