//! Error types for compilation.

use thiserror::Error;

use qpipe_ir::IrError;

use crate::pass::Stage;

/// Errors that abort a compilation pipeline.
///
/// Every variant belongs to exactly one pipeline [`Stage`]; see
/// [`CompileError::stage`].
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// The input circuit failed operand validation.
    #[error("Malformed circuit: {0}")]
    MalformedCircuit(#[from] IrError),

    /// The device cannot host the circuit, or a layout override is infeasible.
    #[error("Insufficient qubits at {stage}: circuit needs {required}, device has {available} ({detail})")]
    InsufficientQubits {
        /// Stage that detected the problem.
        stage: Stage,
        /// Qubits the circuit (or mapping) needs.
        required: u32,
        /// Physical qubits available.
        available: u32,
        /// What exactly was infeasible.
        detail: String,
    },

    /// The router exceeded its iteration cap.
    #[error("Routing did not converge within {limit} iterations (ran {iterations})")]
    RoutingTimeout {
        /// Iterations performed.
        iterations: usize,
        /// The deterministic cap.
        limit: usize,
    },

    /// No equivalence-rule path reaches the native basis.
    #[error("Unsupported gate '{gate}' at operation {op_index} during {stage}")]
    UnsupportedGate {
        /// Index of the offending operation in the input circuit.
        op_index: usize,
        /// Gate name.
        gate: String,
        /// Stage that detected the problem.
        stage: Stage,
    },

    /// Two qubits the router must connect lie in disconnected components.
    #[error("No path between physical qubits {qubit1} and {qubit2}")]
    RoutingFailed {
        /// First physical qubit.
        qubit1: u32,
        /// Second physical qubit.
        qubit2: u32,
    },

    /// A two-qubit operation acts on non-adjacent physical qubits.
    #[error("Operation {op_index}: physical qubits {qubit1} and {qubit2} are not connected")]
    ConnectivityViolation {
        /// Index of the offending operation.
        op_index: usize,
        /// First physical qubit.
        qubit1: u32,
        /// Second physical qubit.
        qubit2: u32,
    },

    /// Configuration rejected before any pass ran.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl CompileError {
    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            CompileError::MalformedCircuit(_) | CompileError::InvalidConfiguration(_) => {
                Stage::Validated
            }
            CompileError::InsufficientQubits { stage, .. }
            | CompileError::UnsupportedGate { stage, .. } => *stage,
            CompileError::RoutingTimeout { .. }
            | CompileError::RoutingFailed { .. }
            | CompileError::ConnectivityViolation { .. } => Stage::Routed,
        }
    }
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;
