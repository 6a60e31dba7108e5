//! Backend trait.
//!
//! A backend is an opaque function from a compiled circuit and a shot count
//! to raw measurement counts:
//!
//! ```text
//!   capabilities() ──→ validate() ──→ execute()
//!    (sync, &ref)       (async)        (async)
//! ```
//!
//! | Method | Kind | Required | Returns |
//! |--------|------|----------|---------|
//! | `name()` | sync | yes | `&str` |
//! | `capabilities()` | sync | yes | `&Capabilities` |
//! | `validate()` | async | provided | `HalResult<ValidationResult>` |
//! | `execute()` | async | yes | `HalResult<ExecutionResult>` |

use async_trait::async_trait;

use qpipe_ir::Circuit;

use crate::capability::Capabilities;
use crate::error::HalResult;
use crate::result::ExecutionResult;

/// Trait for execution backends.
///
/// # Contract
///
/// - `capabilities()` MUST be synchronous and infallible; cache it at
///   construction time.
/// - `execute()` is the only suspending call. Callers may drop its future at
///   any await point to abandon the execution, so implementations must not
///   leave shared state inconsistent across awaits.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Get the capabilities of this backend.
    fn capabilities(&self) -> &Capabilities;

    /// Validate a circuit against backend constraints.
    ///
    /// The default checks qubit count, shot limit and the gate set.
    async fn validate(&self, circuit: &Circuit, shots: u32) -> HalResult<ValidationResult> {
        let caps = self.capabilities();
        let mut reasons = Vec::new();
        if circuit.num_qubits() > caps.num_qubits {
            reasons.push(format!(
                "circuit uses {} qubits, backend has {}",
                circuit.num_qubits(),
                caps.num_qubits
            ));
        }
        if shots == 0 || shots > caps.max_shots {
            reasons.push(format!("shots {shots} outside 1..={}", caps.max_shots));
        }
        for (idx, op) in circuit.ops().iter().enumerate() {
            if op.is_gate() && !caps.supports_gate(op.name()) {
                reasons.push(format!("operation {idx}: gate '{}' not supported", op.name()));
            }
        }
        if reasons.is_empty() {
            Ok(ValidationResult::Valid)
        } else {
            Ok(ValidationResult::Invalid { reasons })
        }
    }

    /// Execute a circuit and return its measurement counts.
    async fn execute(&self, circuit: &Circuit, shots: u32) -> HalResult<ExecutionResult>;
}

/// Result of circuit validation against backend constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Circuit can be executed as-is.
    Valid,
    /// Circuit cannot run on this backend.
    Invalid {
        /// Reasons the circuit is invalid.
        reasons: Vec<String>,
    },
}

impl ValidationResult {
    /// Check if the circuit is valid.
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}
