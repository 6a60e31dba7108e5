//! Quantum gate types.

use serde::{Deserialize, Serialize};

use crate::parameter::{ParameterBindings, ParameterExpression};

/// Standard gates with known semantics.
///
/// Matrices follow the usual conventions: `Rz(θ) = diag(e^{-iθ/2}, e^{iθ/2})`,
/// `P(λ) = diag(1, e^{iλ})`, `U(θ, φ, λ)` is the generic single-qubit gate and
/// `PRX(θ, φ) = Rz(φ)·Rx(θ)·Rz(-φ)`. For controlled gates the first operand is
/// the control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "params", rename_all = "lowercase")]
pub enum StandardGate {
    // Single-qubit Pauli gates
    /// Identity gate.
    #[serde(rename = "id")]
    I,
    /// Pauli-X gate.
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate.
    Z,

    // Single-qubit Clifford gates
    /// Hadamard gate.
    H,
    /// S gate (sqrt(Z)).
    S,
    /// S-dagger gate.
    Sdg,
    /// T gate (fourth root of Z).
    T,
    /// T-dagger gate.
    Tdg,
    /// sqrt(X) gate.
    SX,
    /// sqrt(X)-dagger gate.
    SXdg,

    // Single-qubit rotation gates
    /// Rotation around X axis.
    Rx(ParameterExpression),
    /// Rotation around Y axis.
    Ry(ParameterExpression),
    /// Rotation around Z axis.
    Rz(ParameterExpression),
    /// Phase gate.
    P(ParameterExpression),
    /// Universal single-qubit gate U(θ, φ, λ).
    U(
        ParameterExpression,
        ParameterExpression,
        ParameterExpression,
    ),
    /// Phased X rotation PRX(θ, φ).
    PRX(ParameterExpression, ParameterExpression),

    // Two-qubit gates
    /// Controlled-X (CNOT) gate.
    CX,
    /// Controlled-Y gate.
    CY,
    /// Controlled-Z gate.
    CZ,
    /// Controlled-Hadamard gate.
    CH,
    /// SWAP gate.
    Swap,
    /// iSWAP gate.
    ISwap,
    /// Controlled Rz.
    CRz(ParameterExpression),
    /// Controlled phase.
    CP(ParameterExpression),
    /// ZZ interaction exp(-iθ/2 Z⊗Z).
    RZZ(ParameterExpression),

    // Three-qubit gates
    /// Toffoli gate.
    CCX,
}

impl StandardGate {
    /// Get the lowercase name of this gate, as used in native basis sets.
    pub fn name(&self) -> &'static str {
        match self {
            StandardGate::I => "id",
            StandardGate::X => "x",
            StandardGate::Y => "y",
            StandardGate::Z => "z",
            StandardGate::H => "h",
            StandardGate::S => "s",
            StandardGate::Sdg => "sdg",
            StandardGate::T => "t",
            StandardGate::Tdg => "tdg",
            StandardGate::SX => "sx",
            StandardGate::SXdg => "sxdg",
            StandardGate::Rx(_) => "rx",
            StandardGate::Ry(_) => "ry",
            StandardGate::Rz(_) => "rz",
            StandardGate::P(_) => "p",
            StandardGate::U(..) => "u",
            StandardGate::PRX(..) => "prx",
            StandardGate::CX => "cx",
            StandardGate::CY => "cy",
            StandardGate::CZ => "cz",
            StandardGate::CH => "ch",
            StandardGate::Swap => "swap",
            StandardGate::ISwap => "iswap",
            StandardGate::CRz(_) => "crz",
            StandardGate::CP(_) => "cp",
            StandardGate::RZZ(_) => "rzz",
            StandardGate::CCX => "ccx",
        }
    }

    /// Number of qubits the gate acts on.
    pub fn num_qubits(&self) -> u32 {
        match self {
            StandardGate::CX
            | StandardGate::CY
            | StandardGate::CZ
            | StandardGate::CH
            | StandardGate::Swap
            | StandardGate::ISwap
            | StandardGate::CRz(_)
            | StandardGate::CP(_)
            | StandardGate::RZZ(_) => 2,
            StandardGate::CCX => 3,
            _ => 1,
        }
    }

    /// Check if any parameter is still symbolic.
    pub fn is_parameterized(&self) -> bool {
        self.parameters().iter().any(|p| p.is_symbolic())
    }

    /// Get the parameters of this gate, in declaration order.
    pub fn parameters(&self) -> Vec<&ParameterExpression> {
        match self {
            StandardGate::Rx(p)
            | StandardGate::Ry(p)
            | StandardGate::Rz(p)
            | StandardGate::P(p)
            | StandardGate::CRz(p)
            | StandardGate::CP(p)
            | StandardGate::RZZ(p) => vec![p],
            StandardGate::PRX(t, p) => vec![t, p],
            StandardGate::U(t, p, l) => vec![t, p, l],
            _ => vec![],
        }
    }

    /// Apply `f` to every parameter, keeping the gate kind.
    #[must_use]
    pub fn map_parameters(&self, f: impl Fn(&ParameterExpression) -> ParameterExpression) -> Self {
        match self {
            StandardGate::Rx(p) => StandardGate::Rx(f(p)),
            StandardGate::Ry(p) => StandardGate::Ry(f(p)),
            StandardGate::Rz(p) => StandardGate::Rz(f(p)),
            StandardGate::P(p) => StandardGate::P(f(p)),
            StandardGate::CRz(p) => StandardGate::CRz(f(p)),
            StandardGate::CP(p) => StandardGate::CP(f(p)),
            StandardGate::RZZ(p) => StandardGate::RZZ(f(p)),
            StandardGate::PRX(t, p) => StandardGate::PRX(f(t), f(p)),
            StandardGate::U(t, p, l) => StandardGate::U(f(t), f(p), f(l)),
            other => other.clone(),
        }
    }

    /// True for the gates that are their own inverse.
    pub fn is_self_inverse(&self) -> bool {
        matches!(
            self,
            StandardGate::I
                | StandardGate::X
                | StandardGate::Y
                | StandardGate::Z
                | StandardGate::H
                | StandardGate::CX
                | StandardGate::CY
                | StandardGate::CZ
                | StandardGate::CH
                | StandardGate::Swap
                | StandardGate::CCX
        )
    }

    /// True if swapping the two operands leaves the gate unchanged.
    pub fn is_symmetric(&self) -> bool {
        matches!(
            self,
            StandardGate::CZ
                | StandardGate::Swap
                | StandardGate::ISwap
                | StandardGate::CP(_)
                | StandardGate::RZZ(_)
        )
    }
}

/// A user-defined gate with no built-in semantics.
///
/// Opaque gates are only executable on a device that lists their name as
/// native; no equivalence rule ever targets or expands them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomGate {
    /// Name of the gate.
    pub name: String,
    /// Number of qubits.
    pub num_qubits: u32,
    /// Parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParameterExpression>,
}

impl CustomGate {
    /// Create a new parameterless custom gate.
    pub fn new(name: impl Into<String>, num_qubits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            params: vec![],
        }
    }

    /// Attach parameters.
    #[must_use]
    pub fn with_params(mut self, params: Vec<ParameterExpression>) -> Self {
        self.params = params;
        self
    }
}

/// A gate: standard or custom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GateKind {
    /// A standard gate.
    Standard(StandardGate),
    /// A custom gate.
    Custom(CustomGate),
}

impl GateKind {
    /// Get the name of the gate.
    pub fn name(&self) -> &str {
        match self {
            GateKind::Standard(g) => g.name(),
            GateKind::Custom(g) => &g.name,
        }
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> u32 {
        match self {
            GateKind::Standard(g) => g.num_qubits(),
            GateKind::Custom(g) => g.num_qubits,
        }
    }

    /// Check if any parameter is still symbolic.
    pub fn is_parameterized(&self) -> bool {
        match self {
            GateKind::Standard(g) => g.is_parameterized(),
            GateKind::Custom(g) => g.params.iter().any(ParameterExpression::is_symbolic),
        }
    }

    /// The standard gate, if this is one.
    pub fn as_standard(&self) -> Option<&StandardGate> {
        match self {
            GateKind::Standard(g) => Some(g),
            GateKind::Custom(_) => None,
        }
    }

    /// Substitute bound parameter values.
    #[must_use]
    pub fn bind(&self, bindings: &ParameterBindings) -> Self {
        match self {
            GateKind::Standard(g) => GateKind::Standard(g.map_parameters(|p| p.bind(bindings))),
            GateKind::Custom(g) => GateKind::Custom(CustomGate {
                name: g.name.clone(),
                num_qubits: g.num_qubits,
                params: g.params.iter().map(|p| p.bind(bindings)).collect(),
            }),
        }
    }
}

impl From<StandardGate> for GateKind {
    fn from(gate: StandardGate) -> Self {
        GateKind::Standard(gate)
    }
}

impl From<CustomGate> for GateKind {
    fn from(gate: CustomGate) -> Self {
        GateKind::Custom(gate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_names_and_arity() {
        assert_eq!(StandardGate::H.name(), "h");
        assert_eq!(StandardGate::I.name(), "id");
        assert_eq!(StandardGate::CX.num_qubits(), 2);
        assert_eq!(StandardGate::CCX.num_qubits(), 3);
        assert_eq!(StandardGate::Rz(0.5.into()).num_qubits(), 1);
    }

    #[test]
    fn test_parameterized_detection() {
        let g = StandardGate::Rz(ParameterExpression::symbol("theta"));
        assert!(g.is_parameterized());
        assert!(!StandardGate::Rz(1.0.into()).is_parameterized());

        let mut bindings = ParameterBindings::new();
        bindings.insert("theta".into(), 0.3);
        let bound = GateKind::from(g).bind(&bindings);
        assert!(!bound.is_parameterized());
    }

    #[test]
    fn test_custom_gate() {
        let gate = GateKind::from(CustomGate::new("magic", 2));
        assert_eq!(gate.name(), "magic");
        assert_eq!(gate.num_qubits(), 2);
        assert!(gate.as_standard().is_none());
    }

    #[test]
    fn test_gate_json_shape() {
        let json = serde_json::to_string(&GateKind::from(StandardGate::Rz(0.5.into()))).unwrap();
        assert_eq!(json, r#"{"name":"rz","params":0.5}"#);
        let back: GateKind = serde_json::from_str(r#"{"name":"cx"}"#).unwrap();
        assert_eq!(back, GateKind::Standard(StandardGate::CX));
        let custom: GateKind = serde_json::from_str(r#"{"name":"oracle","num_qubits":1}"#).unwrap();
        assert_eq!(custom.name(), "oracle");
    }
}
