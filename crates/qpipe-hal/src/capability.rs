//! Backend capabilities.

use serde::{Deserialize, Serialize};

/// Static limits of a backend, cached at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Name of the backend.
    pub name: String,
    /// Number of qubits available.
    pub num_qubits: u32,
    /// Maximum number of shots per execution.
    pub max_shots: u32,
    /// Whether this is a simulator (`true`) or real hardware (`false`).
    pub is_simulator: bool,
    /// Gates the backend accepts directly. `None` means any standard gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_set: Option<Vec<String>>,
}

impl Capabilities {
    /// Create capabilities for a simulator.
    pub fn simulator(num_qubits: u32) -> Self {
        Self {
            name: "simulator".into(),
            num_qubits,
            max_shots: 1_000_000,
            is_simulator: true,
            gate_set: None,
        }
    }

    /// Set the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Restrict the accepted gates.
    #[must_use]
    pub fn with_gate_set(mut self, gates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.gate_set = Some(gates.into_iter().map(Into::into).collect());
        self
    }

    /// Set the shot limit.
    #[must_use]
    pub fn with_max_shots(mut self, max_shots: u32) -> Self {
        self.max_shots = max_shots;
        self
    }

    /// Check if a gate is accepted.
    pub fn supports_gate(&self, name: &str) -> bool {
        self.gate_set
            .as_ref()
            .is_none_or(|gates| gates.iter().any(|g| g == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulator_capabilities() {
        let caps = Capabilities::simulator(20);
        assert_eq!(caps.num_qubits, 20);
        assert!(caps.is_simulator);
        assert!(caps.supports_gate("ccx"));
    }

    #[test]
    fn test_gate_set_restricts() {
        let caps = Capabilities::simulator(2).with_gate_set(["rz", "sx", "cx"]);
        assert!(caps.supports_gate("cx"));
        assert!(!caps.supports_gate("h"));
    }
}
