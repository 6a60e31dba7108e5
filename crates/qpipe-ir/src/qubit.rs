//! Qubit and classical bit identifiers.
//!
//! A circuit owns `n` qubits and `m` classical bits, fixed at construction;
//! the ids below are plain indices into those registers. The same type is
//! used for virtual qubits (input circuits) and physical qubits (routed
//! circuits), the pipeline stage tells which one a circuit is expressed over.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a qubit within a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QubitId(pub u32);

impl QubitId {
    /// The index as a `usize`.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for QubitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl From<u32> for QubitId {
    fn from(id: u32) -> Self {
        QubitId(id)
    }
}

/// Index of a classical bit within a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClbitId(pub u32);

impl ClbitId {
    /// The index as a `usize`.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClbitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl From<u32> for ClbitId {
    fn from(id: u32) -> Self {
        ClbitId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qubit_display() {
        assert_eq!(format!("{}", QubitId(3)), "q3");
        assert_eq!(QubitId(3).index(), 3);
    }

    #[test]
    fn test_clbit_display() {
        assert_eq!(format!("{}", ClbitId(0)), "c0");
    }

    #[test]
    fn test_ids_serialize_as_integers() {
        let json = serde_json::to_string(&QubitId(7)).unwrap();
        assert_eq!(json, "7");
        let back: ClbitId = serde_json::from_str("2").unwrap();
        assert_eq!(back, ClbitId(2));
    }
}
