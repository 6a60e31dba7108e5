//! Statevector simulation engine.

use num_complex::Complex64;
use rand::Rng;

use qpipe_compile::unitary::{apply_matrix, gate_matrix};
use qpipe_hal::{HalError, HalResult};
use qpipe_ir::{Instruction, InstructionKind};

/// A statevector representing a quantum state.
///
/// Basis index bit `q` is the state of qubit `q`.
pub struct Statevector {
    /// The state amplitudes (2^n complex numbers).
    amplitudes: Vec<Complex64>,
    /// Number of qubits.
    num_qubits: usize,
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> Self {
        let size = 1 << num_qubits;
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); size];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Get the number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Apply a unitary instruction. Measurements are the caller's business;
    /// barriers and delays do nothing.
    pub fn apply(&mut self, index: usize, instruction: &Instruction) -> HalResult<()> {
        match &instruction.kind {
            InstructionKind::Gate { .. } => {
                let gate = instruction.as_standard_gate().ok_or_else(|| {
                    HalError::InvalidCircuit(format!(
                        "operation {index}: custom gate '{}' cannot be simulated",
                        instruction.name()
                    ))
                })?;
                let matrix = gate_matrix(gate).ok_or_else(|| {
                    HalError::InvalidCircuit(format!(
                        "operation {index}: gate '{}' has unbound parameters",
                        instruction.name()
                    ))
                })?;
                let qubits: Vec<usize> = instruction.qubits.iter().map(|q| q.index()).collect();
                apply_matrix(&mut self.amplitudes, &matrix, &qubits);
                Ok(())
            }
            InstructionKind::Measure | InstructionKind::Barrier | InstructionKind::Delay { .. } => {
                Ok(())
            }
        }
    }

    /// Probability of each basis state.
    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(Complex64::norm_sqr).collect()
    }

    /// Probability that `qubit` reads 1.
    pub fn probability_one(&self, qubit: usize) -> f64 {
        let mask = 1 << qubit;
        self.amplitudes
            .iter()
            .enumerate()
            .filter(|(i, _)| i & mask != 0)
            .map(|(_, a)| a.norm_sqr())
            .sum()
    }

    /// Measure one qubit, collapsing the state.
    pub fn measure<R: Rng>(&mut self, qubit: usize, rng: &mut R) -> bool {
        let p1 = self.probability_one(qubit);
        let outcome = rng.r#gen::<f64>() < p1;
        let norm = if outcome { p1 } else { 1.0 - p1 }.sqrt();
        let mask = 1 << qubit;
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if (i & mask != 0) == outcome {
                *amp /= norm;
            } else {
                *amp = Complex64::new(0.0, 0.0);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpipe_ir::{CustomGate, QubitId, StandardGate};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn test_bell_probabilities() {
        let mut sv = Statevector::new(2);
        sv.apply(0, &Instruction::single_qubit_gate(StandardGate::H, QubitId(0)))
            .unwrap();
        sv.apply(
            1,
            &Instruction::two_qubit_gate(StandardGate::CX, QubitId(0), QubitId(1)),
        )
        .unwrap();
        let probs = sv.probabilities();
        assert!((probs[0] - 0.5).abs() < 1e-12);
        assert!((probs[3] - 0.5).abs() < 1e-12);
        assert!(probs[1].abs() < 1e-12 && probs[2].abs() < 1e-12);
    }

    #[test]
    fn test_measure_collapses() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut sv = Statevector::new(2);
        sv.apply(0, &Instruction::single_qubit_gate(StandardGate::H, QubitId(0)))
            .unwrap();
        sv.apply(
            1,
            &Instruction::two_qubit_gate(StandardGate::CX, QubitId(0), QubitId(1)),
        )
        .unwrap();
        let first = sv.measure(0, &mut rng);
        let expected = if first { 1.0 } else { 0.0 };
        assert!((sv.probability_one(1) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_custom_gate_rejected() {
        let mut sv = Statevector::new(1);
        let op = Instruction::gate(CustomGate::new("oracle", 1), [QubitId(0)]);
        assert!(matches!(sv.apply(3, &op), Err(HalError::InvalidCircuit(msg)) if msg.contains("operation 3")));
    }
}
