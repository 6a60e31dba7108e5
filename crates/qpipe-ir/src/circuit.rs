//! Frozen circuits and the append-only builder that produces them.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::dag::CircuitDag;
use crate::error::{IrError, IrResult};
use crate::gate::{GateKind, StandardGate};
use crate::instruction::{Instruction, InstructionKind};
use crate::parameter::{ParameterBindings, ParameterExpression};
use crate::qubit::{ClbitId, QubitId};

/// A quantum circuit: fixed registers and an ordered list of operations.
///
/// A `Circuit` is immutable once built. Compilation passes consume one and
/// produce a new one; nothing edits operations in place. Every operation has
/// been validated against the registers, so passes can index qubits without
/// re-checking bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Circuit {
    name: String,
    num_qubits: u32,
    num_clbits: u32,
    ops: Vec<Instruction>,
}

/// Serialized form; goes through validation on the way in.
#[derive(Deserialize)]
struct RawCircuit {
    #[serde(default)]
    name: String,
    num_qubits: u32,
    #[serde(default)]
    num_clbits: u32,
    #[serde(default)]
    ops: Vec<Instruction>,
}

impl<'de> Deserialize<'de> for Circuit {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawCircuit::deserialize(deserializer)?;
        Circuit::from_ops(raw.name, raw.num_qubits, raw.num_clbits, raw.ops)
            .map_err(serde::de::Error::custom)
    }
}

impl Circuit {
    /// Build a circuit from a complete operation list, validating every op.
    pub fn from_ops(
        name: impl Into<String>,
        num_qubits: u32,
        num_clbits: u32,
        ops: impl IntoIterator<Item = Instruction>,
    ) -> IrResult<Self> {
        let mut builder = CircuitBuilder::new(name, num_qubits, num_clbits);
        for op in ops {
            builder.append(op)?;
        }
        Ok(builder.build())
    }

    /// Create a builder for a new circuit.
    pub fn builder(name: impl Into<String>, num_qubits: u32, num_clbits: u32) -> CircuitBuilder {
        CircuitBuilder::new(name, num_qubits, num_clbits)
    }

    /// Get the circuit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Number of classical bits.
    pub fn num_clbits(&self) -> u32 {
        self.num_clbits
    }

    /// Operations in sequence order.
    pub fn ops(&self) -> &[Instruction] {
        &self.ops
    }

    /// Number of operations of any kind.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if the circuit has no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Do operations `i` and `j` touch a common qubit or classical bit?
    ///
    /// Two operations are ordered relative to each other exactly when this
    /// holds. Out-of-range indices share nothing.
    pub fn shares_resource(&self, i: usize, j: usize) -> bool {
        let (Some(a), Some(b)) = (self.ops.get(i), self.ops.get(j)) else {
            return false;
        };
        a.qubits.iter().any(|q| b.qubits.contains(q))
            || a.clbits.iter().any(|c| b.clbits.contains(c))
    }

    /// Number of gate operations (measurements, barriers and delays excluded).
    pub fn gate_count(&self) -> usize {
        self.ops.iter().filter(|op| op.is_gate()).count()
    }

    /// Number of gates acting on two qubits.
    pub fn num_two_qubit_ops(&self) -> usize {
        self.ops.iter().filter(|op| op.is_two_qubit_gate()).count()
    }

    /// Operation counts keyed by name.
    pub fn count_ops(&self) -> FxHashMap<String, usize> {
        let mut counts = FxHashMap::default();
        for op in &self.ops {
            *counts.entry(op.name().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Length of the longest dependency chain.
    ///
    /// Barriers count as a layer, like any other operation.
    pub fn depth(&self) -> usize {
        let mut qubit_level = vec![0usize; self.num_qubits as usize];
        let mut clbit_level = vec![0usize; self.num_clbits as usize];
        let mut depth = 0;
        for op in &self.ops {
            let start = op
                .qubits
                .iter()
                .map(|q| qubit_level[q.index()])
                .chain(op.clbits.iter().map(|c| clbit_level[c.index()]))
                .max()
                .unwrap_or(0);
            let level = start + 1;
            for q in &op.qubits {
                qubit_level[q.index()] = level;
            }
            for c in &op.clbits {
                clbit_level[c.index()] = level;
            }
            depth = depth.max(level);
        }
        depth
    }

    /// True if the circuit contains at least one measurement.
    pub fn has_measurements(&self) -> bool {
        self.ops.iter().any(Instruction::is_measure)
    }

    /// True if any gate parameter is still symbolic.
    pub fn is_parameterized(&self) -> bool {
        self.ops
            .iter()
            .filter_map(Instruction::as_gate)
            .any(GateKind::is_parameterized)
    }

    /// Names of all free parameters, sorted and deduplicated.
    pub fn parameter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .ops
            .iter()
            .filter_map(Instruction::as_standard_gate)
            .flat_map(|g| {
                g.parameters()
                    .into_iter()
                    .flat_map(|p| p.symbols().map(str::to_string).collect::<Vec<_>>())
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Distinct unordered qubit pairs that interact through two-qubit gates,
    /// in order of first appearance.
    pub fn interaction_pairs(&self) -> Vec<(QubitId, QubitId)> {
        let mut seen = FxHashSet::default();
        let mut pairs = Vec::new();
        for op in self.ops.iter().filter(|op| op.is_two_qubit_gate()) {
            let (a, b) = (op.qubits[0], op.qubits[1]);
            let key = if a < b { (a, b) } else { (b, a) };
            if seen.insert(key) {
                pairs.push(key);
            }
        }
        pairs
    }

    /// Substitute parameter values, producing a new circuit.
    #[must_use]
    pub fn bind_parameters(&self, bindings: &ParameterBindings) -> Self {
        Self {
            name: self.name.clone(),
            num_qubits: self.num_qubits,
            num_clbits: self.num_clbits,
            ops: self.ops.iter().map(|op| op.bind(bindings)).collect(),
        }
    }

    /// Build the dependency DAG.
    pub fn to_dag(&self) -> CircuitDag {
        CircuitDag::from_circuit(self)
    }

    /// Start a builder pre-filled with this circuit's registers and ops.
    ///
    /// Used to extend a frozen circuit into a new one.
    pub fn to_builder(&self) -> CircuitBuilder {
        CircuitBuilder {
            name: self.name.clone(),
            num_qubits: self.num_qubits,
            num_clbits: self.num_clbits,
            ops: self.ops.clone(),
        }
    }

    // =========================================================================
    // Standard circuits
    // =========================================================================

    /// Create a Bell state circuit with final measurements.
    pub fn bell() -> IrResult<Self> {
        let mut b = CircuitBuilder::new("bell", 2, 2);
        b.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?.measure_all()?;
        Ok(b.build())
    }

    /// Create an n-qubit GHZ state circuit with final measurements.
    pub fn ghz(n: u32) -> IrResult<Self> {
        let mut b = CircuitBuilder::new(format!("ghz_{n}"), n, n);
        if n > 0 {
            b.h(QubitId(0))?;
        }
        for i in 1..n {
            b.cx(QubitId(0), QubitId(i))?;
        }
        b.measure_all()?;
        Ok(b.build())
    }
}

/// Append-only builder for [`Circuit`].
///
/// Every appended operation is validated immediately; the error reports the
/// index the operation would have had.
#[derive(Debug, Clone)]
pub struct CircuitBuilder {
    name: String,
    num_qubits: u32,
    num_clbits: u32,
    ops: Vec<Instruction>,
}

impl CircuitBuilder {
    /// Create a builder with fixed register sizes.
    pub fn new(name: impl Into<String>, num_qubits: u32, num_clbits: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            num_clbits,
            ops: vec![],
        }
    }

    /// Number of operations appended so far.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True if nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Validate and append an operation.
    #[allow(clippy::cast_possible_truncation)]
    pub fn append(&mut self, op: Instruction) -> IrResult<&mut Self> {
        let op_index = self.ops.len();
        let gate_name = op.as_gate().map(|g| g.name().to_string());

        if let InstructionKind::Gate { gate } = &op.kind {
            let expected = gate.num_qubits();
            let got = op.qubits.len() as u32;
            if expected != got {
                return Err(IrError::ArityMismatch {
                    op_index,
                    gate_name: gate.name().to_string(),
                    expected,
                    got,
                });
            }
        }

        match &op.kind {
            InstructionKind::Measure if op.qubits.len() != 1 || op.clbits.len() != 1 => {
                return Err(IrError::MissingClbit { op_index });
            }
            InstructionKind::Gate { .. } | InstructionKind::Barrier | InstructionKind::Delay { .. }
                if !op.clbits.is_empty() =>
            {
                return Err(IrError::UnexpectedClbit {
                    op_index,
                    gate_name: gate_name.clone(),
                });
            }
            InstructionKind::Delay { .. } if op.qubits.len() != 1 => {
                return Err(IrError::ArityMismatch {
                    op_index,
                    gate_name: "delay".into(),
                    expected: 1,
                    got: op.qubits.len() as u32,
                });
            }
            _ => {}
        }

        for &qubit in &op.qubits {
            if qubit.0 >= self.num_qubits {
                return Err(IrError::QubitOutOfRange {
                    op_index,
                    qubit,
                    num_qubits: self.num_qubits,
                    gate_name,
                });
            }
        }

        for &clbit in &op.clbits {
            if clbit.0 >= self.num_clbits {
                return Err(IrError::ClbitOutOfRange {
                    op_index,
                    clbit,
                    num_clbits: self.num_clbits,
                    gate_name,
                });
            }
        }

        let mut seen = FxHashSet::default();
        for &qubit in &op.qubits {
            if !seen.insert(qubit) {
                return Err(IrError::DuplicateQubit {
                    op_index,
                    qubit,
                    gate_name,
                });
            }
        }

        self.ops.push(op);
        Ok(self)
    }

    /// Freeze into a circuit.
    pub fn build(self) -> Circuit {
        Circuit {
            name: self.name,
            num_qubits: self.num_qubits,
            num_clbits: self.num_clbits,
            ops: self.ops,
        }
    }

    fn std1(&mut self, gate: StandardGate, q: QubitId) -> IrResult<&mut Self> {
        self.append(Instruction::single_qubit_gate(gate, q))
    }

    fn std2(&mut self, gate: StandardGate, a: QubitId, b: QubitId) -> IrResult<&mut Self> {
        self.append(Instruction::two_qubit_gate(gate, a, b))
    }

    // =========================================================================
    // Single-qubit gates
    // =========================================================================

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::H, qubit)
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::X, qubit)
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::Y, qubit)
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::Z, qubit)
    }

    /// Apply S gate.
    pub fn s(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::S, qubit)
    }

    /// Apply S-dagger gate.
    pub fn sdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::Sdg, qubit)
    }

    /// Apply T gate.
    pub fn t(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::T, qubit)
    }

    /// Apply T-dagger gate.
    pub fn tdg(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::Tdg, qubit)
    }

    /// Apply sqrt(X) gate.
    pub fn sx(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.std1(StandardGate::SX, qubit)
    }

    /// Apply RX rotation.
    pub fn rx(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.std1(StandardGate::Rx(theta.into()), qubit)
    }

    /// Apply RY rotation.
    pub fn ry(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.std1(StandardGate::Ry(theta.into()), qubit)
    }

    /// Apply RZ rotation.
    pub fn rz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.std1(StandardGate::Rz(theta.into()), qubit)
    }

    /// Apply phase gate.
    pub fn p(
        &mut self,
        lambda: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.std1(StandardGate::P(lambda.into()), qubit)
    }

    /// Apply U(θ, φ, λ).
    pub fn u(
        &mut self,
        theta: impl Into<ParameterExpression>,
        phi: impl Into<ParameterExpression>,
        lambda: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        self.std1(
            StandardGate::U(theta.into(), phi.into(), lambda.into()),
            qubit,
        )
    }

    // =========================================================================
    // Multi-qubit gates
    // =========================================================================

    /// Apply CNOT gate.
    pub fn cx(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.std2(StandardGate::CX, control, target)
    }

    /// Apply CZ gate.
    pub fn cz(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.std2(StandardGate::CZ, control, target)
    }

    /// Apply SWAP gate.
    pub fn swap(&mut self, q1: QubitId, q2: QubitId) -> IrResult<&mut Self> {
        self.std2(StandardGate::Swap, q1, q2)
    }

    /// Apply controlled phase.
    pub fn cp(
        &mut self,
        lambda: impl Into<ParameterExpression>,
        control: QubitId,
        target: QubitId,
    ) -> IrResult<&mut Self> {
        self.std2(StandardGate::CP(lambda.into()), control, target)
    }

    /// Apply ZZ interaction.
    pub fn rzz(
        &mut self,
        theta: impl Into<ParameterExpression>,
        q1: QubitId,
        q2: QubitId,
    ) -> IrResult<&mut Self> {
        self.std2(StandardGate::RZZ(theta.into()), q1, q2)
    }

    /// Apply Toffoli gate.
    pub fn ccx(&mut self, c1: QubitId, c2: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.append(Instruction::gate(StandardGate::CCX, [c1, c2, target]))
    }

    /// Apply any gate.
    pub fn gate(
        &mut self,
        gate: impl Into<GateKind>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.append(Instruction::gate(gate, qubits))
    }

    // =========================================================================
    // Non-unitary operations
    // =========================================================================

    /// Measure a qubit into a classical bit.
    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        self.append(Instruction::measure(qubit, clbit))
    }

    /// Measure qubit i into classical bit i for every qubit that has a bit.
    pub fn measure_all(&mut self) -> IrResult<&mut Self> {
        for i in 0..self.num_qubits.min(self.num_clbits) {
            self.measure(QubitId(i), ClbitId(i))?;
        }
        Ok(self)
    }

    /// Barrier across the given qubits.
    pub fn barrier(&mut self, qubits: impl IntoIterator<Item = QubitId>) -> IrResult<&mut Self> {
        self.append(Instruction::barrier(qubits))
    }

    /// Idle a qubit for `duration` device time units.
    pub fn delay(&mut self, qubit: QubitId, duration: u64) -> IrResult<&mut Self> {
        self.append(Instruction::delay(qubit, duration))
    }
}
