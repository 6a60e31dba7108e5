//! Unitary matrix utilities.
//!
//! Two layers: [`Unitary2x2`] for fast single-qubit run fusion, and dense
//! `ndarray` matrices for checking multi-qubit equivalences and for
//! statevector simulation.
//!
//! Bit conventions for dense matrices: in a full circuit unitary, qubit `q`
//! is bit `q` of the basis-state index (qubit 0 least significant). Inside a
//! gate's own matrix, operand 0 is the most significant bit, so `CX` has the
//! familiar `diag(I, X)` block form with operand 0 as control.

use std::f64::consts::PI;

use ndarray::Array2;
use num_complex::Complex64;

use qpipe_ir::{Circuit, Instruction, InstructionKind, StandardGate};

const C0: Complex64 = Complex64::new(0.0, 0.0);
const C1: Complex64 = Complex64::new(1.0, 0.0);
const CI: Complex64 = Complex64::new(0.0, 1.0);

/// Magnitudes below this are treated as zero when extracting angles.
const ANGLE_EPSILON: f64 = 1e-12;

/// A 2x2 unitary matrix in row-major order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unitary2x2 {
    /// The matrix elements in row-major order: [[a, b], [c, d]].
    pub data: [Complex64; 4],
}

impl Unitary2x2 {
    /// Create a new 2x2 matrix.
    pub fn new(a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Self {
        Self { data: [a, b, c, d] }
    }

    /// The identity matrix.
    pub fn identity() -> Self {
        Self::new(C1, C0, C0, C1)
    }

    /// U(θ, φ, λ).
    pub fn u(theta: f64, phi: f64, lambda: f64) -> Self {
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        Self::new(
            Complex64::new(c, 0.0),
            -Complex64::from_polar(s, lambda),
            Complex64::from_polar(s, phi),
            Complex64::from_polar(c, phi + lambda),
        )
    }

    /// Rotation around X.
    pub fn rx(theta: f64) -> Self {
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        Self::new(
            Complex64::new(c, 0.0),
            Complex64::new(0.0, -s),
            Complex64::new(0.0, -s),
            Complex64::new(c, 0.0),
        )
    }

    /// Rotation around Y.
    pub fn ry(theta: f64) -> Self {
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        Self::new(
            Complex64::new(c, 0.0),
            Complex64::new(-s, 0.0),
            Complex64::new(s, 0.0),
            Complex64::new(c, 0.0),
        )
    }

    /// Rotation around Z.
    pub fn rz(theta: f64) -> Self {
        Self::new(
            Complex64::from_polar(1.0, -theta / 2.0),
            C0,
            C0,
            Complex64::from_polar(1.0, theta / 2.0),
        )
    }

    /// Phase gate P(λ).
    pub fn p(lambda: f64) -> Self {
        Self::new(C1, C0, C0, Complex64::from_polar(1.0, lambda))
    }

    /// Phased X rotation: Rz(φ)·Rx(θ)·Rz(-φ).
    pub fn prx(theta: f64, phi: f64) -> Self {
        Self::rz(phi) * Self::rx(theta) * Self::rz(-phi)
    }

    /// Matrix of a single-qubit standard gate with concrete parameters.
    pub fn from_gate(gate: &StandardGate) -> Option<Self> {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let half = Complex64::new(0.5, 0.5);
        let half_c = Complex64::new(0.5, -0.5);
        let angle = |i: usize| gate.parameters().get(i).and_then(|p| p.as_f64());
        Some(match gate {
            StandardGate::I => Self::identity(),
            StandardGate::X => Self::new(C0, C1, C1, C0),
            StandardGate::Y => Self::new(C0, -CI, CI, C0),
            StandardGate::Z => Self::new(C1, C0, C0, -C1),
            StandardGate::H => {
                let s = Complex64::new(h, 0.0);
                Self::new(s, s, s, -s)
            }
            StandardGate::S => Self::new(C1, C0, C0, CI),
            StandardGate::Sdg => Self::new(C1, C0, C0, -CI),
            StandardGate::T => Self::p(PI / 4.0),
            StandardGate::Tdg => Self::p(-PI / 4.0),
            StandardGate::SX => Self::new(half, half_c, half_c, half),
            StandardGate::SXdg => Self::new(half_c, half, half, half_c),
            StandardGate::Rx(_) => Self::rx(angle(0)?),
            StandardGate::Ry(_) => Self::ry(angle(0)?),
            StandardGate::Rz(_) => Self::rz(angle(0)?),
            StandardGate::P(_) => Self::p(angle(0)?),
            StandardGate::U(..) => Self::u(angle(0)?, angle(1)?, angle(2)?),
            StandardGate::PRX(..) => Self::prx(angle(0)?, angle(1)?),
            _ => return None,
        })
    }

    /// Matrix product `self · other`.
    #[allow(clippy::many_single_char_names)]
    pub fn mul(&self, other: &Self) -> Self {
        let [a, b, c, d] = self.data;
        let [e, f, g, h] = other.data;
        Self::new(a * e + b * g, a * f + b * h, c * e + d * g, c * f + d * h)
    }

    /// Conjugate transpose.
    pub fn dagger(&self) -> Self {
        Self::new(
            self.data[0].conj(),
            self.data[2].conj(),
            self.data[1].conj(),
            self.data[3].conj(),
        )
    }

    /// Identity up to global phase, within `tol` on matrix elements.
    pub fn is_identity(&self, tol: f64) -> bool {
        let [a, b, c, d] = self.data;
        b.norm() < tol && c.norm() < tol && (a - d).norm() < tol
    }

    /// Equal to `other` up to global phase, within `tol` on matrix elements.
    pub fn approx_eq_up_to_phase(&self, other: &Self, tol: f64) -> bool {
        (self.dagger() * *other).is_identity(tol)
    }

    /// Angles `(θ, φ, λ)` with `U(θ, φ, λ) = e^{iδ}·self` for some phase δ.
    ///
    /// When θ is 0 the split between φ and λ is arbitrary; φ is set to 0.
    /// When θ is π, φ is set to 0 as well.
    pub fn u_angles(&self) -> (f64, f64, f64) {
        let [a, b, c, d] = self.data;
        let theta = 2.0 * c.norm().atan2(a.norm());

        if c.norm() < ANGLE_EPSILON {
            return (0.0, 0.0, normalize_angle(d.arg() - a.arg()));
        }
        if a.norm() < ANGLE_EPSILON {
            return (PI, 0.0, normalize_angle((-b).arg() - c.arg()));
        }

        let delta = a.arg();
        (
            theta,
            normalize_angle(c.arg() - delta),
            normalize_angle((-b).arg() - delta),
        )
    }
}

impl Default for Unitary2x2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Unitary2x2 {
    type Output = Self;

    #[allow(clippy::needless_pass_by_value)]
    fn mul(self, rhs: Self) -> Self::Output {
        Unitary2x2::mul(&self, &rhs)
    }
}

/// Normalize an angle to (-π, π].
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let mut a = angle.rem_euclid(2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    }
    a
}

/// Dense matrix of any standard gate with concrete parameters.
///
/// Operand 0 is the most significant bit of the gate's local index.
pub fn gate_matrix(gate: &StandardGate) -> Option<Array2<Complex64>> {
    if let Some(u) = Unitary2x2::from_gate(gate) {
        let [a, b, c, d] = u.data;
        return Array2::from_shape_vec((2, 2), vec![a, b, c, d]).ok();
    }

    let angle = |i: usize| gate.parameters().get(i).and_then(|p| p.as_f64());
    let controlled = |u: Unitary2x2| {
        let mut m = Array2::<Complex64>::eye(4);
        m[[2, 2]] = u.data[0];
        m[[2, 3]] = u.data[1];
        m[[3, 2]] = u.data[2];
        m[[3, 3]] = u.data[3];
        m
    };

    let m = match gate {
        StandardGate::CX => controlled(Unitary2x2::from_gate(&StandardGate::X)?),
        StandardGate::CY => controlled(Unitary2x2::from_gate(&StandardGate::Y)?),
        StandardGate::CZ => controlled(Unitary2x2::from_gate(&StandardGate::Z)?),
        StandardGate::CH => controlled(Unitary2x2::from_gate(&StandardGate::H)?),
        StandardGate::CRz(_) => controlled(Unitary2x2::rz(angle(0)?)),
        StandardGate::CP(_) => controlled(Unitary2x2::p(angle(0)?)),
        StandardGate::Swap => {
            let mut m = Array2::<Complex64>::zeros((4, 4));
            m[[0, 0]] = C1;
            m[[1, 2]] = C1;
            m[[2, 1]] = C1;
            m[[3, 3]] = C1;
            m
        }
        StandardGate::ISwap => {
            let mut m = Array2::<Complex64>::zeros((4, 4));
            m[[0, 0]] = C1;
            m[[1, 2]] = CI;
            m[[2, 1]] = CI;
            m[[3, 3]] = C1;
            m
        }
        StandardGate::RZZ(_) => {
            let theta = angle(0)?;
            let minus = Complex64::from_polar(1.0, -theta / 2.0);
            let plus = Complex64::from_polar(1.0, theta / 2.0);
            let mut m = Array2::<Complex64>::zeros((4, 4));
            m[[0, 0]] = minus;
            m[[1, 1]] = plus;
            m[[2, 2]] = plus;
            m[[3, 3]] = minus;
            m
        }
        StandardGate::CCX => {
            let mut m = Array2::<Complex64>::eye(8);
            m[[6, 6]] = C0;
            m[[7, 7]] = C0;
            m[[6, 7]] = C1;
            m[[7, 6]] = C1;
            m
        }
        _ => return None,
    };
    Some(m)
}

/// Apply a gate matrix to a statevector in place.
///
/// `qubits[j]` is the circuit qubit bound to gate operand `j`.
pub fn apply_matrix(state: &mut [Complex64], matrix: &Array2<Complex64>, qubits: &[usize]) {
    let k = qubits.len();
    let dim = 1usize << k;
    let mask: usize = qubits.iter().map(|&q| 1usize << q).sum();

    // Offset of each local basis state within the global index.
    let offsets: Vec<usize> = (0..dim)
        .map(|local| {
            (0..k)
                .filter(|&j| local & (1 << (k - 1 - j)) != 0)
                .map(|j| 1usize << qubits[j])
                .sum()
        })
        .collect();

    let mut amps = vec![C0; dim];
    for base in 0..state.len() {
        if base & mask != 0 {
            continue;
        }
        for (local, &off) in offsets.iter().enumerate() {
            amps[local] = state[base | off];
        }
        for (row, &off) in offsets.iter().enumerate() {
            let mut acc = C0;
            for (col, amp) in amps.iter().enumerate() {
                acc += matrix[[row, col]] * amp;
            }
            state[base | off] = acc;
        }
    }
}

/// Unitary of a sequence of gate operations over `num_qubits` qubits.
///
/// Barriers and delays are ignored. Returns `None` for measurements, custom
/// gates or unbound parameters.
pub fn ops_unitary(num_qubits: u32, ops: &[Instruction]) -> Option<Array2<Complex64>> {
    let mut matrices = Vec::with_capacity(ops.len());
    for op in ops {
        match &op.kind {
            InstructionKind::Barrier | InstructionKind::Delay { .. } => continue,
            InstructionKind::Measure => return None,
            InstructionKind::Gate { .. } => {
                let gate = op.as_standard_gate()?;
                let qubits: Vec<usize> = op.qubits.iter().map(|q| q.index()).collect();
                matrices.push((gate_matrix(gate)?, qubits));
            }
        }
    }

    let dim = 1usize << num_qubits;
    let mut unitary = Array2::<Complex64>::zeros((dim, dim));
    let mut column = vec![C0; dim];
    for col in 0..dim {
        column.iter_mut().for_each(|a| *a = C0);
        column[col] = C1;
        for (m, qubits) in &matrices {
            apply_matrix(&mut column, m, qubits);
        }
        for (row, amp) in column.iter().enumerate() {
            unitary[[row, col]] = *amp;
        }
    }
    Some(unitary)
}

/// Unitary of a whole circuit; see [`ops_unitary`].
pub fn circuit_unitary(circuit: &Circuit) -> Option<Array2<Complex64>> {
    ops_unitary(circuit.num_qubits(), circuit.ops())
}

/// True if `a = e^{iδ}·b` for some δ, within `tol` on every element.
pub fn equal_up_to_global_phase(a: &Array2<Complex64>, b: &Array2<Complex64>, tol: f64) -> bool {
    if a.dim() != b.dim() {
        return false;
    }
    let Some((idx, pivot)) = b
        .indexed_iter()
        .max_by(|(_, x), (_, y)| x.norm().total_cmp(&y.norm()))
    else {
        return true;
    };
    if pivot.norm() < ANGLE_EPSILON {
        return a.iter().all(|x| x.norm() < tol);
    }
    let ratio = a[idx] / pivot;
    let phase = ratio / ratio.norm();
    a.iter()
        .zip(b.iter())
        .all(|(x, y)| (x - phase * y).norm() < tol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qpipe_ir::{CircuitBuilder, QubitId};

    const TOL: f64 = 1e-9;

    fn std1(g: StandardGate) -> Unitary2x2 {
        Unitary2x2::from_gate(&g).unwrap()
    }

    #[test]
    fn test_hadamard_squared() {
        let h = std1(StandardGate::H);
        assert!((h * h).is_identity(TOL));
    }

    #[test]
    fn test_sx_squared_is_x() {
        let sx = std1(StandardGate::SX);
        assert!((sx * sx).approx_eq_up_to_phase(&std1(StandardGate::X), TOL));
        assert!((sx * std1(StandardGate::SXdg)).is_identity(TOL));
    }

    #[test]
    fn test_u_angles_roundtrip() {
        let cases = [
            std1(StandardGate::H),
            std1(StandardGate::X),
            std1(StandardGate::Y),
            std1(StandardGate::T),
            std1(StandardGate::SX),
            Unitary2x2::rx(0.3) * Unitary2x2::rz(1.1) * Unitary2x2::ry(-2.4),
            Unitary2x2::identity(),
            Unitary2x2::rz(0.7),
        ];
        for m in cases {
            let (theta, phi, lambda) = m.u_angles();
            let rebuilt = Unitary2x2::u(theta, phi, lambda);
            assert!(rebuilt.approx_eq_up_to_phase(&m, TOL), "{m:?}");
        }
    }

    #[test]
    fn test_prx_definition() {
        // PRX(θ, 0) is Rx(θ); PRX(θ, π/2) is Ry(θ).
        assert!(Unitary2x2::prx(0.8, 0.0).approx_eq_up_to_phase(&Unitary2x2::rx(0.8), TOL));
        assert!(Unitary2x2::prx(0.8, PI / 2.0).approx_eq_up_to_phase(&Unitary2x2::ry(0.8), TOL));
    }

    #[test]
    fn test_cx_matrix_convention() {
        // CX with operand 0 as control: |10> -> |11>.
        let m = gate_matrix(&StandardGate::CX).unwrap();
        assert_eq!(m[[3, 2]], C1);
        assert_eq!(m[[0, 0]], C1);
    }

    #[test]
    fn test_circuit_unitary_bit_order() {
        // X on qubit 0 flips the least significant bit.
        let mut b = CircuitBuilder::new("x0", 2, 0);
        b.x(QubitId(0)).unwrap();
        let u = circuit_unitary(&b.build()).unwrap();
        assert_eq!(u[[1, 0]], C1);

        // CX(1, 0): control is qubit 1 (bit 1), target qubit 0 (bit 0).
        let mut b = CircuitBuilder::new("cx10", 2, 0);
        b.cx(QubitId(1), QubitId(0)).unwrap();
        let u = circuit_unitary(&b.build()).unwrap();
        assert_eq!(u[[3, 2]], C1);
        assert_eq!(u[[1, 1]], C1);
    }

    #[test]
    fn test_swap_equals_three_cx() {
        let mut b = CircuitBuilder::new("swap", 2, 0);
        b.swap(QubitId(0), QubitId(1)).unwrap();
        let swap = circuit_unitary(&b.build()).unwrap();

        let mut b = CircuitBuilder::new("cx3", 2, 0);
        b.cx(QubitId(0), QubitId(1))
            .unwrap()
            .cx(QubitId(1), QubitId(0))
            .unwrap()
            .cx(QubitId(0), QubitId(1))
            .unwrap();
        let cx3 = circuit_unitary(&b.build()).unwrap();
        assert!(equal_up_to_global_phase(&swap, &cx3, TOL));
    }

    #[test]
    fn test_global_phase_detection() {
        let a = gate_matrix(&StandardGate::Rz(0.4.into())).unwrap();
        let b = gate_matrix(&StandardGate::P(0.4.into())).unwrap();
        assert!(equal_up_to_global_phase(&a, &b, TOL));
        let c = gate_matrix(&StandardGate::P(0.5.into())).unwrap();
        assert!(!equal_up_to_global_phase(&a, &c, TOL));
    }

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-12);
        assert!((normalize_angle(-PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert_eq!(normalize_angle(f64::NAN), 0.0);
    }
}
