//! Gate equivalence rules and the basis translator built on them.
//!
//! An [`EquivalenceRule`] rewrites one gate kind into a short sequence of
//! other standard gates, with the parameters carried through as affine
//! expressions so symbolic circuits translate too. The [`BasisTranslator`]
//! searches the rule graph for the cheapest derivation of every gate kind in
//! terms of a device's native basis.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use rustc_hash::FxHashMap;

use qpipe_ir::{Instruction, ParameterExpression, QubitId, StandardGate};

use crate::device::Device;
use crate::unitary::normalize_angle;

/// Rule body: maps the source gate's parameters to `(gate, operand slots)`.
///
/// Operand slot `i` refers to the source gate's operand `i`.
pub type Template = fn(&[ParameterExpression]) -> Vec<(StandardGate, Vec<usize>)>;

/// Maximum rule-expansion depth.
const MAX_EXPANSION_DEPTH: usize = 32;

/// Lowest cost assigned to a native gate, so every derivation costs something.
const MIN_NATIVE_COST: f64 = 1e-9;

/// One rewrite: `source` equals the template's output up to global phase.
#[derive(Clone)]
pub struct EquivalenceRule {
    source: &'static str,
    targets: Vec<&'static str>,
    build: Template,
}

impl EquivalenceRule {
    /// Create a rule. Target kinds are derived by evaluating the template.
    pub fn new(source: &'static str, build: Template) -> Self {
        let zeros = [c(0.0), c(0.0), c(0.0)];
        let targets = build(&zeros).iter().map(|(g, _)| g.name()).collect();
        Self {
            source,
            targets,
            build,
        }
    }

    /// Gate kind this rule rewrites.
    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Gate kinds emitted, with multiplicity.
    pub fn targets(&self) -> &[&'static str] {
        &self.targets
    }

    /// Instantiate the rule for concrete operands.
    pub fn apply(&self, gate: &StandardGate, qubits: &[QubitId]) -> Vec<Instruction> {
        let params: Vec<ParameterExpression> = gate.parameters().into_iter().cloned().collect();
        (self.build)(&params)
            .into_iter()
            .map(|(g, slots)| Instruction::gate(g, slots.into_iter().map(|s| qubits[s])))
            .collect()
    }
}

impl std::fmt::Debug for EquivalenceRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> [{}]", self.source, self.targets.join(", "))
    }
}

fn c(value: f64) -> ParameterExpression {
    ParameterExpression::constant(value)
}

fn p(params: &[ParameterExpression], i: usize) -> ParameterExpression {
    params.get(i).cloned().unwrap_or_default()
}

/// An ordered collection of equivalence rules.
///
/// Rule order matters: when two derivations cost the same, the earlier rule
/// wins.
#[derive(Debug, Clone, Default)]
pub struct EquivalenceLibrary {
    rules: Vec<EquivalenceRule>,
}

impl EquivalenceLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule.
    pub fn add_rule(&mut self, rule: EquivalenceRule) {
        self.rules.push(rule);
    }

    /// Append a rule built from a template.
    #[must_use]
    pub fn with_rule(mut self, source: &'static str, build: Template) -> Self {
        self.add_rule(EquivalenceRule::new(source, build));
        self
    }

    /// All rules, in order.
    pub fn rules(&self) -> &[EquivalenceRule] {
        &self.rules
    }

    /// Rules rewriting `source`, in order.
    pub fn rules_for<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a EquivalenceRule> {
        self.rules.iter().filter(move |r| r.source == source)
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if the library has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Expand every gate on three or more qubits into one- and two-qubit
    /// gates, using the first rule for each kind.
    ///
    /// Returns `None` if some kind on the way has no rule.
    pub fn unroll(&self, gate: &StandardGate, qubits: &[QubitId]) -> Option<Vec<Instruction>> {
        let mut out = Vec::new();
        self.unroll_into(gate, qubits, 0, &mut out).then_some(out)
    }

    fn unroll_into(
        &self,
        gate: &StandardGate,
        qubits: &[QubitId],
        depth: usize,
        out: &mut Vec<Instruction>,
    ) -> bool {
        if gate.num_qubits() <= 2 {
            out.push(Instruction::gate(gate.clone(), qubits.iter().copied()));
            return true;
        }
        if depth >= MAX_EXPANSION_DEPTH {
            return false;
        }
        let Some(rule) = self.rules_for(gate.name()).next() else {
            return false;
        };
        rule.apply(gate, qubits).iter().all(|inst| match inst.as_standard_gate() {
            Some(g) => self.unroll_into(g, &inst.qubits, depth + 1, out),
            None => false,
        })
    }

    /// The built-in rule set covering every standard gate.
    #[allow(clippy::too_many_lines)]
    pub fn standard() -> Self {
        use StandardGate::{CX, CZ, H, P, PRX, Rx, Rz, S, SX, Sdg, T, Tdg, U};

        Self::new()
            // Single-qubit Cliffords.
            .with_rule("h", |_| vec![(Rz(c(FRAC_PI_2)), vec![0]), (SX, vec![0]), (Rz(c(FRAC_PI_2)), vec![0])])
            .with_rule("h", |_| vec![(U(c(FRAC_PI_2), c(0.0), c(PI)), vec![0])])
            .with_rule("h", |_| vec![(PRX(c(FRAC_PI_2), c(FRAC_PI_2)), vec![0]), (PRX(c(PI), c(0.0)), vec![0])])
            .with_rule("x", |_| vec![(U(c(PI), c(0.0), c(PI)), vec![0])])
            .with_rule("x", |_| vec![(SX, vec![0]), (SX, vec![0])])
            .with_rule("x", |_| vec![(PRX(c(PI), c(0.0)), vec![0])])
            .with_rule("x", |_| vec![(Rx(c(PI)), vec![0])])
            .with_rule("y", |_| vec![(U(c(PI), c(FRAC_PI_2), c(FRAC_PI_2)), vec![0])])
            .with_rule("y", |_| vec![(PRX(c(PI), c(FRAC_PI_2)), vec![0])])
            .with_rule("z", |_| vec![(Rz(c(PI)), vec![0])])
            .with_rule("s", |_| vec![(Rz(c(FRAC_PI_2)), vec![0])])
            .with_rule("sdg", |_| vec![(Rz(c(-FRAC_PI_2)), vec![0])])
            .with_rule("t", |_| vec![(Rz(c(FRAC_PI_4)), vec![0])])
            .with_rule("tdg", |_| vec![(Rz(c(-FRAC_PI_4)), vec![0])])
            .with_rule("sx", |_| vec![(Rx(c(FRAC_PI_2)), vec![0])])
            .with_rule("sx", |_| vec![(PRX(c(FRAC_PI_2), c(0.0)), vec![0])])
            .with_rule("sxdg", |_| vec![(Rz(c(PI)), vec![0]), (SX, vec![0]), (Rz(c(PI)), vec![0])])
            .with_rule("sxdg", |_| vec![(PRX(c(-FRAC_PI_2), c(0.0)), vec![0])])
            .with_rule("id", |_| vec![])
            // Rotations.
            .with_rule("p", |a| vec![(Rz(p(a, 0)), vec![0])])
            .with_rule("rz", |a| vec![(P(p(a, 0)), vec![0])])
            .with_rule("rz", |a| vec![(U(c(0.0), c(0.0), p(a, 0)), vec![0])])
            .with_rule("rz", |a| vec![(PRX(c(PI), c(0.0)), vec![0]), (PRX(c(PI), p(a, 0) / 2.0), vec![0])])
            .with_rule("rx", |a| vec![(PRX(p(a, 0), c(0.0)), vec![0])])
            .with_rule("rx", |a| vec![(U(p(a, 0), c(-FRAC_PI_2), c(FRAC_PI_2)), vec![0])])
            .with_rule("ry", |a| vec![(PRX(p(a, 0), c(FRAC_PI_2)), vec![0])])
            .with_rule("ry", |a| vec![(U(p(a, 0), c(0.0), c(0.0)), vec![0])])
            .with_rule("u", |a| {
                vec![
                    (Rz(p(a, 2)), vec![0]),
                    (SX, vec![0]),
                    (Rz(p(a, 0) + PI), vec![0]),
                    (SX, vec![0]),
                    (Rz(p(a, 1) + PI), vec![0]),
                ]
            })
            .with_rule("u", |a| {
                vec![
                    (Rz(p(a, 1) + p(a, 2)), vec![0]),
                    (PRX(p(a, 0), p(a, 1) + FRAC_PI_2), vec![0]),
                ]
            })
            .with_rule("prx", |a| vec![(U(p(a, 0), p(a, 1) - FRAC_PI_2, -p(a, 1) + FRAC_PI_2), vec![0])])
            .with_rule("prx", |a| vec![(Rz(-p(a, 1)), vec![0]), (Rx(p(a, 0)), vec![0]), (Rz(p(a, 1)), vec![0])])
            // Two-qubit gates.
            .with_rule("cx", |_| vec![(H, vec![1]), (CZ, vec![0, 1]), (H, vec![1])])
            .with_rule("cz", |_| vec![(H, vec![1]), (CX, vec![0, 1]), (H, vec![1])])
            .with_rule("cy", |_| vec![(Sdg, vec![1]), (CX, vec![0, 1]), (S, vec![1])])
            .with_rule("ch", |_| {
                vec![
                    (S, vec![1]),
                    (H, vec![1]),
                    (T, vec![1]),
                    (CX, vec![0, 1]),
                    (Tdg, vec![1]),
                    (H, vec![1]),
                    (Sdg, vec![1]),
                ]
            })
            .with_rule("swap", |_| vec![(CX, vec![0, 1]), (CX, vec![1, 0]), (CX, vec![0, 1])])
            .with_rule("iswap", |_| {
                vec![
                    (S, vec![0]),
                    (S, vec![1]),
                    (H, vec![0]),
                    (CX, vec![0, 1]),
                    (CX, vec![1, 0]),
                    (H, vec![1]),
                ]
            })
            .with_rule("crz", |a| {
                vec![
                    (Rz(p(a, 0) / 2.0), vec![1]),
                    (CX, vec![0, 1]),
                    (Rz(-p(a, 0) / 2.0), vec![1]),
                    (CX, vec![0, 1]),
                ]
            })
            .with_rule("cp", |a| {
                vec![
                    (P(p(a, 0) / 2.0), vec![0]),
                    (CX, vec![0, 1]),
                    (P(-p(a, 0) / 2.0), vec![1]),
                    (CX, vec![0, 1]),
                    (P(p(a, 0) / 2.0), vec![1]),
                ]
            })
            .with_rule("rzz", |a| vec![(CX, vec![0, 1]), (Rz(p(a, 0)), vec![1]), (CX, vec![0, 1])])
            // Three-qubit gates.
            .with_rule("ccx", |_| {
                vec![
                    (H, vec![2]),
                    (CX, vec![1, 2]),
                    (Tdg, vec![2]),
                    (CX, vec![0, 2]),
                    (T, vec![2]),
                    (CX, vec![1, 2]),
                    (Tdg, vec![2]),
                    (CX, vec![0, 2]),
                    (T, vec![1]),
                    (T, vec![2]),
                    (H, vec![2]),
                    (CX, vec![0, 1]),
                    (T, vec![0]),
                    (Tdg, vec![1]),
                    (CX, vec![0, 1]),
                ]
            })
    }
}

/// Cheapest-derivation search from every gate kind to one device's basis.
///
/// Native kinds cost their calibrated error when the device has gate error
/// weights, and 1 otherwise. A non-native kind costs the minimum, over its
/// rules, of the summed costs of the rule's targets.
#[derive(Debug, Clone)]
pub struct BasisTranslator {
    library: EquivalenceLibrary,
    natives: Vec<String>,
    costs: FxHashMap<&'static str, f64>,
    native_costs: FxHashMap<String, f64>,
    best_rule: FxHashMap<&'static str, usize>,
}

impl BasisTranslator {
    /// Run the cost search for `device`'s basis.
    pub fn new(library: EquivalenceLibrary, device: &Device) -> Self {
        let natives: Vec<String> = device.basis().gates().to_vec();
        let known: Vec<f64> = natives.iter().filter_map(|g| device.gate_error(g)).collect();
        let fallback = known.iter().copied().fold(None, |acc: Option<f64>, e| {
            Some(acc.map_or(e, |a| a.max(e)))
        });

        let native_costs: FxHashMap<String, f64> = natives
            .iter()
            .map(|g| {
                let cost = match (device.gate_error(g), fallback) {
                    (Some(e), _) | (None, Some(e)) => e.max(MIN_NATIVE_COST),
                    (None, None) => 1.0,
                };
                (g.clone(), cost)
            })
            .collect();

        let mut costs: FxHashMap<&'static str, f64> = FxHashMap::default();
        let mut best_rule: FxHashMap<&'static str, usize> = FxHashMap::default();

        let cost_of = |costs: &FxHashMap<&'static str, f64>, kind: &str| -> Option<f64> {
            native_costs
                .get(kind)
                .copied()
                .or_else(|| costs.get(kind).copied())
        };

        // Bellman-Ford style relaxation; costs are positive, so this converges
        // in at most one sweep per rule.
        for _ in 0..=library.len() {
            let mut changed = false;
            for (idx, rule) in library.rules().iter().enumerate() {
                if native_costs.contains_key(rule.source) {
                    continue;
                }
                let total: Option<f64> = rule
                    .targets
                    .iter()
                    .map(|t| cost_of(&costs, t))
                    .sum();
                let Some(total) = total else { continue };
                let current = costs.get(rule.source).copied().unwrap_or(f64::INFINITY);
                if total < current - 1e-12 {
                    costs.insert(rule.source, total);
                    best_rule.insert(rule.source, idx);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        Self {
            library,
            natives,
            costs,
            native_costs,
            best_rule,
        }
    }

    /// The rule library searched.
    pub fn library(&self) -> &EquivalenceLibrary {
        &self.library
    }

    /// Native gate names.
    pub fn natives(&self) -> &[String] {
        &self.natives
    }

    /// True if `kind` is in the native basis.
    pub fn is_native(&self, kind: &str) -> bool {
        self.native_costs.contains_key(kind)
    }

    /// Cost of the cheapest derivation of `kind`, if one exists.
    pub fn cost(&self, kind: &str) -> Option<f64> {
        self.native_costs
            .get(kind)
            .copied()
            .or_else(|| self.costs.get(kind).copied())
    }

    /// True if `kind` is native or derivable.
    pub fn is_reachable(&self, kind: &str) -> bool {
        self.cost(kind).is_some()
    }

    /// Summed cost of the gates in `ops`; non-gate operations are free.
    ///
    /// Gates that cannot be derived make the sequence infinitely expensive.
    pub fn sequence_cost(&self, ops: &[Instruction]) -> f64 {
        ops.iter()
            .filter(|op| op.is_gate())
            .map(|op| self.cost(op.name()).unwrap_or(f64::INFINITY))
            .sum()
    }

    /// Rewrite one gate into native gates.
    ///
    /// Rotations emitted by a rule whose angle is zero within `tol` are
    /// dropped. Returns `None` if no derivation exists.
    pub fn translate(
        &self,
        gate: &StandardGate,
        qubits: &[QubitId],
        tol: f64,
    ) -> Option<Vec<Instruction>> {
        let mut out = Vec::new();
        self.expand(gate, qubits, 0, tol, &mut out).then_some(out)
    }

    fn expand(
        &self,
        gate: &StandardGate,
        qubits: &[QubitId],
        depth: usize,
        tol: f64,
        out: &mut Vec<Instruction>,
    ) -> bool {
        if self.is_native(gate.name()) {
            if depth == 0 || !is_zero_rotation(gate, tol) {
                out.push(Instruction::gate(gate.clone(), qubits.iter().copied()));
            }
            return true;
        }
        if depth >= MAX_EXPANSION_DEPTH {
            return false;
        }
        let Some(rule) = self
            .best_rule
            .get(gate.name())
            .and_then(|&i| self.library.rules().get(i))
        else {
            return false;
        };
        rule.apply(gate, qubits)
            .iter()
            .all(|inst| match inst.as_standard_gate() {
                Some(g) => self.expand(g, &inst.qubits, depth + 1, tol, out),
                None => false,
            })
    }
}

/// True if `gate` is a rotation by a concrete angle that is zero within `tol`.
///
/// Single-qubit angles are compared modulo 2π, since a full turn is a global
/// phase.
pub fn is_zero_rotation(gate: &StandardGate, tol: f64) -> bool {
    let angle = |i: usize| gate.parameters().get(i).and_then(|p| p.as_f64());
    let small = |a: Option<f64>| a.is_some_and(|a| normalize_angle(a).abs() < tol);
    match gate {
        StandardGate::Rx(_)
        | StandardGate::Ry(_)
        | StandardGate::Rz(_)
        | StandardGate::P(_)
        | StandardGate::PRX(..) => small(angle(0)),
        StandardGate::U(..) => {
            small(angle(0))
                && matches!((angle(1), angle(2)), (Some(a), Some(b)) if normalize_angle(a + b).abs() < tol)
        }
        StandardGate::CRz(_) | StandardGate::CP(_) | StandardGate::RZZ(_) => {
            angle(0).is_some_and(|a| a.abs() < tol)
        }
        StandardGate::I => true,
        _ => false,
    }
}
